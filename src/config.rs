//! Application configuration
//!
//! Persisted as TOML in the platform config directory. A missing file is
//! replaced by the defaults.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_RECV_TIMEOUT_MS, DEFAULT_UDP_PORT, DEFAULT_VOLUME, DEFAULT_WS_PORT};
use crate::error::Error;

/// How early pacenotes are called.
///
/// The preset value is the lead in meters shown to the user; the offset the
/// telemetry loop works with is 100 m less, so `Recce` calls notes at their
/// authored distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayMode {
    Recce,
    Late,
    #[default]
    Normal,
    Earlier,
    VeryEarly,
}

impl DelayMode {
    pub const ALL: [DelayMode; 5] = [
        DelayMode::Recce,
        DelayMode::Late,
        DelayMode::Normal,
        DelayMode::Earlier,
        DelayMode::VeryEarly,
    ];

    pub fn preset(self) -> i32 {
        match self {
            DelayMode::Recce => 100,
            DelayMode::Late => 150,
            DelayMode::Normal => 200,
            DelayMode::Earlier => 250,
            DelayMode::VeryEarly => 300,
        }
    }

    /// Distance subtracted from authored pacenote distances
    pub fn offset(self) -> i32 {
        self.preset() - 100
    }

    pub fn from_preset(preset: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.preset() == preset)
    }

    /// Status label: recce runs versus stage runs
    pub fn label(self) -> &'static str {
        match self {
            DelayMode::Recce => "RECCE",
            _ => "STAGE",
        }
    }
}

/// Telemetry socket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub udp_port: u16,
    /// Read timeout so the worker can notice stop requests
    pub recv_timeout_ms: u64,
}

impl NetworkConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            udp_port: DEFAULT_UDP_PORT,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
        }
    }
}

/// Pacenote calling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacenoteConfig {
    /// Co-driver voice pack directory name
    pub co_driver: String,
    pub delay: DelayMode,
    /// Gain offset in dB
    pub volume: i32,
    /// Play the countdown sound when a stage starts
    pub countdown: bool,
    /// Output device name; the system default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
}

impl Default for PacenoteConfig {
    fn default() -> Self {
        Self {
            co_driver: String::new(),
            delay: DelayMode::default(),
            volume: DEFAULT_VOLUME,
            countdown: true,
            output_device: None,
        }
    }
}

/// Where data files live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Contains `stages.csv`
    pub data_dir: PathBuf,
    /// Contains one directory per co-driver
    pub co_drivers_dir: PathBuf,
}

impl PathsConfig {
    pub fn stages_file(&self) -> PathBuf {
        self.data_dir.join("stages.csv")
    }

    pub fn co_driver_dir(&self, co_driver: &str) -> PathBuf {
        self.co_drivers_dir.join(co_driver)
    }

    pub fn pacenotes_dir(&self, co_driver: &str) -> PathBuf {
        self.co_driver_dir(co_driver).join("pacenotes")
    }

    pub fn sounds_dir(&self, co_driver: &str) -> PathBuf {
        self.co_driver_dir(co_driver).join("sounds")
    }

    /// Names of the co-driver directories, sorted
    pub fn list_co_drivers(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.co_drivers_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map_or(false, |t| t.is_dir()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            co_drivers_dir: PathBuf::from("co-drivers"),
        }
    }
}

/// Web UI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            http_port: DEFAULT_WS_PORT,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub pacenotes: PacenoteConfig,
    pub paths: PathsConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Default config file location for this platform
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dirty-pacenotes").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from `path`, writing the defaults there first if it doesn't exist.
    ///
    /// An unset co-driver falls back to the first installed one.
    pub fn load_or_create(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            let mut config = Self::default();
            config.select_default_co_driver();
            config.save(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        config.select_default_co_driver();
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Pick the first co-driver under `paths.co_drivers_dir` if none is set.
    ///
    /// Returns whether one was picked.
    pub fn select_default_co_driver(&mut self) -> bool {
        if !self.pacenotes.co_driver.trim().is_empty() {
            return false;
        }
        match self.paths.list_co_drivers().into_iter().next() {
            Some(name) => {
                tracing::info!("No co-driver configured, using {}", name);
                self.pacenotes.co_driver = name;
                true
            }
            None => false,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Check settings the telemetry loop can't run without
    pub fn validate(&self) -> Result<(), Error> {
        if self.pacenotes.co_driver.trim().is_empty() {
            return Err(Error::Config(format!(
                "no co-driver selected and none found in {}",
                self.paths.co_drivers_dir.display()
            )));
        }
        if !(0..=10).contains(&self.pacenotes.volume) {
            return Err(Error::Config(format!(
                "volume {} out of range 0..=10",
                self.pacenotes.volume
            )));
        }
        Ok(())
    }
}

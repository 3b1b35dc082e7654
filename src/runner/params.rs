//! Parameters handed to the worker at start

use std::time::Duration;

use crate::config::AppConfig;

/// Settings the worker starts with. Delay and gain later change only
/// through the control channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeParameters {
    pub bind_address: String,
    pub udp_port: u16,
    pub recv_timeout: Duration,
    pub co_driver: String,
    /// Meters subtracted from authored distances
    pub delay_offset: i32,
    /// Gain offset in dB
    pub gain_db: f32,
    pub countdown: bool,
}

impl RuntimeParameters {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bind_address: config.network.bind_address.clone(),
            udp_port: config.network.udp_port,
            recv_timeout: config.network.recv_timeout(),
            co_driver: config.pacenotes.co_driver.clone(),
            delay_offset: config.pacenotes.delay.offset(),
            gain_db: config.pacenotes.volume as f32,
            countdown: config.pacenotes.countdown,
        }
    }
}

impl Default for RuntimeParameters {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

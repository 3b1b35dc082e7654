//! Decoded co-driver sounds

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioError;

/// A decoded, playable sound
#[derive(Debug, Clone)]
pub struct SoundClip {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SoundClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// Get number of samples per channel
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Turns a sound file into a [`SoundClip`]
pub trait SoundDecoder {
    fn decode(&self, path: &Path) -> Result<SoundClip, AudioError>;
}

/// WAV decoder backed by `hound`
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl SoundDecoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<SoundClip, AudioError> {
        let failed = |reason: String| AudioError::DecodeFailed {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = hound::WavReader::open(path).map_err(|e| failed(e.to_string()))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| failed(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| failed(e.to_string()))?
            }
        };

        Ok(SoundClip::new(samples, spec.sample_rate, spec.channels))
    }
}

/// Sound identifier to decoded sound.
///
/// Identifiers are file stems: `sounds/left3.wav` is `left3`.
#[derive(Debug, Clone, Default)]
pub struct SoundBank {
    sounds: HashMap<String, SoundClip>,
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, clip: SoundClip) {
        self.sounds.insert(identifier.into(), clip);
    }

    pub fn get(&self, identifier: &str) -> Option<&SoundClip> {
        self.sounds.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.sounds.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Decode every file, calling `progress(loaded, total)` after each success.
    ///
    /// Files that fail to decode are logged and skipped.
    pub fn load(
        files: &[PathBuf],
        decoder: &dyn SoundDecoder,
        mut progress: impl FnMut(usize, usize),
    ) -> Self {
        let mut bank = Self::new();
        let total = files.len();

        for path in files {
            let Some(identifier) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decoder.decode(path) {
                Ok(clip) => {
                    bank.insert(identifier, clip);
                    progress(bank.len(), total);
                }
                Err(e) => tracing::warn!("Skipping sound {}: {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} of {} sounds", bank.len(), total);
        bank
    }
}

/// Regular files in a co-driver's sounds directory, sorted by name
pub fn list_sound_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

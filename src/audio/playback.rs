//! Blocking sound playback
//!
//! Cues are spoken one sound after another, so playback blocks the caller
//! until the sound has finished.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::bounded;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::device::get_output_device;
use crate::audio::sound::SoundClip;
use crate::error::AudioError;

/// Extra time allowed past a clip's length before giving up on it
const PLAYBACK_GRACE: Duration = Duration::from_millis(500);

/// Convert a decibel offset to a linear amplitude factor
pub fn gain_to_amplitude(gain_db: f32) -> f32 {
    10f32.powf(gain_db / 20.0)
}

/// Somewhere sounds can be played
pub trait AudioSink: Send {
    /// Play `clip` at `gain_db` and return once it has finished
    fn play(&mut self, identifier: &str, clip: &SoundClip, gain_db: f32) -> Result<(), AudioError>;
}

/// Plays sounds on a cpal output device
pub struct CpalSink {
    device: cpal::Device,
    name: String,
}

impl CpalSink {
    /// Open the named output device, or the default one
    pub fn open(device_name: Option<&str>) -> Result<Self, AudioError> {
        let device = get_output_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("Audio output: {}", name);
        Ok(Self { device, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, identifier: &str, clip: &SoundClip, gain_db: f32) -> Result<(), AudioError> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} output on {}",
                supported.sample_format(),
                self.name
            )));
        }
        let config: StreamConfig = supported.config();

        let mut reader = ClipReader::new(
            clip,
            config.sample_rate.0,
            config.channels,
            gain_to_amplitude(gain_db),
        );
        let (done_tx, done_rx) = bounded::<()>(1);

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if reader.render(data) {
                        let _ = done_tx.try_send(());
                    }
                },
                |err| tracing::warn!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        tracing::debug!(
            "Playing {} ({:?}, {} Hz x{} -> {} Hz x{})",
            identifier,
            clip.duration(),
            clip.sample_rate,
            clip.channels,
            config.sample_rate.0,
            config.channels
        );
        done_rx
            .recv_timeout(clip.duration() + PLAYBACK_GRACE)
            .map_err(|_| AudioError::PlaybackTimeout)
        // Stream is dropped here, stopping output
    }
}

/// Reads a clip at the output's sample rate and channel layout.
///
/// Rates are converted by linear interpolation. Mono is copied to every
/// output channel, a mono output gets the mean of the input channels, and
/// other layouts wrap around the input channels.
pub(crate) struct ClipReader {
    samples: Arc<[f32]>,
    in_channels: usize,
    out_channels: usize,
    frames: usize,
    /// Input frames advanced per output frame
    step: f64,
    position: f64,
    amplitude: f32,
}

impl ClipReader {
    pub fn new(clip: &SoundClip, out_rate: u32, out_channels: u16, amplitude: f32) -> Self {
        let step = if out_rate == 0 {
            1.0
        } else {
            clip.sample_rate as f64 / out_rate as f64
        };
        Self {
            samples: clip.samples.clone(),
            in_channels: clip.channels.max(1) as usize,
            out_channels: out_channels.max(1) as usize,
            frames: clip.frames(),
            step,
            position: 0.0,
            amplitude,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.frames as f64
    }

    /// Fill an interleaved output buffer.
    ///
    /// Returns true once a whole buffer of silence has been written after
    /// the clip's last sample, so the device has played everything.
    pub fn render(&mut self, out: &mut [f32]) -> bool {
        let drained = self.is_finished();
        for frame in out.chunks_mut(self.out_channels) {
            let index = self.position.floor() as usize;
            let frac = (self.position - index as f64) as f32;
            for (channel, sample) in frame.iter_mut().enumerate() {
                let a = self.input(index, channel);
                let b = self.input(index + 1, channel);
                *sample = ((a + (b - a) * frac) * self.amplitude).clamp(-1.0, 1.0);
            }
            if !self.is_finished() {
                self.position += self.step;
            }
        }
        drained
    }

    fn input(&self, frame: usize, out_channel: usize) -> f32 {
        if frame >= self.frames {
            return 0.0;
        }
        let base = frame * self.in_channels;
        if self.out_channels == 1 && self.in_channels > 1 {
            let sum: f32 = self.samples[base..base + self.in_channels].iter().sum();
            return sum / self.in_channels as f32;
        }
        self.samples[base + out_channel % self.in_channels]
    }
}

/// Sink that records what would have been played
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    pub played: std::sync::Arc<parking_lot::Mutex<Vec<(String, f32)>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn identifiers(&self) -> Vec<String> {
        self.played.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[cfg(test)]
impl AudioSink for RecordingSink {
    fn play(&mut self, identifier: &str, _clip: &SoundClip, gain_db: f32) -> Result<(), AudioError> {
        self.played.lock().push((identifier.to_string(), gain_db));
        Ok(())
    }
}

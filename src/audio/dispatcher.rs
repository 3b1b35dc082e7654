//! Cue dispatch: from a cue string to spoken sounds

use crate::audio::playback::AudioSink;
use crate::audio::sound::SoundBank;
use crate::control::{LoopEvent, Notifier};

/// What happened while dispatching one cue
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub played: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Plays cues through an [`AudioSink`] using the co-driver's sounds
pub struct CueDispatcher {
    bank: SoundBank,
    sink: Box<dyn AudioSink>,
    gain_db: f32,
    notifier: Notifier,
}

impl CueDispatcher {
    pub fn new(bank: SoundBank, sink: Box<dyn AudioSink>, gain_db: f32, notifier: Notifier) -> Self {
        Self {
            bank,
            sink,
            gain_db,
            notifier,
        }
    }

    /// Gain for sounds started from now on
    pub fn set_gain(&mut self, gain_db: f32) {
        self.gain_db = gain_db;
    }

    pub fn gain(&self) -> f32 {
        self.gain_db
    }

    pub fn set_bank(&mut self, bank: SoundBank) {
        self.bank = bank;
    }

    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    /// Play every sound named in `cue`, in order.
    ///
    /// A sound missing from the bank is reported and skipped; the rest of
    /// the cue still plays.
    pub fn play(&mut self, cue: &str) -> DispatchReport {
        let mut report = DispatchReport::default();

        for identifier in cue.split_whitespace() {
            let Some(clip) = self.bank.get(identifier) else {
                tracing::warn!("Sound '{}' not found", identifier);
                self.notifier.notify(LoopEvent::MissingSound {
                    identifier: identifier.to_string(),
                });
                report.missing += 1;
                continue;
            };

            match self.sink.play(identifier, clip, self.gain_db) {
                Ok(()) => report.played += 1,
                Err(e) => {
                    tracing::warn!("Failed to play '{}': {}", identifier, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

//! Control plane between the telemetry worker and its UI
//!
//! Inbound, the UI posts settings into single-slot mailboxes that the worker
//! drains once per tick. Outbound, the worker publishes [`LoopEvent`]s on an
//! unbounded channel and never waits for anyone to read them.

pub mod mailbox;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::pacenotes::PacenoteSet;

pub use mailbox::{CancellationToken, Mailbox};

/// Notification from the worker to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// Sound assets decoded so far
    AssetLoadProgress { loaded: usize, total: usize },
    /// A different stage was detected
    StageChanged { name: String, folder: String },
    /// Pacenotes for the new stage are in place
    PacenotesLoaded { count: usize },
    /// No pacenote file exists for the stage; streaming continues without notes
    PacenoteFileMissing { stage: String },
    /// The pacenote file exists but could not be read
    PacenoteLoadFailed { stage: String, reason: String },
    /// Car position on stage, sent every running tick
    DistanceProgress { current: i32, previous: i32 },
    /// Whether the session looks paused or restarted, sent every tick
    PauseState { paused: bool },
    /// A cue named a sound the co-driver doesn't have
    MissingSound { identifier: String },
    /// The telemetry socket returned an empty read
    ConnectionLost,
    /// The worker honoured a stop request
    Stopped,
}

/// Worker-side publisher of [`LoopEvent`]s
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<LoopEvent>,
}

impl Notifier {
    pub fn notify(&self, event: LoopEvent) {
        // Nobody listening is fine
        let _ = self.tx.send(event);
    }
}

#[derive(Clone, Default)]
struct Inbound {
    reset: Mailbox<()>,
    delay: Mailbox<i32>,
    gain: Mailbox<f32>,
    pacenotes: Mailbox<PacenoteSet>,
}

/// Pending updates taken from the inbound mailboxes in one drain
#[derive(Debug, Default)]
pub struct ControlUpdate {
    pub stop: bool,
    pub reset: bool,
    pub delay: Option<i32>,
    pub gain: Option<f32>,
    pub pacenotes: Option<PacenoteSet>,
}

/// UI-side end of the control channel
#[derive(Clone)]
pub struct ControlHandle {
    inbound: Inbound,
    cancel: CancellationToken,
    events: Receiver<LoopEvent>,
}

impl ControlHandle {
    /// Ask the worker to exit at its next tick
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// End the current stage run and go back to waiting for telemetry
    pub fn reset(&self) {
        self.inbound.reset.post(());
    }

    pub fn set_delay(&self, offset: i32) {
        self.inbound.delay.post(offset);
    }

    pub fn set_gain(&self, gain_db: f32) {
        self.inbound.gain.post(gain_db);
    }

    /// Replace the worker's pacenotes, e.g. after editing them mid-stage
    pub fn replace_pacenotes(&self, entries: PacenoteSet) {
        self.inbound.pacenotes.post(entries);
    }

    pub fn try_event(&self) -> Option<LoopEvent> {
        self.events.try_recv().ok()
    }

    pub fn events(&self) -> &Receiver<LoopEvent> {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Worker-side end of the control channel
pub struct LoopControls {
    inbound: Inbound,
    cancel: CancellationToken,
    notifier: Notifier,
}

impl LoopControls {
    /// Take every pending update without blocking
    pub fn drain(&self) -> ControlUpdate {
        ControlUpdate {
            stop: self.cancel.is_cancelled(),
            reset: self.inbound.reset.take().is_some(),
            delay: self.inbound.delay.take(),
            gain: self.inbound.gain.take(),
            pacenotes: self.inbound.pacenotes.take(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notify(&self, event: LoopEvent) {
        self.notifier.notify(event);
    }
}

/// Create both ends of a control channel
pub fn channel() -> (ControlHandle, LoopControls) {
    let inbound = Inbound::default();
    let cancel = CancellationToken::new();
    let (tx, rx) = unbounded();

    let handle = ControlHandle {
        inbound: inbound.clone(),
        cancel: cancel.clone(),
        events: rx,
    };
    let controls = LoopControls {
        inbound,
        cancel,
        notifier: Notifier { tx },
    };
    (handle, controls)
}

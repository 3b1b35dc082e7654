//! Loop states and per-tick trackers

use crate::stages::StageRef;
use crate::telemetry::TelemetryFrame;

/// Why the telemetry worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Empty read or unrecoverable socket error
    ConnectionLost,
    /// Stop was requested through the control channel
    Stopped,
}

/// States of the telemetry loop
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingPacket,
    Detecting(TelemetryFrame),
    LoadingPacenotes(StageRef),
    Streaming,
    Finished,
    Exited(LoopExit),
}

/// How a streaming run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Finish line crossed
    Finished,
    /// Stage clock went back to zero, e.g. back in service
    ClockStopped,
    /// Reset requested through the control channel
    Reset,
    Exit(LoopExit),
}

/// Flags a paused or restarted session: the clock is at zero and the total
/// time hasn't moved since the previous tick.
#[derive(Debug, Default)]
pub struct RestartDetector {
    last_total_time: f32,
}

impl RestartDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one tick's frame and return whether the session looks paused
    pub fn observe(&mut self, frame: &TelemetryFrame) -> bool {
        let paused = frame.total_time == self.last_total_time && frame.lap_time == 0.0;
        self.last_total_time = frame.total_time;
        paused
    }
}

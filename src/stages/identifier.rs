//! Stage identification from telemetry

use crate::stages::table::{StageRef, StageTable};
use crate::telemetry::TelemetryFrame;

/// A change of the active stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageChange {
    pub old: Option<StageRef>,
    pub new: StageRef,
}

/// Tracks which stage is being driven
#[derive(Debug, Default)]
pub struct StageIdentifier {
    current: Option<StageRef>,
}

impl StageIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the stage a frame belongs to.
    ///
    /// Only frames with `total_laps == 1` are considered. A length shared by
    /// several stages is resolved by the start position; if none matches,
    /// nothing is detected.
    pub fn detect(frame: &TelemetryFrame, table: &StageTable) -> Option<StageRef> {
        if frame.total_laps != 1 {
            return None;
        }

        match table.candidates(frame.stage_length)? {
            [only] => Some(only.stage.clone()),
            variants => variants
                .iter()
                .find(|v| v.start_position == Some(frame.y_position))
                .map(|v| v.stage.clone()),
        }
    }

    /// Detect and remember the stage, yielding a change only when it differs
    /// from the one already selected.
    pub fn observe(&mut self, frame: &TelemetryFrame, table: &StageTable) -> Option<StageChange> {
        let detected = Self::detect(frame, table)?;
        if self.current.as_ref() == Some(&detected) {
            return None;
        }

        let old = self.current.replace(detected.clone());
        Some(StageChange { old, new: detected })
    }

    pub fn current(&self) -> Option<&StageRef> {
        self.current.as_ref()
    }
}

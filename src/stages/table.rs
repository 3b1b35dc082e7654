//! Stage lookup table
//!
//! Stages are keyed by the length the simulator reports. A few stages share
//! a length and are told apart by the car's Y coordinate on the start line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, StageError};

/// Stage length as a hashable key, at the codec's 4-decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageKey(i64);

impl StageKey {
    pub fn from_length(length: f64) -> Self {
        Self((length * 10_000.0).round() as i64)
    }

    pub fn length(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }
}

/// A resolved stage: its name and the pacenote folder it lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageRef {
    pub name: String,
    pub folder: String,
}

impl StageRef {
    pub fn new(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
        }
    }
}

impl std::fmt::Display for StageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.folder)
    }
}

/// One candidate stage for a given length
#[derive(Debug, Clone, PartialEq)]
pub struct StageVariant {
    /// Y coordinate of the start line; only consulted when the length is shared
    pub start_position: Option<i32>,
    pub stage: StageRef,
}

/// Mapping from stage length to candidate stages
#[derive(Debug, Clone, Default)]
pub struct StageTable {
    entries: BTreeMap<StageKey, Vec<StageVariant>>,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage that is the only one with this length
    pub fn insert(&mut self, length: f64, stage: StageRef) {
        self.push(length, None, stage);
    }

    /// Add a stage that shares its length with others
    pub fn insert_variant(&mut self, length: f64, start_position: i32, stage: StageRef) {
        self.push(length, Some(start_position), stage);
    }

    fn push(&mut self, length: f64, start_position: Option<i32>, stage: StageRef) {
        self.entries
            .entry(StageKey::from_length(length))
            .or_default()
            .push(StageVariant {
                start_position,
                stage,
            });
    }

    /// Candidates for a length, if any
    pub fn candidates(&self, length: f64) -> Option<&[StageVariant]> {
        self.entries
            .get(&StageKey::from_length(length))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the stages text format.
    ///
    /// The first line is a header. Each following line is
    /// `length,start_position,stage_name,folder`; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, StageError> {
        let mut table = Self::new();

        for (idx, raw) in text.lines().enumerate().skip(1) {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let invalid = || StageError::Parse {
                line: idx + 1,
                content: raw.to_string(),
            };

            let mut fields = line.splitn(4, ',').map(str::trim);
            let length = fields
                .next()
                .and_then(|f| f.parse::<f64>().ok())
                .ok_or_else(invalid)?;
            let start = fields.next().ok_or_else(invalid)?;
            let name = fields.next().filter(|f| !f.is_empty()).ok_or_else(invalid)?;
            let folder = fields.next().ok_or_else(invalid)?;

            let start_position = if start.is_empty() {
                None
            } else {
                Some(start.parse::<i32>().map_err(|_| invalid())?)
            };

            table.push(length, start_position, StageRef::new(name, folder));
        }

        Ok(table)
    }

    /// Load and parse a stages file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let table = Self::parse(&text)?;
        tracing::info!("Loaded {} stages from {}", table.len(), path.display());
        Ok(table)
    }
}

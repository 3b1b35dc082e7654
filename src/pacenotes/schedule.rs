//! Effective trigger distances
//!
//! Authored distances mark where a road feature is. Calls have to start
//! earlier than that so the driver hears them in time, so every distance is
//! pulled back by the delay offset. Close to the start line there isn't
//! enough road to pull back by the full offset, so while the car is still
//! within the first `delay` meters the authored distances are halved
//! instead.
//!
//! The two regimes meet at `current == delay`, where the mapping jumps.
//! Notes whose halved distance lies past `delay` but whose offset distance
//! lies before it are never reached. That gap is kept as is.

use std::collections::BTreeMap;

use crate::pacenotes::notes::PacenoteSet;

/// Cue played when driving backwards past the start line
pub const WRONG_WAY_CUE: &str = "wrong_way";

/// Cue played when a stage attempt begins
pub const COUNTDOWN_CUE: &str = "countdown_start";

/// How authored distances are mapped to trigger distances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayRegime {
    /// Before the car has covered `delay` meters: `ceil(authored / 2)`
    Compressed,
    /// Afterwards: `authored - delay`
    Offset,
}

impl DelayRegime {
    pub fn for_distance(current: i32, delay: i32) -> Self {
        if current < delay {
            Self::Compressed
        } else {
            Self::Offset
        }
    }

    pub fn apply(self, authored: i32, delay: i32) -> i32 {
        match self {
            // ceil(authored / 2), negative distances included
            Self::Compressed => authored.div_euclid(2) + authored.rem_euclid(2),
            Self::Offset => authored.saturating_sub(delay),
        }
    }
}

/// Effective trigger distance of one authored distance
pub fn effective_distance(authored: i32, current: i32, delay: i32) -> i32 {
    DelayRegime::for_distance(current, delay).apply(authored, delay)
}

/// What a tick should play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Nothing to play
    Idle,
    /// Cues due at this distance, in authored order
    Pacenotes(Vec<String>),
    /// The car is moving backwards on stage
    WrongWay,
}

/// Pacenotes of the active stage with their current trigger distances
#[derive(Debug, Default)]
pub struct PacenoteSchedule {
    entries: PacenoteSet,
    /// effective distance -> authored distances
    effective: BTreeMap<i32, Vec<i32>>,
    regime: Option<DelayRegime>,
}

impl PacenoteSchedule {
    pub fn new(entries: PacenoteSet) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    /// Replace the entry set; the next rebuild picks it up
    pub fn replace_entries(&mut self, entries: PacenoteSet) {
        self.entries = entries;
        self.effective.clear();
        self.regime = None;
    }

    pub fn entries(&self) -> &PacenoteSet {
        &self.entries
    }

    /// Recompute every trigger distance for the car's current position
    pub fn rebuild(&mut self, current: i32, delay: i32) {
        let regime = DelayRegime::for_distance(current, delay);
        if self.regime != Some(regime) {
            tracing::debug!("Delay regime {:?} at {} m (delay {} m)", regime, current, delay);
        }
        self.regime = Some(regime);

        self.effective.clear();
        for (authored, _) in self.entries.iter() {
            self.effective
                .entry(regime.apply(authored, delay))
                .or_default()
                .push(authored);
        }
    }

    /// Decide what to play given this tick's and the previous tick's distance.
    ///
    /// Uses the trigger distances from the last [`rebuild`](Self::rebuild).
    pub fn trigger(&self, current: i32, previous: i32) -> Trigger {
        if 0 < current && current < previous {
            return Trigger::WrongWay;
        }
        if current <= previous {
            return Trigger::Idle;
        }

        match self.effective.get(&current) {
            Some(authored) => Trigger::Pacenotes(
                authored
                    .iter()
                    .filter_map(|d| self.entries.get(*d))
                    .map(str::to_string)
                    .collect(),
            ),
            None => Trigger::Idle,
        }
    }

    /// Rebuild for this tick and decide what to play
    pub fn tick(&mut self, current: i32, previous: i32, delay: i32) -> Trigger {
        self.rebuild(current, delay);
        self.trigger(current, previous)
    }

    /// Trigger distance of an authored distance after the last rebuild
    pub fn effective_of(&self, authored: i32) -> Option<i32> {
        self.effective
            .iter()
            .find(|(_, a)| a.contains(&authored))
            .map(|(e, _)| *e)
    }
}

//! Pacenotes: entry sets, trigger scheduling and file lookup

pub mod notes;
pub mod schedule;
pub mod store;

pub use notes::PacenoteSet;
pub use schedule::{
    effective_distance, DelayRegime, PacenoteSchedule, Trigger, COUNTDOWN_CUE, WRONG_WAY_CUE,
};
pub use store::{DirectoryStore, PacenoteStore};

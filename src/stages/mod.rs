//! Stage table and stage identification

pub mod identifier;
pub mod table;

pub use identifier::{StageChange, StageIdentifier};
pub use table::{StageKey, StageRef, StageTable, StageVariant};

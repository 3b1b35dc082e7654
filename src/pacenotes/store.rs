//! Pacenote file lookup

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PacenoteError;
use crate::pacenotes::notes::PacenoteSet;
use crate::stages::StageRef;

/// Source of pacenotes for a stage
pub trait PacenoteStore: Send {
    fn load(&self, stage: &StageRef) -> Result<PacenoteSet, PacenoteError>;
}

/// Pacenote files laid out as `<root>/<folder>/<stage name>.txt`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, stage: &StageRef) -> PathBuf {
        self.root
            .join(&stage.folder)
            .join(format!("{}.txt", stage.name))
    }
}

impl PacenoteStore for DirectoryStore {
    fn load(&self, stage: &StageRef) -> Result<PacenoteSet, PacenoteError> {
        let path = self.path_for(stage);
        let text = fs::read_to_string(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PacenoteError::FileMissing(path.clone()),
            _ => PacenoteError::Io {
                path: path.clone(),
                source,
            },
        })?;
        PacenoteSet::parse(&text)
    }
}

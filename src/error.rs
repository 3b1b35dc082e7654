//! Error types for the pacenote caller

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Pacenote error: {0}")]
    Pacenote(#[from] PacenoteError),

    #[error("Stage table error: {0}")]
    Stage(#[from] StageError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Telemetry decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Malformed frame: {len} bytes, need at least {required}")]
    MalformedFrame { len: usize, required: usize },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Pacenote file errors
#[derive(Error, Debug)]
pub enum PacenoteError {
    #[error("Pacenote file not found: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("Invalid pacenote on line {line}: {content:?}")]
    Parse { line: usize, content: String },

    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stage table errors
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid stage record on line {line}: {content:?}")]
    Parse { line: usize, content: String },
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode {}: {reason}", .path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("Playback timed out")]
    PlaybackTimeout,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

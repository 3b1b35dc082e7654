//! # DiRTy Pacenotes
//!
//! Calls rally pacenotes from live DiRT Rally telemetry.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     TELEMETRY WORKER (one thread)                     │
//! │                                                                       │
//! │  ┌──────────────┐   ┌────────────────┐   ┌─────────────────────────┐ │
//! │  │ UDP socket   │──▶│ TelemetryFrame │──▶│ TelemetryLoop           │ │
//! │  │ (telemetry)  │   │ decode         │   │ Awaiting → Detecting →  │ │
//! │  └──────────────┘   └────────────────┘   │ Loading → Streaming     │ │
//! │                                          └───┬─────────┬───────────┘ │
//! │                    ┌─────────────────────────┘         │             │
//! │                    ▼                                   ▼             │
//! │  ┌───────────────────────┐   ┌────────────────────────────────────┐  │
//! │  │ StageIdentifier       │   │ PacenoteSchedule                   │  │
//! │  │ length + start pos    │   │ authored → effective distances     │  │
//! │  └───────────────────────┘   └─────────────────┬──────────────────┘  │
//! │                                                ▼                     │
//! │                              ┌────────────────────────────────────┐  │
//! │                              │ CueDispatcher → SoundBank → cpal   │  │
//! │                              └────────────────────────────────────┘  │
//! └───────────────▲───────────────────────────────────┬──────────────────┘
//!                 │ mailboxes (delay, gain, notes,     │ LoopEvent channel
//!                 │ reset, stop)                       ▼
//! ┌───────────────┴──────────────────────────────────────────────────────┐
//! │                     UI CONTEXT (web UI / binary)                     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod control;
pub mod error;
pub mod pacenotes;
pub mod runner;
pub mod stages;
pub mod telemetry;
#[cfg(feature = "web-ui")]
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default UDP port the simulator sends telemetry to
    pub const DEFAULT_UDP_PORT: u16 = 20777;

    /// Default HTTP port for the web UI
    pub const DEFAULT_WS_PORT: u16 = 8080;

    /// Default gain offset in dB
    pub const DEFAULT_VOLUME: i32 = 5;

    /// Socket read timeout in milliseconds
    pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 250;

    /// How long shutdown waits for the worker
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 500;

    /// Distance assumed for the tick before the first one of a stage run
    pub const INITIAL_PREVIOUS_DISTANCE: i32 = -20;
}

//! Telemetry worker: the loop turning packets into pacenote calls, and the
//! thread that hosts it

pub mod params;
pub mod state;
pub mod telemetry_loop;
pub mod worker;

pub use params::RuntimeParameters;
pub use state::{LoopExit, LoopState, RestartDetector};
pub use telemetry_loop::TelemetryLoop;
pub use worker::{spawn, WorkerHandle, WorkerSetup};

//! Telemetry ingest: UDP socket and frame decoding

pub mod frame;
pub mod socket;

pub use frame::{TelemetryFrame, FRAME_SIZE};
pub use socket::{PacketSource, Recv, TelemetrySocket, RECV_BUFFER_SIZE};

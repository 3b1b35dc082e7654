//! Web UI: control API and live event stream

pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{spawn_event_bridge, AppState, StatusSnapshot, WebServer};

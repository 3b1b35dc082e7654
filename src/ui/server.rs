//! Web server hosting the control API and event stream

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use axum::{
    routing::{get, post, put},
    Router,
};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use crate::config::{DelayMode, PacenoteConfig, UiConfig};
use crate::control::{ControlHandle, LoopEvent};
use crate::error::{Error, Result};
use crate::stages::StageRef;
use crate::ui::{handlers, websocket};

/// Capacity of the per-client event broadcast
const EVENT_BROADCAST_CAPACITY: usize = 256;

/// What the UI shows, rebuilt from worker events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub stage: Option<StageRef>,
    pub pacenote_count: usize,
    pub pacenotes_missing: bool,
    pub delay: DelayMode,
    /// RECCE or STAGE
    pub mode: String,
    pub volume: i32,
    pub distance: Option<i32>,
    pub paused: bool,
    pub assets_loaded: usize,
    pub assets_total: usize,
    pub missing_sounds: Vec<String>,
    pub connected: bool,
}

impl StatusSnapshot {
    pub fn new(pacenotes: &PacenoteConfig) -> Self {
        Self {
            delay: pacenotes.delay,
            mode: pacenotes.delay.label().to_string(),
            volume: pacenotes.volume,
            connected: true,
            ..Default::default()
        }
    }

    pub fn set_delay(&mut self, delay: DelayMode) {
        self.delay = delay;
        self.mode = delay.label().to_string();
    }

    /// Fold one worker event into the snapshot
    pub fn apply(&mut self, event: &LoopEvent) {
        match event {
            LoopEvent::AssetLoadProgress { loaded, total } => {
                self.assets_loaded = *loaded;
                self.assets_total = *total;
            }
            LoopEvent::StageChanged { name, folder } => {
                self.stage = Some(StageRef::new(name.as_str(), folder.as_str()));
                self.distance = None;
            }
            LoopEvent::PacenotesLoaded { count } => {
                self.pacenote_count = *count;
                self.pacenotes_missing = false;
            }
            LoopEvent::PacenoteFileMissing { .. } | LoopEvent::PacenoteLoadFailed { .. } => {
                self.pacenote_count = 0;
                self.pacenotes_missing = true;
            }
            LoopEvent::DistanceProgress { current, .. } => self.distance = Some(*current),
            LoopEvent::PauseState { paused } => self.paused = *paused,
            LoopEvent::MissingSound { identifier } => {
                if !self.missing_sounds.contains(identifier) {
                    self.missing_sounds.push(identifier.clone());
                }
            }
            LoopEvent::ConnectionLost | LoopEvent::Stopped => self.connected = false,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub control: ControlHandle,
    pub status: RwLock<StatusSnapshot>,
    pub events: broadcast::Sender<LoopEvent>,
}

impl AppState {
    pub fn new(control: ControlHandle, pacenotes: &PacenoteConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        Arc::new(Self {
            control,
            status: RwLock::new(StatusSnapshot::new(pacenotes)),
            events,
        })
    }
}

/// Forward worker events into the snapshot and the broadcast.
///
/// Runs on its own thread until the worker drops its end of the channel.
pub fn spawn_event_bridge(
    events: Receiver<LoopEvent>,
    state: Arc<AppState>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("ui-events".to_string())
        .spawn(move || {
            for event in events.iter() {
                state.status.write().apply(&event);
                // No subscribers is fine
                let _ = state.events.send(event);
            }
            tracing::debug!("Event bridge closed");
        })
}

/// Web server
pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/status", get(handlers::get_status))
            .route("/api/delay", post(handlers::set_delay))
            .route("/api/volume", post(handlers::set_volume))
            .route("/api/reset", post(handlers::reset))
            .route("/api/pacenotes", put(handlers::replace_pacenotes))
            .route("/ws", get(websocket::ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid UI address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web UI listening on http://{}", addr);

        axum::serve(listener, Self::router(self.state)).await?;
        Ok(())
    }

    /// Run on the current tokio runtime
    pub fn start_background(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Web UI stopped: {}", e);
            }
        })
    }
}

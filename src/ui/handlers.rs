//! HTTP API handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::DelayMode;
use crate::pacenotes::PacenoteSet;
use crate::ui::server::{AppState, StatusSnapshot};

/// API response wrapper
#[derive(Debug, serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Current status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusSnapshot>> {
    Json(ApiResponse::ok(state.status.read().clone()))
}

#[derive(Debug, Deserialize)]
pub struct DelayRequest {
    pub delay: DelayMode,
}

/// Change how early pacenotes are called
pub async fn set_delay(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DelayRequest>,
) -> (StatusCode, Json<ApiResponse<i32>>) {
    let offset = req.delay.offset();
    state.control.set_delay(offset);
    state.status.write().set_delay(req.delay);
    tracing::info!("Delay set to {:?} ({} m)", req.delay, offset);

    (StatusCode::OK, Json(ApiResponse::ok(offset)))
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: i32,
}

/// Change the gain offset, 0 to 10 dB
pub async fn set_volume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VolumeRequest>,
) -> (StatusCode, Json<ApiResponse<i32>>) {
    if !(0..=10).contains(&req.volume) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("volume {} out of range 0..=10", req.volume))),
        );
    }

    state.control.set_gain(req.volume as f32);
    state.status.write().volume = req.volume;

    (StatusCode::OK, Json(ApiResponse::ok(req.volume)))
}

/// End the current stage run
pub async fn reset(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ApiResponse<()>>) {
    state.control.reset();
    tracing::info!("Reset requested from web UI");
    (StatusCode::OK, Json(ApiResponse::ok(())))
}

/// Pacenote file contents, one `<distance>,<cue>` per line
#[derive(Debug, Deserialize)]
pub struct PacenoteRequest {
    pub text: String,
}

/// Replace the active stage's pacenotes
pub async fn replace_pacenotes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PacenoteRequest>,
) -> (StatusCode, Json<ApiResponse<usize>>) {
    match PacenoteSet::parse(&req.text) {
        Ok(entries) => {
            let count = entries.len();
            state.control.replace_pacenotes(entries);
            let mut status = state.status.write();
            status.pacenote_count = count;
            status.pacenotes_missing = false;
            (StatusCode::OK, Json(ApiResponse::ok(count)))
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    }
}

use super::state::AppState;
use crate::catalog::AudioDevice;
use crate::monitor::{MonitorCommand, MonitorStatus, SelectorState};
use crate::render;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: MonitorStatus,
    pub loudness_percent: u8,
    pub level_text: String,
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<AudioDevice>,
    pub selected: Option<usize>,
    /// Set when the selector shows a placeholder instead of devices
    pub placeholder: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status
/// Monitor state plus the live loudness readout
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    let meter = *render::lock(&state.display).meter();

    Json(StatusResponse {
        status,
        loudness_percent: meter.percent(),
        level_text: meter.text(),
    })
}

/// GET /devices
/// Devices from the last enumeration
pub async fn get_devices(State(state): State<AppState>) -> impl IntoResponse {
    let selector = state.status.borrow().panel.selector.clone();

    let (devices, selected) = match &selector {
        SelectorState::Devices { options, selected } => (options.clone(), *selected),
        _ => (Vec::new(), None),
    };

    Json(DevicesResponse {
        devices,
        selected,
        placeholder: selector.placeholder(),
    })
}

/// GET /snapshot.png
/// PNG of the drawing surface as last rendered
pub async fn get_snapshot(State(state): State<AppState>) -> Response {
    let encoded = render::lock(&state.display).surface().encode_png();

    match encoded {
        Ok(png) => (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => {
            error!("Failed to encode snapshot: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to encode snapshot: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /monitor/start
pub async fn start_monitor(State(state): State<AppState>) -> Response {
    submit(&state, MonitorCommand::Start).await
}

/// POST /monitor/stop
pub async fn stop_monitor(State(state): State<AppState>) -> Response {
    submit(&state, MonitorCommand::Stop).await
}

/// POST /monitor/toggle
pub async fn toggle_monitor(State(state): State<AppState>) -> Response {
    submit(&state, MonitorCommand::Toggle).await
}

/// POST /monitor/select/:index
pub async fn select_device(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    submit(&state, MonitorCommand::Select(index)).await
}

/// POST /devices/refresh
pub async fn refresh_devices(State(state): State<AppState>) -> Response {
    submit(&state, MonitorCommand::Refresh).await
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Queue a command for the controller; it is applied asynchronously
async fn submit(state: &AppState, command: MonitorCommand) -> Response {
    let name = format!("{:?}", command);
    info!("Queueing monitor command {}", name);

    match state.commands.send(command).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(CommandResponse {
                accepted: true,
                command: name,
            }),
        )
            .into_response(),
        Err(_) => {
            error!("Monitor controller is not running");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Monitor controller is not running".to_string(),
                }),
            )
                .into_response()
        }
    }
}

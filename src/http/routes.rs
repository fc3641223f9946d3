use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Panel queries
        .route("/status", get(handlers::get_status))
        .route("/devices", get(handlers::get_devices))
        .route("/snapshot.png", get(handlers::get_snapshot))
        // Monitor control
        .route("/monitor/start", post(handlers::start_monitor))
        .route("/monitor/stop", post(handlers::stop_monitor))
        .route("/monitor/toggle", post(handlers::toggle_monitor))
        .route("/monitor/select/:index", post(handlers::select_device))
        .route("/devices/refresh", post(handlers::refresh_devices))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

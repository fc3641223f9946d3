//! HTTP API for the diagnostics panel
//!
//! - GET /health - Health check
//! - GET /status - Monitor state, panel controls and live loudness
//! - GET /devices - Current device catalog
//! - GET /snapshot.png - Current canvas contents
//! - POST /monitor/start, /monitor/stop, /monitor/toggle - Capture control
//! - POST /monitor/select/:index - Choose an input device
//! - POST /devices/refresh - Re-enumerate input devices

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

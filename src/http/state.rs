use crate::monitor::{MonitorCommand, MonitorStatus};
use crate::render::SharedDisplay;
use tokio::sync::{mpsc, watch};

/// Shared application state for HTTP handlers
///
/// Handlers never touch the capture session; they send commands to the
/// controller and read the status it publishes.
#[derive(Clone)]
pub struct AppState {
    /// Command queue drained by `MonitorController::run`
    pub commands: mpsc::Sender<MonitorCommand>,
    /// Latest status published by the controller
    pub status: watch::Receiver<MonitorStatus>,
    /// Canvas and loudness meter updated by the render loop
    pub display: SharedDisplay,
}

impl AppState {
    pub fn new(
        commands: mpsc::Sender<MonitorCommand>,
        status: watch::Receiver<MonitorStatus>,
        display: SharedDisplay,
    ) -> Self {
        Self {
            commands,
            status,
            display,
        }
    }
}

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::notifier::Notifier;
use super::panel::{PanelState, SelectorState, ToggleButton};
use crate::audio::AudioHost;
use crate::catalog::{DeviceCatalog, EnumerationError, PermissionState};
use crate::render::SharedDisplay;
use crate::session::{CaptureError, CaptureSession, SessionInfo, SessionOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason")]
pub enum MonitorState {
    /// No device selected
    Idle,
    /// Device selected, not capturing
    Ready,
    /// Session active and rendering
    Capturing,
    /// Last start failed; stays here until the user acts or devices change
    Failed(CaptureError),
}

/// Who asked for a capture to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOrigin {
    /// Unattended start after enumeration; failures stay silent
    Auto,
    /// Explicit user action; failures raise an alert
    User,
}

/// Requests handled one at a time by `MonitorController::run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    Toggle,
    Start,
    Stop,
    Select(usize),
    Refresh,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Start capturing the selected device after every enumeration
    pub auto_start: bool,
    pub session: SessionOptions,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            auto_start: true,
            session: SessionOptions::default(),
        }
    }
}

/// Published after every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub panel: PanelState,
    pub permission: PermissionState,
    pub session: Option<SessionInfo>,
}

/// State machine coordinating the catalog, the capture session and the display
pub struct MonitorController {
    host: Arc<dyn AudioHost>,
    catalog: DeviceCatalog,
    session: Option<CaptureSession>,
    display: SharedDisplay,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    state: MonitorState,
    selector: SelectorState,
    status_tx: watch::Sender<MonitorStatus>,
}

impl MonitorController {
    pub fn new(
        host: Arc<dyn AudioHost>,
        display: SharedDisplay,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
    ) -> Self {
        let catalog = DeviceCatalog::new(Arc::clone(&host));
        let selector = SelectorState::Pending;
        let (status_tx, _) = watch::channel(MonitorStatus {
            state: MonitorState::Idle,
            panel: PanelState {
                selector: selector.clone(),
                toggle: ToggleButton::new(false, false),
            },
            permission: PermissionState::Unknown,
            session: None,
        });

        Self {
            host,
            catalog,
            session: None,
            display,
            notifier,
            settings,
            state: MonitorState::Idle,
            selector,
            status_tx,
        }
    }

    /// First enumeration, with auto-start if enabled
    pub async fn initialize(&mut self) {
        self.enumerate(None).await;
    }

    /// Re-run enumeration from scratch after the device set changed
    ///
    /// Any running session is torn down first. The previously selected device
    /// is re-selected when it is still present.
    pub async fn on_device_change(&mut self) {
        info!("Input devices changed, re-enumerating");
        let preferred = self.catalog.selected().map(|d| d.id.clone());
        self.enumerate(preferred).await;
    }

    async fn enumerate(&mut self, preferred: Option<String>) {
        self.teardown().await;

        match self.catalog.refresh().await {
            Ok(devices) if devices.is_empty() => {
                self.selector = SelectorState::NoDevices;
                self.transition(MonitorState::Idle);
            }
            Ok(devices) => {
                let reselected = preferred
                    .as_deref()
                    .is_some_and(|id| self.catalog.select_id(id));
                if !reselected {
                    self.catalog.select(0);
                }
                self.selector = SelectorState::Devices {
                    options: devices,
                    selected: self.catalog.selected_index(),
                };
                self.transition(MonitorState::Ready);

                if self.settings.auto_start {
                    self.start(StartOrigin::Auto).await;
                }
            }
            Err(EnumerationError::Unsupported) => {
                self.selector = SelectorState::Unsupported;
                self.transition(MonitorState::Idle);
            }
            Err(EnumerationError::AccessFailed(detail)) => {
                warn!("Device enumeration failed: {}", detail);
                self.selector = SelectorState::AccessDenied { detail };
                self.transition(MonitorState::Idle);
            }
        }

        self.publish();
    }

    /// Start capturing the selected device, superseding any running session
    pub async fn start(&mut self, origin: StartOrigin) {
        let Some(device_id) = self.catalog.selected().map(|d| d.id.clone()) else {
            debug!("Start ignored: no device selected");
            return;
        };

        self.teardown().await;

        let result = CaptureSession::start(
            self.host.as_ref(),
            &self.catalog,
            &device_id,
            &self.settings.session,
            Arc::clone(&self.display),
        )
        .await;

        match result {
            Ok(session) => {
                self.session = Some(session);
                self.transition(MonitorState::Capturing);
            }
            Err(e) => {
                match origin {
                    // Unattended start: log only, no alert
                    StartOrigin::Auto => debug!("Auto-start failed: {}", e),
                    StartOrigin::User => self.notifier.alert(&e.user_message()),
                }
                self.transition(MonitorState::Failed(e));
            }
        }

        self.publish();
    }

    /// Stop capturing; safe to call when nothing is running
    pub async fn stop(&mut self) {
        let was_capturing = self.session.is_some();
        self.teardown().await;

        if was_capturing || self.state == MonitorState::Capturing {
            let next = if self.catalog.selected().is_some() {
                MonitorState::Ready
            } else {
                MonitorState::Idle
            };
            self.transition(next);
            self.publish();
        }
    }

    /// Start/stop button
    pub async fn toggle(&mut self) {
        if self.state == MonitorState::Capturing {
            self.stop().await;
        } else {
            self.start(StartOrigin::User).await;
        }
    }

    /// Select a device by selector position
    ///
    /// While capturing, picking a different device restarts capture on it so
    /// the running session always matches the selection.
    pub async fn select(&mut self, index: usize) -> bool {
        let previous = self.catalog.selected_index();
        if self.catalog.select(index).is_none() {
            warn!("Ignoring selection of unknown device index {}", index);
            return false;
        }

        if let SelectorState::Devices { selected, .. } = &mut self.selector {
            *selected = Some(index);
        }

        if self.state == MonitorState::Capturing {
            if previous != Some(index) {
                self.start(StartOrigin::User).await;
            }
        } else {
            self.transition(MonitorState::Ready);
            self.publish();
        }

        true
    }

    /// Apply one command; returns false once the controller should shut down
    pub async fn handle(&mut self, command: MonitorCommand) -> bool {
        debug!("Handling {:?}", command);
        match command {
            MonitorCommand::Toggle => self.toggle().await,
            MonitorCommand::Start => self.start(StartOrigin::User).await,
            MonitorCommand::Stop => self.stop().await,
            MonitorCommand::Select(index) => {
                self.select(index).await;
            }
            MonitorCommand::Refresh => self.on_device_change().await,
            MonitorCommand::Shutdown => return false,
        }
        true
    }

    /// Drive the controller until shutdown
    ///
    /// Commands and device-change notifications are processed strictly one at
    /// a time, so no two starts or stops are ever in flight together.
    pub async fn run(mut self, mut commands: mpsc::Receiver<MonitorCommand>) {
        let mut changes = self.host.subscribe_device_changes();
        let mut watching = true;

        self.initialize().await;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle(command).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                change = changes.recv(), if watching => {
                    match change {
                        Ok(_) | Err(RecvError::Lagged(_)) => self.on_device_change().await,
                        Err(RecvError::Closed) => {
                            debug!("Device change source closed");
                            watching = false;
                        }
                    }
                }
            }
        }

        self.stop().await;
        info!("Monitor controller shut down");
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop().await;
        }
    }

    fn transition(&mut self, next: MonitorState) {
        if self.state != next {
            info!("Monitor state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            state: self.state.clone(),
            panel: self.panel(),
            permission: self.catalog.permission(),
            session: self.session.as_ref().map(|s| s.info()),
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    pub fn panel(&self) -> PanelState {
        PanelState {
            selector: self.selector.clone(),
            toggle: ToggleButton::new(
                self.state == MonitorState::Capturing,
                self.catalog.selected().is_some(),
            ),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn display(&self) -> &SharedDisplay {
        &self.display
    }
}

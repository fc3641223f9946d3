//! Microphone monitor state machine
//!
//! `MonitorController` reacts to user commands and device-change
//! notifications, drives the device catalog and owns the one capture session.

mod controller;
mod notifier;
mod panel;

pub use controller::{
    MonitorCommand, MonitorController, MonitorSettings, MonitorState, MonitorStatus, StartOrigin,
};
pub use notifier::{LogNotifier, Notifier};
pub use panel::{PanelState, SelectorState, ToggleButton, ACTIVE_TOGGLE_COLOR};

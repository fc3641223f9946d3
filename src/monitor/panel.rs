use serde::Serialize;

use crate::catalog::AudioDevice;

/// Background colour of the toggle while capturing
pub const ACTIVE_TOGGLE_COLOR: &str = "#ff4444";

/// Contents of the device selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorState {
    /// Enumeration has not run yet
    Pending,
    Devices {
        options: Vec<AudioDevice>,
        selected: Option<usize>,
    },
    NoDevices,
    Unsupported,
    AccessDenied { detail: String },
}

impl SelectorState {
    /// Text shown in place of the option list, if any
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            SelectorState::Pending => Some("Select a microphone..."),
            SelectorState::Devices { .. } => None,
            SelectorState::NoDevices => Some("No microphones found"),
            SelectorState::Unsupported => {
                Some("Microphone listing unsupported here (serve over HTTPS)")
            }
            SelectorState::AccessDenied { .. } => Some("Device access failed"),
        }
    }

    pub fn selected_device(&self) -> Option<&AudioDevice> {
        match self {
            SelectorState::Devices {
                options,
                selected: Some(index),
            } => options.get(*index),
            _ => None,
        }
    }
}

/// Start/stop toggle as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleButton {
    pub label: &'static str,
    pub enabled: bool,
    /// Highlight colour while capturing, default styling otherwise
    pub color: Option<&'static str>,
}

impl ToggleButton {
    pub fn new(capturing: bool, has_selection: bool) -> Self {
        if capturing {
            Self {
                label: "Stop",
                enabled: true,
                color: Some(ACTIVE_TOGGLE_COLOR),
            }
        } else {
            Self {
                label: "Start",
                enabled: has_selection,
                color: None,
            }
        }
    }
}

/// User-facing controls of the microphone panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelState {
    pub selector: SelectorState,
    pub toggle: ToggleButton,
}

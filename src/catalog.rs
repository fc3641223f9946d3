//! Audio input device catalog
//!
//! The catalog owns the last enumeration result, the permission state and the
//! current selection. Every refresh replaces the device list wholesale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::{AudioHost, HostError, StreamRequest};

/// An enumerated audio input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Opaque platform identifier
    pub id: String,
    /// Human-readable name, empty when the platform hides it
    pub label: String,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumerationError {
    /// Enumeration is not available at all in this environment
    #[error("audio input enumeration is not supported here; serve over HTTPS or use a supported platform")]
    Unsupported,
    #[error("device access failed: {0}")]
    AccessFailed(String),
}

pub struct DeviceCatalog {
    host: Arc<dyn AudioHost>,
    permission: PermissionState,
    devices: Vec<AudioDevice>,
    selected: Option<usize>,
}

impl DeviceCatalog {
    pub fn new(host: Arc<dyn AudioHost>) -> Self {
        Self {
            host,
            permission: PermissionState::Unknown,
            devices: Vec::new(),
            selected: None,
        }
    }

    /// Re-enumerate input devices
    ///
    /// A transient probe stream is opened and released first to negotiate
    /// permission. Probe failure only degrades labels. The previous selection
    /// is cleared; callers re-select from the new list.
    pub async fn refresh(&mut self) -> Result<Vec<AudioDevice>, EnumerationError> {
        self.devices.clear();
        self.selected = None;

        if !self.host.environment().supports_enumeration() {
            warn!("Audio input enumeration unsupported on host {}", self.host.name());
            return Err(EnumerationError::Unsupported);
        }

        self.probe().await;

        let listed = self.host.enumerate_inputs().await.map_err(|e| match e {
            HostError::Unsupported | HostError::Security => EnumerationError::Unsupported,
            other => EnumerationError::AccessFailed(other.to_string()),
        })?;

        self.devices = listed
            .into_iter()
            .enumerate()
            .map(|(index, device)| {
                if device.label.is_empty() {
                    AudioDevice::new(device.id, anonymous_label(index))
                } else {
                    device
                }
            })
            .collect();

        info!(
            "Enumerated {} audio input(s) (permission: {:?})",
            self.devices.len(),
            self.permission
        );

        Ok(self.devices.clone())
    }

    async fn probe(&mut self) {
        match self.host.open_input(StreamRequest::probe()).await {
            Ok(mut stream) => {
                if let Err(e) = stream.stop() {
                    warn!("Failed to release permission probe: {}", e);
                }
                drop(stream);
                self.permission = PermissionState::Granted;
                debug!("Permission probe succeeded");
            }
            Err(HostError::NotAllowed) => {
                self.permission = PermissionState::Denied;
                warn!("Microphone permission refused; labels will be anonymous");
            }
            Err(e) => {
                debug!("Permission probe failed, permission unresolved: {}", e);
            }
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.id == device_id)
    }

    /// Select by position in the last enumeration
    pub fn select(&mut self, index: usize) -> Option<&AudioDevice> {
        if index < self.devices.len() {
            self.selected = Some(index);
            self.devices.get(index)
        } else {
            None
        }
    }

    /// Select by id; returns false when the id is not in the last enumeration
    pub fn select_id(&mut self, device_id: &str) -> bool {
        match self.devices.iter().position(|d| d.id == device_id) {
            Some(index) => {
                self.selected = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&AudioDevice> {
        self.selected.and_then(|i| self.devices.get(i))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }
}

/// Fallback label for a device the platform did not name, 1-indexed
pub fn anonymous_label(index: usize) -> String {
    format!("Microphone {}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_labels_are_one_indexed() {
        assert_eq!(anonymous_label(0), "Microphone 1");
        assert_eq!(anonymous_label(4), "Microphone 5");
    }
}

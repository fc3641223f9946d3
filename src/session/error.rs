use serde::Serialize;

use crate::audio::HostError;

/// Why a capture session could not start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail")]
pub enum CaptureError {
    #[error("microphone permission was refused")]
    PermissionDenied,
    #[error("input device not found")]
    DeviceNotFound,
    #[error("input device is busy")]
    DeviceBusy,
    #[error("capture requires a secure context")]
    InsecureContext,
    #[error("capture failed: {0}")]
    Other(String),
}

impl CaptureError {
    /// Alert text for a user-initiated start that failed
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::PermissionDenied => {
                "Microphone access was denied. Allow microphone access in your system or browser settings and try again.".to_string()
            }
            CaptureError::DeviceNotFound => {
                "The selected microphone is no longer available. Reconnect it or choose another device.".to_string()
            }
            CaptureError::DeviceBusy => {
                "The selected microphone is in use by another application. Close that application and try again.".to_string()
            }
            CaptureError::InsecureContext => {
                "Microphone capture needs a secure context. Serve the panel over HTTPS or from localhost.".to_string()
            }
            CaptureError::Other(detail) => format!("Could not start the microphone: {}", detail),
        }
    }
}

impl From<HostError> for CaptureError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::NotAllowed => CaptureError::PermissionDenied,
            HostError::NotFound => CaptureError::DeviceNotFound,
            HostError::NotReadable => CaptureError::DeviceBusy,
            HostError::Security => CaptureError::InsecureContext,
            HostError::Unsupported => CaptureError::Other("audio input is not supported".to_string()),
            HostError::Other(detail) => CaptureError::Other(detail),
        }
    }
}

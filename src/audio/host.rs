use tokio::sync::{broadcast, mpsc};

use crate::catalog::AudioDevice;

/// Mono audio block delivered by an input stream
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Samples in [-1.0, 1.0], already downmixed to mono
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count of the hardware stream before downmixing
    pub channels: u16,
    /// Timestamp in milliseconds since the stream opened
    pub timestamp_ms: u64,
}

/// Which device a stream request is pinned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceConstraint {
    /// Whatever the platform considers its default input
    Any,
    /// Exactly this device id; never substituted
    Exact(String),
}

/// Constraints for opening an input stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub device: DeviceConstraint,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl StreamRequest {
    /// Unprocessed capture from exactly `device_id`
    pub fn raw(device_id: impl Into<String>) -> Self {
        Self {
            device: DeviceConstraint::Exact(device_id.into()),
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    /// Generic input used only to negotiate permission
    pub fn probe() -> Self {
        Self {
            device: DeviceConstraint::Any,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    /// True when any voice processing stage was requested
    pub fn wants_processing(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

/// What the hosting environment allows before any device is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Device enumeration is available at all
    pub enumeration_supported: bool,
    /// Capture APIs are exposed (the platform's secure-context rule is met)
    pub secure_context: bool,
}

impl HostEnvironment {
    pub fn native() -> Self {
        Self {
            enumeration_supported: true,
            secure_context: true,
        }
    }

    pub fn supports_enumeration(&self) -> bool {
        self.enumeration_supported && self.secure_context
    }
}

/// Notification that the set of input devices changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChange;

/// Platform-level failures, before they are mapped onto the monitor's error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("access to audio input was refused")]
    NotAllowed,
    #[error("requested input device is not available")]
    NotFound,
    #[error("input device is held by another application")]
    NotReadable,
    #[error("audio capture requires a secure context")]
    Security,
    #[error("audio input is not supported here")]
    Unsupported,
    #[error("{0}")]
    Other(String),
}

/// A live hardware input stream
///
/// Dropping a stream must release the hardware just like `stop`.
pub trait InputStream: Send {
    /// Hardware sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Hand over the frame receiver; only the first call returns `Some`
    fn take_receiver(&mut self) -> Option<mpsc::Receiver<AudioFrame>>;

    /// Stop every track and release the device. Safe to call more than once.
    fn stop(&mut self) -> Result<(), HostError>;

    /// Whether the hardware is still held
    fn is_live(&self) -> bool;
}

/// Audio input platform
///
/// Implementations:
/// - `CpalHost`: real hardware through cpal
/// - `FileHost`: WAV files replayed as virtual microphones
#[async_trait::async_trait]
pub trait AudioHost: Send + Sync {
    /// Host name for logging
    fn name(&self) -> &str;

    /// Capability check that needs no device access
    fn environment(&self) -> HostEnvironment;

    /// List every input-capable device
    ///
    /// Labels may be empty when the platform hides them before permission is granted.
    async fn enumerate_inputs(&self) -> Result<Vec<AudioDevice>, HostError>;

    /// Open an input stream matching `request`
    async fn open_input(&self, request: StreamRequest) -> Result<Box<dyn InputStream>, HostError>;

    /// Subscribe to device-change notifications
    fn subscribe_device_changes(&self) -> broadcast::Receiver<DeviceChange>;
}

pub mod analysis;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod http;
pub mod input;
pub mod monitor;
pub mod render;
pub mod session;

pub use analysis::{loudness_percent, AnalysisContext, AnalysisFrame, SignalAnalyzer};
pub use audio::{
    AudioFile, AudioFrame, AudioHost, CpalHost, DeviceChange, FileHost, HostEnvironment,
    HostError, InputStream, StreamRequest,
};
pub use catalog::{AudioDevice, DeviceCatalog, EnumerationError, PermissionState};
pub use config::Config;
pub use http::{create_router, AppState};
pub use input::{mouse_button_label, KeyHistory, MouseReadout};
pub use monitor::{
    LogNotifier, MonitorCommand, MonitorController, MonitorSettings, MonitorState, MonitorStatus,
    Notifier, StartOrigin,
};
pub use render::{Display, FrameRenderer, LevelMeter, PixmapSurface, SharedDisplay, Surface};
pub use session::{CaptureError, CaptureSession, SessionInfo, SessionOptions};

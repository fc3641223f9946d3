pub mod cpal_host;
pub mod file;
pub mod host;

pub use cpal_host::CpalHost;
pub use file::{AudioFile, FileHost};
pub use host::{
    AudioFrame, AudioHost, DeviceChange, DeviceConstraint, HostEnvironment, HostError,
    InputStream, StreamRequest,
};

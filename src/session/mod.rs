//! Capture session management
//!
//! A `CaptureSession` owns:
//! - the hardware input stream pinned to one device
//! - the analysis context bound to that stream
//! - the render loop handle that drives analysis and drawing each tick

mod error;
mod render_loop;
mod session;
mod stats;

pub use error::CaptureError;
pub use render_loop::{lock_context, RenderHandle, RenderLoop, SharedContext};
pub use session::{CaptureSession, SessionOptions};
pub use stats::SessionInfo;

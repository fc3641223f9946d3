use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::AudioDevice;

/// Snapshot of a capture session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Session identifier used in logs
    pub id: Uuid,

    /// Device the session is pinned to
    pub device: AudioDevice,

    /// Hardware sample rate in Hz
    pub sample_rate: u32,

    /// Analysis transform size
    pub frame_size: usize,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Whether the session still holds its stream
    pub running: bool,

    /// Render ticks completed
    pub ticks: u64,
}

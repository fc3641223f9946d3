use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::host::{
    AudioFrame, AudioHost, DeviceChange, DeviceConstraint, HostEnvironment, HostError,
    InputStream, StreamRequest,
};
use crate::catalog::AudioDevice;

/// Blocks per second pushed by a replayed file
const BLOCKS_PER_SECOND: u32 = 100;

/// WAV file decoded to mono f32
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let channels = spec.channels.max(1);
        let samples: Vec<f32> = interleaved
            .chunks(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} frames",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels,
            samples,
        })
    }
}

/// Input host that exposes WAV files as virtual microphones
///
/// Each file becomes one device with id `file:<path>`. Opening it replays the
/// file in real time, looping at the end.
pub struct FileHost {
    files: Vec<Arc<AudioFile>>,
    changes: broadcast::Sender<DeviceChange>,
}

impl FileHost {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let files = paths
            .iter()
            .map(|p| AudioFile::open(p).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let (changes, _) = broadcast::channel(4);

        Ok(Self { files, changes })
    }

    fn device_id(file: &AudioFile) -> String {
        format!("file:{}", file.path)
    }

    fn label(file: &AudioFile) -> String {
        Path::new(&file.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.path.clone())
    }
}

#[async_trait::async_trait]
impl AudioHost for FileHost {
    fn name(&self) -> &str {
        "file"
    }

    fn environment(&self) -> HostEnvironment {
        HostEnvironment::native()
    }

    async fn enumerate_inputs(&self) -> Result<Vec<AudioDevice>, HostError> {
        Ok(self
            .files
            .iter()
            .map(|f| AudioDevice::new(Self::device_id(f), Self::label(f)))
            .collect())
    }

    async fn open_input(&self, request: StreamRequest) -> Result<Box<dyn InputStream>, HostError> {
        let file = match &request.device {
            DeviceConstraint::Any => self.files.first(),
            DeviceConstraint::Exact(id) => self.files.iter().find(|f| Self::device_id(f) == *id),
        }
        .cloned()
        .ok_or(HostError::NotFound)?;

        if file.samples.is_empty() || file.sample_rate == 0 {
            return Err(HostError::Other(format!("{} holds no audio", file.path)));
        }

        let sample_rate = file.sample_rate;
        let (frame_tx, frame_rx) = mpsc::channel(64);
        let task = tokio::spawn(replay(file, frame_tx));

        Ok(Box::new(FileInputStream {
            sample_rate,
            receiver: Some(frame_rx),
            task: Some(task),
        }))
    }

    fn subscribe_device_changes(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

async fn replay(file: Arc<AudioFile>, frame_tx: mpsc::Sender<AudioFrame>) {
    let block = (file.sample_rate / BLOCKS_PER_SECOND).max(1) as usize;
    let mut interval =
        tokio::time::interval(Duration::from_millis(1000 / BLOCKS_PER_SECOND as u64));
    let mut elapsed_ms = 0u64;

    debug!("Replaying {} in {}-sample blocks", file.path, block);

    for chunk in file.samples.chunks(block).cycle() {
        interval.tick().await;

        let frame = AudioFrame {
            samples: chunk.to_vec(),
            sample_rate: file.sample_rate,
            channels: file.channels,
            timestamp_ms: elapsed_ms,
        };
        elapsed_ms += 1000 / BLOCKS_PER_SECOND as u64;

        if frame_tx.send(frame).await.is_err() {
            break;
        }
    }
}

struct FileInputStream {
    sample_rate: u32,
    receiver: Option<mpsc::Receiver<AudioFrame>>,
    task: Option<JoinHandle<()>>,
}

impl InputStream for FileInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_receiver(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.receiver.take()
    }

    fn stop(&mut self) -> Result<(), HostError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for FileInputStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

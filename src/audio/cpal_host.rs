// Hardware input host built on cpal
//
// cpal streams are not Send, so every stream lives on its own worker thread.
// The async side only sees a stop channel and the frame receiver.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, HostId, Sample, SizedSample};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use super::host::{
    AudioFrame, AudioHost, DeviceChange, DeviceConstraint, HostEnvironment, HostError,
    InputStream, StreamRequest,
};
use crate::catalog::AudioDevice;

/// Frames buffered between the audio callback and the render loop
const FRAME_CHANNEL_CAPACITY: usize = 64;

pub struct CpalHost {
    host_id: HostId,
    name: String,
    changes: broadcast::Sender<DeviceChange>,
    watcher: Option<tokio::task::JoinHandle<()>>,
}

impl CpalHost {
    /// Create a host on the platform default backend
    ///
    /// cpal has no device-change events, so a watcher task compares the device
    /// list every `poll_interval` and publishes a `DeviceChange` when it differs.
    /// Must be called inside a tokio runtime.
    pub fn new(poll_interval: Duration) -> Self {
        let host = cpal::default_host();
        let host_id = host.id();
        let name = format!("cpal/{}", host_id.name());
        let (changes, _) = broadcast::channel(16);

        info!("Audio host initialized: {}", name);

        let watcher = tokio::spawn(watch_devices(host_id, poll_interval, changes.clone()));

        Self {
            host_id,
            name,
            changes,
            watcher: Some(watcher),
        }
    }
}

impl Drop for CpalHost {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

#[async_trait::async_trait]
impl AudioHost for CpalHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn environment(&self) -> HostEnvironment {
        HostEnvironment {
            enumeration_supported: !cpal::available_hosts().is_empty(),
            secure_context: true,
        }
    }

    async fn enumerate_inputs(&self) -> Result<Vec<AudioDevice>, HostError> {
        let host_id = self.host_id;
        tokio::task::spawn_blocking(move || list_inputs(host_id))
            .await
            .map_err(|e| HostError::Other(format!("enumeration task failed: {}", e)))?
    }

    async fn open_input(&self, request: StreamRequest) -> Result<Box<dyn InputStream>, HostError> {
        if request.wants_processing() {
            // cpal delivers the raw device signal; there is no processing stage to enable
            warn!("Voice processing requested but cpal only provides raw input");
        }

        let host_id = self.host_id;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        let worker = thread::Builder::new()
            .name("cpal-input".to_string())
            .spawn(move || match open_stream(host_id, &request.device, frame_tx) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // Keep the stream alive until stop is requested or the handle is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                    debug!("cpal input worker released stream");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| HostError::Other(format!("failed to spawn input worker: {}", e)))?;

        let sample_rate = match ready_rx.await {
            Ok(result) => result?,
            Err(_) => {
                let _ = worker.join();
                return Err(HostError::Other("input worker exited early".to_string()));
            }
        };

        info!("cpal input stream open at {}Hz", sample_rate);

        Ok(Box::new(CpalInputStream {
            sample_rate,
            receiver: Some(frame_rx),
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        }))
    }

    fn subscribe_device_changes(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

/// Input stream whose cpal handle lives on a dedicated worker thread
struct CpalInputStream {
    sample_rate: u32,
    receiver: Option<mpsc::Receiver<AudioFrame>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl InputStream for CpalInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn take_receiver(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.receiver.take()
    }

    fn stop(&mut self) -> Result<(), HostError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| HostError::Other("input worker panicked".to_string()))?;
        }

        Ok(())
    }

    fn is_live(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to release cpal input: {}", e);
        }
    }
}

async fn watch_devices(
    host_id: HostId,
    poll_interval: Duration,
    changes: broadcast::Sender<DeviceChange>,
) {
    let mut interval = tokio::time::interval(poll_interval);
    let mut known: Option<HashSet<String>> = None;

    loop {
        interval.tick().await;

        let listed = tokio::task::spawn_blocking(move || list_inputs(host_id)).await;
        let ids: HashSet<String> = match listed {
            Ok(Ok(devices)) => devices.into_iter().map(|d| d.id).collect(),
            Ok(Err(e)) => {
                trace!("Device watcher could not list inputs: {}", e);
                continue;
            }
            Err(_) => continue,
        };

        if let Some(previous) = &known {
            if *previous != ids {
                info!("Input device set changed ({} -> {})", previous.len(), ids.len());
                // No receivers is fine; nobody is listening yet
                let _ = changes.send(DeviceChange);
            }
        }
        known = Some(ids);
    }
}

/// Enumerate inputs with ids derived from device names
///
/// cpal has no persistent device id; duplicate names get a `#n` suffix so ids
/// stay unique and stable for as long as the device order does.
fn list_inputs(host_id: HostId) -> Result<Vec<AudioDevice>, HostError> {
    let host = cpal::host_from_id(host_id).map_err(|_| HostError::Unsupported)?;
    let devices = host
        .input_devices()
        .map_err(|e| classify_backend(&e.to_string()))?;

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut listed = Vec::new();

    for device in devices {
        let label = device.name().unwrap_or_default();
        listed.push(AudioDevice::new(device_id(&label, &mut seen), label));
    }

    Ok(listed)
}

fn device_id(label: &str, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(label.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        label.to_string()
    } else {
        format!("{}#{}", label, count)
    }
}

fn find_device(host: &cpal::Host, constraint: &DeviceConstraint) -> Result<cpal::Device, HostError> {
    match constraint {
        DeviceConstraint::Any => host.default_input_device().ok_or(HostError::NotFound),
        DeviceConstraint::Exact(id) => {
            let devices = host
                .input_devices()
                .map_err(|e| classify_backend(&e.to_string()))?;
            let mut seen = HashMap::new();
            for device in devices {
                let label = device.name().unwrap_or_default();
                if device_id(&label, &mut seen) == *id {
                    return Ok(device);
                }
            }
            Err(HostError::NotFound)
        }
    }
}

fn open_stream(
    host_id: HostId,
    constraint: &DeviceConstraint,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<(cpal::Stream, u32), HostError> {
    let host = cpal::host_from_id(host_id).map_err(|_| HostError::Unsupported)?;
    let device = find_device(&host, constraint)?;

    let config = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => HostError::NotFound,
        cpal::DefaultStreamConfigError::BackendSpecific { err } => classify_backend(&err.description),
        other => HostError::Other(other.to_string()),
    })?;

    let sample_rate = config.sample_rate().0;
    debug!(
        "Opening input: {}Hz, {} channels, {:?}",
        sample_rate,
        config.channels(),
        config.sample_format()
    );

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, frame_tx),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, frame_tx),
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, frame_tx),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, frame_tx),
        cpal::SampleFormat::U8 => build_stream::<u8>(&device, &config, frame_tx),
        other => {
            return Err(HostError::Other(format!("unsupported sample format: {:?}", other)));
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => HostError::NotFound,
        cpal::BuildStreamError::BackendSpecific { err } => classify_backend(&err.description),
        other => HostError::Other(other.to_string()),
    })?;

    stream.play().map_err(|e| match e {
        cpal::PlayStreamError::DeviceNotAvailable => HostError::NotFound,
        cpal::PlayStreamError::BackendSpecific { err } => classify_backend(&err.description),
        #[allow(unreachable_patterns)]
        other => HostError::Other(other.to_string()),
    })?;

    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels().max(1);
    let sample_rate = config.sample_rate().0;
    let opened_at = Instant::now();

    device.build_input_stream(
        &config.config(),
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data
                .chunks(channels as usize)
                .map(|frame| {
                    frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32
                })
                .collect();

            let frame = AudioFrame {
                samples,
                sample_rate,
                channels,
                timestamp_ms: opened_at.elapsed().as_millis() as u64,
            };

            // Render loop is behind; dropping keeps the callback real-time
            if let Err(e) = frame_tx.try_send(frame) {
                trace!("Dropping input frame: {}", e);
            }
        },
        |err| error!("Input stream error: {}", err),
        None,
    )
}

/// Map an opaque backend message onto the host error it most likely means
fn classify_backend(description: &str) -> HostError {
    let lowered = description.to_lowercase();
    if lowered.contains("busy") || lowered.contains("in use") || lowered.contains("exclusive") {
        HostError::NotReadable
    } else if lowered.contains("permission")
        || lowered.contains("not permitted")
        || lowered.contains("denied")
    {
        HostError::NotAllowed
    } else if lowered.contains("no such device") || lowered.contains("not found") {
        HostError::NotFound
    } else {
        HostError::Other(description.to_string())
    }
}

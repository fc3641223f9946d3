// Scripted audio host shared by the integration tests
//
// FakeHost serves a fixed device list and counts how many input streams are
// open at any moment, so tests can assert that sessions never leak hardware.

#![allow(dead_code)]

use periph_diag::audio::{DeviceChange, DeviceConstraint};
use periph_diag::monitor::Notifier;
use periph_diag::render::{self, Display, Rgba, SharedDisplay, Surface};
use periph_diag::{
    AudioDevice, AudioFrame, AudioHost, HostEnvironment, HostError, InputStream, StreamRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

pub const FAKE_SAMPLE_RATE: u32 = 48_000;

#[derive(Default)]
struct Script {
    devices: Vec<AudioDevice>,
    enumerate_error: Option<HostError>,
    probe_error: Option<HostError>,
    open_errors: HashMap<String, HostError>,
    requests: Vec<StreamRequest>,
}

pub struct FakeHost {
    environment: Mutex<HostEnvironment>,
    script: Mutex<Script>,
    open_streams: Arc<AtomicUsize>,
    opened_total: AtomicUsize,
    changes: broadcast::Sender<DeviceChange>,
    /// Constant sample value fed into every opened stream
    level: Mutex<f32>,
}

impl FakeHost {
    pub fn new(devices: Vec<AudioDevice>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(8);
        Arc::new(Self {
            environment: Mutex::new(HostEnvironment::native()),
            script: Mutex::new(Script {
                devices,
                ..Script::default()
            }),
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened_total: AtomicUsize::new(0),
            changes,
            level: Mutex::new(0.0),
        })
    }

    /// Host with `count` labelled microphones, ids "mic-0", "mic-1", ...
    pub fn with_mics(count: usize) -> Arc<Self> {
        Self::new(
            (0..count)
                .map(|i| AudioDevice::new(format!("mic-{}", i), format!("Test Mic {}", i)))
                .collect(),
        )
    }

    pub fn set_environment(&self, environment: HostEnvironment) {
        *self.environment.lock().unwrap() = environment;
    }

    pub fn set_devices(&self, devices: Vec<AudioDevice>) {
        self.script.lock().unwrap().devices = devices;
    }

    pub fn fail_enumeration(&self, error: HostError) {
        self.script.lock().unwrap().enumerate_error = Some(error);
    }

    pub fn fail_probe(&self, error: HostError) {
        self.script.lock().unwrap().probe_error = Some(error);
    }

    pub fn fail_open(&self, device_id: &str, error: HostError) {
        self.script
            .lock()
            .unwrap()
            .open_errors
            .insert(device_id.to_string(), error);
    }

    pub fn set_level(&self, level: f32) {
        *self.level.lock().unwrap() = level;
    }

    /// Fire a device-change notification
    pub fn trigger_change(&self) {
        let _ = self.changes.send(DeviceChange);
    }

    /// Streams currently holding (fake) hardware
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Streams ever opened, probes included
    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.script.lock().unwrap().requests.clone()
    }
}

#[async_trait::async_trait]
impl AudioHost for FakeHost {
    fn name(&self) -> &str {
        "fake"
    }

    fn environment(&self) -> HostEnvironment {
        *self.environment.lock().unwrap()
    }

    async fn enumerate_inputs(&self) -> Result<Vec<AudioDevice>, HostError> {
        let script = self.script.lock().unwrap();
        match &script.enumerate_error {
            Some(error) => Err(error.clone()),
            None => Ok(script.devices.clone()),
        }
    }

    async fn open_input(&self, request: StreamRequest) -> Result<Box<dyn InputStream>, HostError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());

        match &request.device {
            DeviceConstraint::Any => {
                if let Some(error) = &script.probe_error {
                    return Err(error.clone());
                }
            }
            DeviceConstraint::Exact(id) => {
                if let Some(error) = script.open_errors.get(id) {
                    return Err(error.clone());
                }
                if !script.devices.iter().any(|d| &d.id == id) {
                    return Err(HostError::NotFound);
                }
            }
        }
        drop(script);

        let (tx, rx) = mpsc::channel(64);
        let level = *self.level.lock().unwrap();
        let _ = tx.try_send(AudioFrame {
            samples: vec![level; 4096],
            sample_rate: FAKE_SAMPLE_RATE,
            channels: 1,
            timestamp_ms: 0,
        });

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeStream {
            receiver: Some(rx),
            _sender: tx,
            live: true,
            open_streams: Arc::clone(&self.open_streams),
        }))
    }

    fn subscribe_device_changes(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

struct FakeStream {
    receiver: Option<mpsc::Receiver<AudioFrame>>,
    // Keeps the channel open for the lifetime of the stream
    _sender: mpsc::Sender<AudioFrame>,
    live: bool,
    open_streams: Arc<AtomicUsize>,
}

impl InputStream for FakeStream {
    fn sample_rate(&self) -> u32 {
        FAKE_SAMPLE_RATE
    }

    fn take_receiver(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.receiver.take()
    }

    fn stop(&mut self) -> Result<(), HostError> {
        if self.live {
            self.live = false;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Notifier that keeps every alert for inspection
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill(Rgba),
    Polyline(usize),
    Rect { x: f32, y: f32, width: f32, height: f32 },
}

/// Surface that records draw calls instead of rasterizing
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Arc<Mutex<Vec<DrawOp>>>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> (Self, Arc<Mutex<Vec<DrawOp>>>) {
        let ops = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                width,
                height,
                ops: Arc::clone(&ops),
            },
            ops,
        )
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill(&mut self, color: Rgba) {
        self.ops.lock().unwrap().push(DrawOp::Fill(color));
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], _color: Rgba, _line_width: f32) {
        self.ops.lock().unwrap().push(DrawOp::Polyline(points.len()));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, _color: Rgba) {
        self.ops.lock().unwrap().push(DrawOp::Rect {
            x,
            y,
            width,
            height,
        });
    }
}

pub fn raster_display() -> SharedDisplay {
    render::shared(Display::raster(64, 32).unwrap())
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}

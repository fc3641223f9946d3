use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::CaptureError;
use super::render_loop::{lock_context, RenderHandle, RenderLoop, SharedContext};
use super::stats::SessionInfo;
use crate::analysis::{AnalysisContext, AnalysisFrame, SignalAnalyzer, DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use crate::audio::{AudioHost, InputStream, StreamRequest};
use crate::catalog::{AudioDevice, DeviceCatalog};
use crate::render::{self, FrameRenderer, SharedDisplay};

/// Parameters fixed for the lifetime of a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub fft_size: usize,
    pub smoothing: f32,
    pub refresh_rate_hz: u32,
    pub renderer: FrameRenderer,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            refresh_rate_hz: 60,
            renderer: FrameRenderer::default(),
        }
    }
}

/// One open input stream with its analysis context and render loop
///
/// The session exclusively owns the hardware stream, the analysis context and
/// the render loop handle. `stop` releases all three and clears the display.
pub struct CaptureSession {
    id: Uuid,
    device: AudioDevice,
    sample_rate: u32,
    frame_size: usize,
    started_at: DateTime<Utc>,
    stream: Option<Box<dyn InputStream>>,
    context: SharedContext,
    render: RenderHandle,
    display: SharedDisplay,
    running: bool,
}

impl CaptureSession {
    /// Open `device_id` unprocessed and start rendering into `display`
    ///
    /// The id must come from the catalog's last enumeration; the host is asked
    /// for that exact device and never substitutes another.
    pub async fn start(
        host: &dyn AudioHost,
        catalog: &DeviceCatalog,
        device_id: &str,
        options: &SessionOptions,
        display: SharedDisplay,
    ) -> Result<Self, CaptureError> {
        if !host.environment().secure_context {
            return Err(CaptureError::InsecureContext);
        }

        let device = catalog
            .devices()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or(CaptureError::DeviceNotFound)?;

        let mut stream = host.open_input(StreamRequest::raw(device_id)).await?;

        let Some(receiver) = stream.take_receiver() else {
            if let Err(e) = stream.stop() {
                warn!("Failed to release stream without output: {}", e);
            }
            return Err(CaptureError::Other("input stream produced no frame output".to_string()));
        };

        let sample_rate = stream.sample_rate();
        let mut context = AnalysisContext::new(options.fft_size, options.smoothing, sample_rate);
        context.connect(receiver);
        let frame_size = context.fft_size();
        let context: SharedContext = Arc::new(Mutex::new(context));

        let render = RenderLoop::new(options.refresh_rate_hz, options.renderer.clone())
            .spawn(Arc::clone(&context), Arc::clone(&display));

        let id = Uuid::new_v4();
        info!(
            "Capture session {} started on '{}' ({}Hz, frame size {})",
            id, device.label, sample_rate, frame_size
        );

        Ok(Self {
            id,
            device,
            sample_rate,
            frame_size,
            started_at: Utc::now(),
            stream: Some(stream),
            context,
            render,
            display,
            running: true,
        })
    }

    /// Tear the session down; a second call does nothing
    ///
    /// Order: cancel the render tick, stop the hardware, close the analysis
    /// context, clear the display. A failing step is logged and the rest still run.
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        self.render.cancel().await;

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop() {
                warn!("Session {}: failed to stop input stream: {}", self.id, e);
            }
        }

        lock_context(&self.context).close();

        render::lock(&self.display).clear();

        info!("Capture session {} stopped", self.id);
    }

    /// Analyze the current buffers outside the render loop
    pub fn analyze(&self, analyzer: &SignalAnalyzer) -> AnalysisFrame {
        analyzer.analyze(&mut lock_context(&self.context))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the render tick is still scheduled
    pub fn is_rendering(&self) -> bool {
        self.render.is_scheduled()
    }

    /// Ticks rendered so far
    pub fn ticks(&self) -> u64 {
        self.render.ticks()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> &AudioDevice {
        &self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            device: self.device.clone(),
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
            started_at: self.started_at,
            running: self.running,
            ticks: self.render.ticks(),
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.running {
            return;
        }
        // Without an await point the tick can only be aborted, not joined
        warn!("Capture session {} dropped while running", self.id);
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.stop();
        }
        lock_context(&self.context).close();
        render::lock(&self.display).clear();
    }
}

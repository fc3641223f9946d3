use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::analysis::{AnalysisContext, SignalAnalyzer};
use crate::render::{self, FrameRenderer, SharedDisplay};

/// Analysis context shared between a session and its render loop
pub type SharedContext = Arc<Mutex<AnalysisContext>>;

pub fn lock_context(context: &SharedContext) -> MutexGuard<'_, AnalysisContext> {
    context.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a running render loop; cancelling it is the only way to end the loop
pub struct RenderHandle {
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl RenderHandle {
    /// Stop future ticks and wait until no tick is in progress
    ///
    /// Calling it again is a no-op.
    pub async fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // JoinError::Cancelled is the expected outcome
            let _ = task.await;
            debug!("Render loop cancelled after {} ticks", self.ticks());
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ticks completed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Repeating analyze-then-render task paced at the display refresh rate
pub struct RenderLoop {
    pub period: Duration,
    pub analyzer: SignalAnalyzer,
    pub renderer: FrameRenderer,
}

impl RenderLoop {
    pub fn new(refresh_rate_hz: u32, renderer: FrameRenderer) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / refresh_rate_hz.max(1) as f64),
            analyzer: SignalAnalyzer::new(),
            renderer,
        }
    }

    pub fn spawn(self, context: SharedContext, display: SharedDisplay) -> RenderHandle {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);

        let task = tokio::spawn(async move {
            // The interval arms the next tick before this one's work runs
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let frame = {
                    let mut ctx = lock_context(&context);
                    if ctx.is_closed() {
                        break;
                    }
                    self.analyzer.analyze(&mut ctx)
                };

                render::lock(&display).draw(&self.renderer, &frame);

                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                trace!("Tick {}: loudness {}%", n, frame.loudness_percent);
            }
        });

        RenderHandle {
            task: Some(task),
            ticks,
        }
    }
}

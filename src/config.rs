use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::analysis::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use crate::monitor::MonitorSettings;
use crate::render::FrameRenderer;
use crate::session::SessionOptions;

/// Prefix for environment overrides, e.g. `PERIPH_DIAG_MONITOR__AUTO_START=false`
const ENV_PREFIX: &str = "PERIPH_DIAG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub monitor: MonitorConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub auto_start: bool,
    pub refresh_rate_hz: u32,
    pub device_poll_ms: u64,
    pub fft_size: usize,
    pub smoothing: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Config {
    /// Defaults, then `path` (any format the config crate knows, optional),
    /// then `PERIPH_DIAG_*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    /// Built-in defaults only
    pub fn default_config() -> Result<Self> {
        Ok(Self::defaults()?.build()?.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "periph-diag")?
            .set_default("service.http.enabled", false)?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8787i64)?
            .set_default("monitor.auto_start", true)?
            .set_default("monitor.refresh_rate_hz", 60i64)?
            .set_default("monitor.device_poll_ms", 1000i64)?
            .set_default("monitor.fft_size", DEFAULT_FFT_SIZE as i64)?
            .set_default("monitor.smoothing", DEFAULT_SMOOTHING as f64)?
            .set_default("display.width", 640i64)?
            .set_default("display.height", 200i64)?)
    }

    pub fn device_poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.device_poll_ms.max(50))
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            auto_start: self.monitor.auto_start,
            session: SessionOptions {
                fft_size: self.monitor.fft_size,
                smoothing: self.monitor.smoothing,
                refresh_rate_hz: self.monitor.refresh_rate_hz,
                renderer: FrameRenderer::default(),
            },
        }
    }
}

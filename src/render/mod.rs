//! Per-tick drawing of the waveform, spectrum bars and loudness meter

mod surface;

pub use surface::{PixmapSurface, Rgba, Surface};

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::Serialize;

use crate::analysis::AnalysisFrame;

/// Loudness readout: percentage text plus a proportional bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelMeter {
    percent: u8,
}

impl LevelMeter {
    pub fn set(&mut self, percent: u8) {
        self.percent = percent.min(100);
    }

    pub fn reset(&mut self) {
        self.percent = 0;
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn text(&self) -> String {
        format!("{}%", self.percent)
    }

    /// Filled width of a bar track `track_width` pixels wide
    pub fn fill_width(&self, track_width: u32) -> u32 {
        (track_width as u64 * self.percent as u64 / 100) as u32
    }
}

/// Colours and proportions used by `FrameRenderer`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub background: Rgba,
    pub waveform: Rgba,
    pub bars: Rgba,
    pub line_width: f32,
    /// Bar width as a multiple of the per-bin spacing; >1 makes bars overlap
    pub bar_overlap: f32,
    /// Pixels left empty at the right of each bar
    pub bar_gap: f32,
    /// Fraction of the surface height a full-scale bar reaches
    pub bar_height_ratio: f32,
    /// Only the lowest `1 / visible_bin_divisor` of bins are drawn
    pub visible_bin_divisor: usize,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background: Rgba::new(0, 0, 0, 255),
            waveform: Rgba::new(0x00, 0xe5, 0xff, 255),
            bars: Rgba::new(0x00, 0xe5, 0xff, 128),
            line_width: 2.0,
            bar_overlap: 2.5,
            bar_gap: 1.0,
            bar_height_ratio: 0.8,
            visible_bin_divisor: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FrameRenderer {
    style: RenderStyle,
}

impl FrameRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Draw one analysis frame and update the meter
    pub fn render(&self, frame: &AnalysisFrame, surface: &mut dyn Surface, meter: &mut LevelMeter) {
        meter.set(frame.loudness_percent);

        let width = surface.width() as f32;
        let height = surface.height() as f32;

        surface.fill(self.style.background);

        let points = self.waveform_points(&frame.time_domain, width, height);
        surface.stroke_polyline(&points, self.style.waveform, self.style.line_width);

        for bar in self.spectrum_bars(&frame.frequency_domain, width, height) {
            if bar.height > 0.0 && bar.width > 0.0 {
                surface.fill_rect(bar.x, bar.y, bar.width, bar.height, self.style.bars);
            }
        }
    }

    /// Polyline through the time-domain samples
    ///
    /// Byte 128 lands on the vertical centre and 0..=255 spans the height.
    /// The line is closed off at the right edge on the centre line.
    pub fn waveform_points(&self, time_domain: &[u8], width: f32, height: f32) -> Vec<(f32, f32)> {
        if time_domain.is_empty() {
            return Vec::new();
        }

        let slice = width / time_domain.len() as f32;
        let mut points: Vec<(f32, f32)> = time_domain
            .iter()
            .enumerate()
            .map(|(i, &sample)| {
                let v = sample as f32 / 128.0;
                (i as f32 * slice, v * height / 2.0)
            })
            .collect();
        points.push((width, height / 2.0));
        points
    }

    /// Bars for the lowest quarter of frequency bins, left to right
    pub fn spectrum_bars(&self, frequency_domain: &[u8], width: f32, height: f32) -> Vec<Bar> {
        if frequency_domain.is_empty() {
            return Vec::new();
        }

        let bar_width = (width / frequency_domain.len() as f32) * self.style.bar_overlap;
        let visible = frequency_domain.len() / self.style.visible_bin_divisor.max(1);

        frequency_domain
            .iter()
            .take(visible)
            .enumerate()
            .map(|(i, &magnitude)| {
                let bar_height = (magnitude as f32 / 255.0) * height * self.style.bar_height_ratio;
                Bar {
                    x: i as f32 * bar_width,
                    y: height - bar_height,
                    width: (bar_width - self.style.bar_gap).max(0.0),
                    height: bar_height,
                }
            })
            .collect()
    }
}

/// Everything the monitor draws into: canvas plus loudness meter
pub struct Display {
    surface: Box<dyn Surface>,
    meter: LevelMeter,
}

impl Display {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            meter: LevelMeter::default(),
        }
    }

    /// Display backed by a tiny-skia raster of the given size
    pub fn raster(width: u32, height: u32) -> Result<Self> {
        Ok(Self::new(Box::new(PixmapSurface::new(width, height)?)))
    }

    pub fn draw(&mut self, renderer: &FrameRenderer, frame: &AnalysisFrame) {
        renderer.render(frame, self.surface.as_mut(), &mut self.meter);
    }

    /// Meter to 0% and canvas blanked
    pub fn clear(&mut self) {
        self.meter.reset();
        self.surface.blank();
    }

    pub fn meter(&self) -> &LevelMeter {
        &self.meter
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }
}

/// Display shared between the controller and the render loop
pub type SharedDisplay = Arc<Mutex<Display>>;

pub fn shared(display: Display) -> SharedDisplay {
    Arc::new(Mutex::new(display))
}

/// Lock a shared display, recovering from a poisoned lock
pub fn lock(display: &SharedDisplay) -> MutexGuard<'_, Display> {
    display.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_text_and_width() {
        let mut meter = LevelMeter::default();
        assert_eq!(meter.text(), "0%");

        meter.set(42);
        assert_eq!(meter.text(), "42%");
        assert_eq!(meter.fill_width(200), 84);

        meter.set(250);
        assert_eq!(meter.percent(), 100);

        meter.reset();
        assert_eq!(meter.fill_width(200), 0);
    }

    #[test]
    fn test_waveform_geometry() {
        let renderer = FrameRenderer::default();
        let points = renderer.waveform_points(&[128, 0, 255, 128], 400.0, 200.0);

        assert_eq!(points.len(), 5);
        assert_eq!(points[0], (0.0, 100.0));
        assert_eq!(points[1], (100.0, 0.0));
        assert!((points[2].1 - 199.21875).abs() < 1e-3);
        assert_eq!(points[2].0, 200.0);
        // closed on the centre line at the right edge
        assert_eq!(points[4], (400.0, 100.0));
    }

    #[test]
    fn test_only_lowest_quarter_of_bins_drawn() {
        let renderer = FrameRenderer::default();
        let bars = renderer.spectrum_bars(&[255; 1024], 640.0, 200.0);

        assert_eq!(bars.len(), 256);
        // spacing 0.625 px, times 2.5 overlap
        assert!((bars[1].x - 1.5625).abs() < 1e-4);
        assert!((bars[0].width - 0.5625).abs() < 1e-4);
        assert!((bars[0].height - 160.0).abs() < 1e-4);
        assert!((bars[0].y - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_bar_height_proportional_to_magnitude() {
        let renderer = FrameRenderer::default();
        let mut bins = vec![0u8; 8];
        bins[0] = 51;
        bins[1] = 0;
        let bars = renderer.spectrum_bars(&bins, 80.0, 100.0);

        assert_eq!(bars.len(), 2);
        assert!((bars[0].height - 16.0).abs() < 1e-4);
        assert_eq!(bars[1].height, 0.0);
    }

    #[test]
    fn test_render_updates_meter_and_pixels() {
        let mut display = Display::raster(64, 32).unwrap();
        let frame = AnalysisFrame {
            time_domain: vec![128; 64],
            frequency_domain: vec![0; 32],
            loudness_percent: 37,
        };

        display.draw(&FrameRenderer::default(), &frame);
        assert_eq!(display.meter().percent(), 37);

        display.clear();
        assert_eq!(display.meter().text(), "0%");
    }
}

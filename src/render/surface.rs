use anyhow::{anyhow, Context, Result};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Straight (non-premultiplied) RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
}

/// 2D drawing target of fixed pixel dimensions
pub trait Surface: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Paint every pixel with `color`
    fn fill(&mut self, color: Rgba);

    /// Reset every pixel to transparent
    fn blank(&mut self) {
        self.fill(Rgba::TRANSPARENT);
    }

    /// One connected line through `points`, in order
    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba, line_width: f32);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba);

    /// PNG encoding of the current contents
    fn encode_png(&self) -> Result<Vec<u8>> {
        Err(anyhow!("surface does not support PNG export"))
    }
}

/// Raster surface backed by a tiny-skia pixmap
pub struct PixmapSurface {
    pixmap: Pixmap,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .with_context(|| format!("Invalid surface size {}x{}", width, height))?;
        Ok(Self { pixmap })
    }

    /// Colour at a pixel, un-premultiplied
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Rgba::new(c.red(), c.green(), c.blue(), c.alpha())
        })
    }

    fn paint(color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        paint
    }
}

impl Surface for PixmapSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn fill(&mut self, color: Rgba) {
        self.pixmap
            .fill(Color::from_rgba8(color.r, color.g, color.b, color.a));
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba, line_width: f32) {
        let Some((&(x0, y0), rest)) = points.split_first() else {
            return;
        };
        if rest.is_empty() {
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(x0, y0);
        for &(x, y) in rest {
            pb.line_to(x, y);
        }

        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: line_width,
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &path,
                &Self::paint(color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        // Degenerate rects draw nothing
        if let Some(rect) = Rect::from_xywh(x, y, width, height) {
            self.pixmap
                .fill_rect(rect, &Self::paint(color), Transform::identity(), None);
        }
    }

    fn encode_png(&self) -> Result<Vec<u8>> {
        self.pixmap.encode_png().context("Failed to encode snapshot")
    }
}

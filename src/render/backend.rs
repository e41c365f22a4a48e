//! Drawing surfaces behind the render pipeline.
//!
//! A backend owns a persistent trail layer that particles are drawn onto and
//! a visible layer that [`RenderBackend::compose`] rebuilds from it each
//! frame. [`CpuBackend`] rasterises into float framebuffers for export and
//! tests; the browser build draws through a 2-D canvas context instead.

use crate::schema::Rgb;

use super::Canvas;

/// Glow pass parameters: a blurred, brightened copy of the trail added back
/// with a "lighter" composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    /// Blur radius in logical pixels.
    pub blur: f32,
    pub brightness: f32,
    pub alpha: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Rendering context lost: {0}")]
    ContextLost(String),
}

/// Raster operations used by [`RenderPipeline`](super::RenderPipeline).
///
/// Coordinates are logical pixels; backends apply the device pixel ratio.
pub trait RenderBackend {
    /// Reallocate every layer for a new viewport.
    fn resize(
        &mut self,
        logical_width: u32,
        logical_height: u32,
        scale: f32,
    ) -> Result<(), RenderError>;

    /// Fill every layer with `color`.
    fn clear(&mut self, color: Rgb);

    /// Fill the trail layer with `color` at `alpha`.
    fn fade(&mut self, color: Rgb, alpha: f32);

    fn stroke_segment(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        line_width: f32,
        color: Rgb,
        alpha: f32,
    );

    fn fill_square(&mut self, x: f32, y: f32, size: f32, color: Rgb, alpha: f32);

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32);

    /// Rebuild the visible layer: trail, then the optional glow, then the
    /// additive present at `present_alpha` (0 skips it).
    fn compose(&mut self, glow: Option<Glow>, present_alpha: f32) -> Result<(), RenderError>;

    /// Mean luma of the visible layer, when it can be read back cheaply.
    fn mean_brightness(&self) -> Option<f32> {
        None
    }
}

/// CPU rasteriser with trail, composite and visible layers.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    trail: Canvas,
    composite: Canvas,
    visible: Canvas,
}

impl CpuBackend {
    /// Empty layers; sized by the first [`resize`](RenderBackend::resize).
    pub fn new() -> Self {
        Self {
            trail: Canvas::new(0, 0, 1.0),
            composite: Canvas::new(0, 0, 1.0),
            visible: Canvas::new(0, 0, 1.0),
        }
    }

    /// The presented frame.
    pub fn frame(&self) -> &Canvas {
        &self.visible
    }

    /// The persistent trail layer.
    pub fn trail(&self) -> &Canvas {
        &self.trail
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for CpuBackend {
    fn resize(
        &mut self,
        logical_width: u32,
        logical_height: u32,
        scale: f32,
    ) -> Result<(), RenderError> {
        self.trail = Canvas::new(logical_width, logical_height, scale);
        self.composite = Canvas::new(logical_width, logical_height, scale);
        self.visible = Canvas::new(logical_width, logical_height, scale);
        Ok(())
    }

    fn clear(&mut self, color: Rgb) {
        self.trail.clear(color);
        self.composite.clear(color);
        self.visible.clear(color);
    }

    fn fade(&mut self, color: Rgb, alpha: f32) {
        self.trail.fade(color, alpha);
    }

    fn stroke_segment(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        line_width: f32,
        color: Rgb,
        alpha: f32,
    ) {
        self.trail.stroke_segment(from, to, line_width, color, alpha);
    }

    fn fill_square(&mut self, x: f32, y: f32, size: f32, color: Rgb, alpha: f32) {
        self.trail.fill_square(x, y, size, color, alpha);
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32) {
        self.trail.fill_circle(x, y, radius, color, alpha);
    }

    fn compose(&mut self, glow: Option<Glow>, present_alpha: f32) -> Result<(), RenderError> {
        self.composite.copy_from(&self.trail);
        if let Some(glow) = glow {
            // The visible layer doubles as the blur scratch; present overwrites it.
            self.visible.copy_from(&self.trail);
            self.visible.gaussian_blur(glow.blur);
            self.visible.scale_brightness(glow.brightness);
            self.composite.composite_lighter(&self.visible, glow.alpha);
        }
        self.visible.copy_from(&self.composite);
        self.visible.composite_self_lighter(present_alpha);
        Ok(())
    }

    fn mean_brightness(&self) -> Option<f32> {
        Some(self.visible.mean_brightness())
    }
}

//! Layered render pipeline.
//!
//! Per frame, in order:
//! 1. trail fade (background at low alpha, or a hard clear when disabled)
//! 2. particle draw onto the trail layer
//! 3. glow: blurred, brightened copy of the trail added back ("lighter")
//! 4. present: additive composite onto the visible surface
//!
//! Which of these run is fixed by the force mode. Formation fades with its
//! own `trail_alpha` and skips glow and present; drift hard-clears and draws
//! plain dots.

use crate::compute::{ParticleStore, field};
use crate::schema::{ConfigError, EngineConfig, ForceMode, Rgb};

use super::{Canvas, CpuBackend, Glow, RenderBackend, RenderError};

/// How particles are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawStyle {
    /// Line segment from the previous to the current position, alpha from a
    /// fade-in/fade-out life envelope.
    Strokes {
        saturation: f32,
        lightness: f32,
        max_alpha: f32,
    },
    /// Filled square at the current position, alpha from target proximity.
    Squares { fade_distance: f32, min_alpha: f32 },
    /// Filled disc in the particle's own colour and opacity.
    Dots,
}

impl DrawStyle {
    pub fn from_config(config: &EngineConfig) -> Self {
        match &config.mode {
            ForceMode::Ambient => DrawStyle::Strokes {
                saturation: config.render.saturation,
                lightness: config.render.lightness,
                max_alpha: config.render.max_alpha,
            },
            ForceMode::Formation(formation) => DrawStyle::Squares {
                fade_distance: formation.fade_distance,
                min_alpha: formation.min_alpha,
            },
            ForceMode::Drift(_) => DrawStyle::Dots,
        }
    }
}

/// Symmetric life envelope: 0 at birth and death, 1 at mid-life.
#[inline]
pub fn fade_in_out(age: f32, ttl: f32) -> f32 {
    if !(ttl > 0.0) {
        return 0.0;
    }
    let half = 0.5 * ttl;
    (((age + half) % ttl) - half).abs() / half
}

/// Alpha of a settling particle at `distance` from its target.
#[inline]
pub fn proximity_alpha(distance: f32, fade_distance: f32, min_alpha: f32) -> f32 {
    let closeness = 1.0 - (distance / fade_distance).min(1.0);
    min_alpha + (1.0 - min_alpha) * closeness
}

/// Drives a [`RenderBackend`] through the per-frame passes.
#[derive(Debug, Clone)]
pub struct RenderPipeline<B: RenderBackend = CpuBackend> {
    backend: B,
    background: Rgb,
    fade_alpha: f32,
    glow: Option<Glow>,
    present_alpha: f32,
    style: DrawStyle,
}

impl<B: RenderBackend> RenderPipeline<B> {
    /// Build the pass settings for `config`'s mode. The backend stays
    /// unsized until [`resize`](Self::resize).
    pub fn new(config: &EngineConfig, backend: B) -> Result<Self, ConfigError> {
        let background = config.background()?;
        let render = &config.render;
        let (fade_alpha, glow, present_alpha) = match &config.mode {
            ForceMode::Ambient => (
                config.background_opacity,
                (render.glow_alpha > 0.0).then_some(Glow {
                    blur: render.glow_blur,
                    brightness: render.glow_brightness,
                    alpha: render.glow_alpha,
                }),
                render.present_alpha,
            ),
            ForceMode::Formation(formation) => (formation.trail_alpha, None, 0.0),
            ForceMode::Drift(_) => (0.0, None, 0.0),
        };

        Ok(Self {
            backend,
            background,
            fade_alpha: fade_alpha.clamp(0.0, 1.0),
            glow,
            present_alpha,
            style: DrawStyle::from_config(config),
        })
    }

    /// Reallocate every layer for a new viewport and clear to the background.
    pub fn resize(
        &mut self,
        logical_width: u32,
        logical_height: u32,
        scale: f32,
    ) -> Result<(), RenderError> {
        self.backend.resize(logical_width, logical_height, scale)?;
        self.clear();
        Ok(())
    }

    /// Clear every layer to the background colour.
    pub fn clear(&mut self) {
        self.backend.clear(self.background);
    }

    /// Change the trail fade alpha for subsequent frames.
    pub fn set_fade_alpha(&mut self, alpha: f32) {
        self.fade_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn fade_alpha(&self) -> f32 {
        self.fade_alpha
    }

    pub fn glow(&self) -> Option<Glow> {
        self.glow
    }

    pub fn present_alpha(&self) -> f32 {
        self.present_alpha
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    /// Run all passes for one frame.
    pub fn render(&mut self, store: &ParticleStore) -> Result<(), RenderError> {
        // A full-alpha fade is a hard clear of the trail.
        let fade = if self.fade_alpha > 0.0 { self.fade_alpha } else { 1.0 };
        self.backend.fade(self.background, fade);
        self.draw_pass(store);
        self.backend.compose(self.glow, self.present_alpha)
    }

    fn draw_pass(&mut self, store: &ParticleStore) {
        let backend = &mut self.backend;
        match self.style {
            DrawStyle::Strokes {
                saturation,
                lightness,
                max_alpha,
            } => {
                for slot in store.slots() {
                    let (x, y) = (slot[field::X], slot[field::Y]);
                    let speed = slot[field::SPEED];
                    let prev = (x - slot[field::VX] * speed, y - slot[field::VY] * speed);
                    let alpha = fade_in_out(slot[field::AGE], slot[field::TTL]) * max_alpha;
                    let color = Rgb::from_hsl(slot[field::HUE], saturation, lightness);
                    backend.stroke_segment(prev, (x, y), slot[field::RADIUS], color, alpha);
                }
            }
            DrawStyle::Squares {
                fade_distance,
                min_alpha,
            } => {
                for slot in store.slots() {
                    let (x, y) = (slot[field::X], slot[field::Y]);
                    let dx = slot[field::TARGET_X] - x;
                    let dy = slot[field::TARGET_Y] - y;
                    let alpha =
                        proximity_alpha((dx * dx + dy * dy).sqrt(), fade_distance, min_alpha);
                    let color = Rgb::new(
                        slot[field::COLOR_R],
                        slot[field::COLOR_G],
                        slot[field::COLOR_B],
                    );
                    backend.fill_square(x, y, slot[field::RADIUS], color, alpha);
                }
            }
            DrawStyle::Dots => {
                for slot in store.slots() {
                    let color = Rgb::new(
                        slot[field::FILL_R],
                        slot[field::FILL_G],
                        slot[field::FILL_B],
                    );
                    backend.fill_circle(
                        slot[field::X],
                        slot[field::Y],
                        slot[field::RADIUS],
                        color,
                        slot[field::OPACITY],
                    );
                }
            }
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn style(&self) -> DrawStyle {
        self.style
    }
}

impl RenderPipeline<CpuBackend> {
    /// The presented frame.
    pub fn frame(&self) -> &Canvas {
        self.backend.frame()
    }

    /// The persistent trail layer.
    pub fn trail(&self) -> &Canvas {
        self.backend.trail()
    }
}

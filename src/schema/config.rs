//! Configuration types for particle engine instances.

use serde::{Deserialize, Serialize};

use super::{Palette, Rgb};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of particles (ambient mode). Formation mode derives its count
    /// from the sampled text.
    pub particle_count: usize,
    /// Spawn palette as hex strings.
    pub palette: Vec<String>,
    /// Stroke width range `[min, max]` in logical pixels.
    pub size_range: (f32, f32),
    /// Minimum per-particle speed multiplier.
    pub base_speed: f32,
    /// Random extra speed added on spawn, `U(0, speed_range)`.
    pub speed_range: f32,
    /// Minimum time-to-live in frames.
    pub base_ttl: f32,
    /// Random extra time-to-live, `U(0, ttl_range)`.
    pub ttl_range: f32,
    /// Background colour used for the trail fade.
    pub background: String,
    /// Alpha of the per-frame trail fade. 0 disables the fade (hard clear).
    pub background_opacity: f32,
    /// Pointer vortex strength. 0 disables pointer influence.
    pub mouse_influence: f32,
    /// Pointer influence radius in logical pixels.
    pub mouse_radius: f32,
    /// Render a single static frame and never animate.
    pub reduced_motion: bool,
    /// Low-power profile: fewer particles, shorter lives, capped DPR.
    pub mobile: bool,
    /// Upper bound on the device pixel ratio used for the backing store.
    pub max_device_pixel_ratio: f32,
    /// Seed for the noise permutation table and spawn RNG. `None` = random.
    pub seed: Option<u64>,
    /// Flow field sampling parameters.
    pub noise: NoiseConfig,
    /// Raster pipeline parameters.
    pub render: RenderConfig,
    /// Force model variant.
    pub mode: ForceMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            particle_count: 500,
            palette: vec!["#D4AF37".to_string(), "#06B6D4".to_string()],
            size_range: (1.0, 3.5),
            base_speed: 0.1,
            speed_range: 1.2,
            base_ttl: 80.0,
            ttl_range: 200.0,
            background: "#0B0B0C".to_string(),
            background_opacity: 0.3,
            mouse_influence: 0.15,
            mouse_radius: 250.0,
            reduced_motion: false,
            mobile: false,
            max_device_pixel_ratio: 3.0,
            seed: None,
            noise: NoiseConfig::default(),
            render: RenderConfig::default(),
            mode: ForceMode::Ambient,
        }
    }
}

/// Flow field sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Spatial frequency along X.
    pub x_scale: f32,
    /// Spatial frequency along Y.
    pub y_scale: f32,
    /// Temporal frequency (per frame).
    pub t_scale: f32,
    /// Number of full turns the raw noise range maps onto.
    pub steps: f32,
    /// Per-frame interpolation of velocity towards the field direction.
    pub velocity_blend: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            x_scale: 0.00125,
            y_scale: 0.00125,
            t_scale: 0.0003,
            steps: 3.0,
            velocity_blend: 0.5,
        }
    }
}

/// Raster pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Glow blur radius in logical pixels (CSS `blur()` semantics).
    pub glow_blur: f32,
    /// Brightness multiplier applied to the blurred layer.
    pub glow_brightness: f32,
    /// Alpha of the additive glow composite. 0 skips the pass.
    pub glow_alpha: f32,
    /// Alpha of the additive present composite. 0 presents the frame as-is.
    pub present_alpha: f32,
    /// Stroke saturation for hue-coloured particles.
    pub saturation: f32,
    /// Stroke lightness for hue-coloured particles.
    pub lightness: f32,
    /// Peak stroke alpha at mid-life.
    pub max_alpha: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            glow_blur: 6.0,
            glow_brightness: 1.3,
            glow_alpha: 0.5,
            present_alpha: 0.6,
            saturation: 0.75,
            lightness: 0.5,
            max_alpha: 0.7,
        }
    }
}

/// Force model selection. Fixed for the lifetime of an engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum ForceMode {
    /// Noise flow field with optional pointer vortex.
    #[default]
    Ambient,
    /// Arrival steering towards glyph-sampled targets.
    Formation(FormationConfig),
    /// Straight-line drift with wrap-around edges, drawn as dots.
    Drift(DriftConfig),
}

impl ForceMode {
    pub fn name(&self) -> &'static str {
        match self {
            ForceMode::Ambient => "ambient",
            ForceMode::Formation(_) => "formation",
            ForceMode::Drift(_) => "drift",
        }
    }
}

/// Drifting-dot background parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Velocity multiplier; each axis spawns at `(U(0, 1) - 0.5) * speed * 0.5`.
    pub speed: f32,
    /// Per-particle fill opacity range.
    pub opacity_range: (f32, f32),
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            opacity_range: (0.3, 0.8),
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed >= 0.0) {
            return Err(ConfigError::Negative("drift.speed"));
        }
        check_range("drift.opacity_range", self.opacity_range)?;
        check_unit("drift.opacity_range", self.opacity_range.0)?;
        check_unit("drift.opacity_range", self.opacity_range.1)?;
        Ok(())
    }
}

/// Text-formation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Text rasterised into the target pool.
    pub text: String,
    /// Glyph cell height in logical pixels.
    pub font_size: f32,
    /// Sampling stride in pixels along both axes.
    pub pixel_step: usize,
    /// Shuffle the target pool so neighbouring slots fly from different places.
    pub shuffle: bool,
    /// Colour particles settle into.
    pub target_color: String,
    /// Inner radius of the spawn ring around the canvas centre.
    pub ring_min: f32,
    /// Random extra ring radius, `U(0, ring_range)`.
    pub ring_range: f32,
    /// Per-particle maximum speed range.
    pub max_speed_range: (f32, f32),
    /// Per-particle maximum steering force range.
    pub max_force_range: (f32, f32),
    /// Upper bound of the slow-down zone around a target.
    pub arrival_radius: f32,
    /// Square size range in logical pixels.
    pub size_range: (f32, f32),
    /// Per-particle colour blend rate range.
    pub color_speed_range: (f32, f32),
    /// Fraction of the remaining colour distance covered per frame at full blend.
    pub color_damping: f32,
    /// Time-to-live in frames. Long enough to persist for a whole animation.
    pub ttl: f32,
    /// Distance at which the proximity alpha bottoms out.
    pub fade_distance: f32,
    /// Alpha of a particle at or beyond `fade_distance`.
    pub min_alpha: f32,
    /// Trail fade alpha while particles are in flight.
    pub trail_alpha: f32,
    /// Trail fade alpha for the closing frames of an export.
    pub settle_alpha: f32,
    /// Number of closing frames using `settle_alpha`.
    pub settle_frames: usize,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            text: "ЮРАЛЬЯНС".to_string(),
            font_size: 110.0,
            pixel_step: 4,
            shuffle: true,
            target_color: "#D4AF37".to_string(),
            ring_min: 200.0,
            ring_range: 200.0,
            max_speed_range: (18.0, 26.0),
            max_force_range: (1.0, 1.5),
            arrival_radius: 100.0,
            size_range: (2.0, 4.0),
            color_speed_range: (0.03, 0.07),
            color_damping: 0.1,
            ttl: 100_000.0,
            fade_distance: 200.0,
            min_alpha: 0.55,
            trail_alpha: 0.12,
            settle_alpha: 0.3,
            settle_frames: 8,
        }
    }
}

/// Values derived from a config once the device profile is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub particle_count: usize,
    pub base_ttl: f32,
    pub ttl_range: f32,
    pub speed_range: f32,
    pub size_range: (f32, f32),
    pub max_device_pixel_ratio: f32,
}

impl EngineConfig {
    /// Configuration for the text-formation animation with default parameters.
    ///
    /// The trail fade comes from `trail_alpha` and the glow and present
    /// passes are off in this mode, whatever `background_opacity` and
    /// `render` say.
    pub fn formation(text: &str, font_size: f32) -> Self {
        Self {
            mouse_influence: 0.0,
            mode: ForceMode::Formation(FormationConfig {
                text: text.to_string(),
                font_size,
                ..FormationConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Configuration for the drifting-dot background.
    pub fn drift() -> Self {
        Self {
            particle_count: 50,
            size_range: (1.0, 3.0),
            mouse_influence: 0.0,
            mode: ForceMode::Drift(DriftConfig::default()),
            ..Self::default()
        }
    }

    /// Check if this engine runs the formation variant.
    #[inline]
    pub fn is_formation(&self) -> bool {
        matches!(self.mode, ForceMode::Formation(_))
    }

    /// Apply the mobile/low-power adjustments.
    pub fn profile(&self) -> Profile {
        if self.mobile {
            let (min, max) = self.size_range;
            Profile {
                particle_count: (self.particle_count / 2).max(1),
                base_ttl: self.base_ttl * 0.75,
                ttl_range: self.ttl_range * 0.75,
                speed_range: self.speed_range * (1.0 / 1.2),
                size_range: (min * 0.8, max * 0.8),
                max_device_pixel_ratio: self.max_device_pixel_ratio.min(2.0),
            }
        } else {
            Profile {
                particle_count: self.particle_count,
                base_ttl: self.base_ttl,
                ttl_range: self.ttl_range,
                speed_range: self.speed_range,
                size_range: self.size_range,
                max_device_pixel_ratio: self.max_device_pixel_ratio,
            }
        }
    }

    /// Parse the palette.
    pub fn palette(&self) -> Result<Palette, ConfigError> {
        Palette::parse(&self.palette)
    }

    /// Parse the background colour.
    pub fn background(&self) -> Result<Rgb, ConfigError> {
        Rgb::from_hex(&self.background)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count == 0 {
            return Err(ConfigError::InvalidParticleCount);
        }
        self.palette()?;
        self.background()?;
        check_range("size_range", self.size_range)?;
        if self.size_range.0 <= 0.0 {
            return Err(ConfigError::NonPositive("size_range"));
        }
        if !(self.base_speed > 0.0) {
            return Err(ConfigError::NonPositive("base_speed"));
        }
        if !(self.speed_range >= 0.0) {
            return Err(ConfigError::Negative("speed_range"));
        }
        if !(self.base_ttl > 0.0) {
            return Err(ConfigError::NonPositive("base_ttl"));
        }
        if !(self.ttl_range >= 0.0) {
            return Err(ConfigError::Negative("ttl_range"));
        }
        check_unit("background_opacity", self.background_opacity)?;
        if !(self.mouse_influence >= 0.0) {
            return Err(ConfigError::Negative("mouse_influence"));
        }
        if !(self.mouse_radius >= 0.0) {
            return Err(ConfigError::Negative("mouse_radius"));
        }
        if !(self.max_device_pixel_ratio > 0.0) {
            return Err(ConfigError::NonPositive("max_device_pixel_ratio"));
        }
        check_unit("noise.velocity_blend", self.noise.velocity_blend)?;
        check_unit("render.glow_alpha", self.render.glow_alpha)?;
        check_unit("render.present_alpha", self.render.present_alpha)?;
        check_unit("render.max_alpha", self.render.max_alpha)?;
        if !(self.render.glow_blur >= 0.0) {
            return Err(ConfigError::Negative("render.glow_blur"));
        }

        match &self.mode {
            ForceMode::Ambient => Ok(()),
            ForceMode::Formation(formation) => formation.validate(),
            ForceMode::Drift(drift) => drift.validate(),
        }
    }
}

impl FormationConfig {
    /// Parse the settle colour.
    pub fn target_color(&self) -> Result<Rgb, ConfigError> {
        Rgb::from_hex(&self.target_color)
    }

    /// Validate formation parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text.trim().is_empty() {
            return Err(ConfigError::EmptyText);
        }
        if !(self.font_size > 0.0) {
            return Err(ConfigError::NonPositive("formation.font_size"));
        }
        if self.pixel_step == 0 {
            return Err(ConfigError::InvalidPixelStep);
        }
        self.target_color()?;
        check_range("formation.max_speed_range", self.max_speed_range)?;
        check_range("formation.max_force_range", self.max_force_range)?;
        check_range("formation.size_range", self.size_range)?;
        check_range("formation.color_speed_range", self.color_speed_range)?;
        if !(self.max_speed_range.0 > 0.0) {
            return Err(ConfigError::NonPositive("formation.max_speed_range"));
        }
        if !(self.max_force_range.0 > 0.0) {
            return Err(ConfigError::NonPositive("formation.max_force_range"));
        }
        if !(self.arrival_radius > 0.0) {
            return Err(ConfigError::NonPositive("formation.arrival_radius"));
        }
        if !(self.ttl > 0.0) {
            return Err(ConfigError::NonPositive("formation.ttl"));
        }
        if !(self.fade_distance > 0.0) {
            return Err(ConfigError::NonPositive("formation.fade_distance"));
        }
        if !(self.ring_min >= 0.0 && self.ring_range >= 0.0) {
            return Err(ConfigError::Negative("formation.ring"));
        }
        check_unit("formation.color_damping", self.color_damping)?;
        check_unit("formation.min_alpha", self.min_alpha)?;
        check_unit("formation.trail_alpha", self.trail_alpha)?;
        check_unit("formation.settle_alpha", self.settle_alpha)?;
        Ok(())
    }
}

fn check_range(name: &'static str, (min, max): (f32, f32)) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange { name, min, max })
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Particle count must be non-zero")]
    InvalidParticleCount,
    #[error("Palette must contain at least one colour")]
    EmptyPalette,
    #[error("Invalid colour {0:?} (expected #RRGGBB or #RGB)")]
    InvalidColor(String),
    #[error("{name} must satisfy min <= max (got {min}..{max})")]
    InvalidRange { name: &'static str, min: f32, max: f32 },
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{name} must lie in [0, 1] (got {value})")]
    OutOfUnitRange { name: &'static str, value: f32 },
    #[error("Formation text must not be empty")]
    EmptyText,
    #[error("Sampling stride must be non-zero")]
    InvalidPixelStep,
    #[error("Frame count must be non-zero")]
    ZeroFrames,
    #[error("Text targets need an engine in formation mode")]
    NotFormation,
    #[error("Text {text:?} produced no lit pixels at {width}x{height}")]
    NoTargets { text: String, width: u32, height: u32 },
}

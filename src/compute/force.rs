//! Force models driving particle motion.
//!
//! One variant per engine instance:
//!
//! - [`FlowFieldForce`]: velocity eases towards a noise-field direction, with an
//!   optional pointer vortex (tangential swirl plus radial attraction).
//! - [`SeekForce`]: arrival steering towards a fixed target with a clamped
//!   steering force, plus a damped colour blend.
//! - [`DriftForce`]: constant velocity, wrapping at the viewport edges.

use crate::schema::{EngineConfig, ForceMode, FormationConfig, Rgb};

use super::{Layout, NoiseField, ParticleStore, field};

/// Pointer distance below which the vortex term is skipped.
const POINTER_DEAD_ZONE: f32 = 1.0;
/// Target distance below which no steering is applied.
const ARRIVAL_EPSILON: f32 = 1e-3;

const SWIRL_FACTOR: f32 = 1.2;
const ATTRACT_FACTOR: f32 = 0.5;
const VORTEX_GAIN: f32 = 4.0;

/// Latest pointer position, overwritten by input handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub active: bool,
}

impl PointerState {
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, active: true }
    }

    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Noise-driven flow field with pointer vortex.
#[derive(Debug, Clone)]
pub struct FlowFieldForce {
    noise: NoiseField,
    x_scale: f32,
    y_scale: f32,
    t_scale: f32,
    blend: f32,
    mouse_influence: f32,
    mouse_radius: f32,
}

impl FlowFieldForce {
    pub fn new(config: &EngineConfig, seed: u64) -> Self {
        Self {
            noise: NoiseField::new(seed, config.noise.steps),
            x_scale: config.noise.x_scale,
            y_scale: config.noise.y_scale,
            t_scale: config.noise.t_scale,
            blend: config.noise.velocity_blend,
            mouse_influence: config.mouse_influence,
            mouse_radius: config.mouse_radius,
        }
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    /// New velocity for a particle at `(x, y)` moving at `(vx, vy)`.
    pub fn velocity(
        &self,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        tick: f32,
        pointer: &PointerState,
    ) -> (f32, f32) {
        let (mut vx, mut vy) = (vx, vy);
        if let Some((dx, dy)) =
            self.noise
                .direction(x * self.x_scale, y * self.y_scale, tick * self.t_scale)
        {
            vx = lerp(vx, dx, self.blend);
            vy = lerp(vy, dy, self.blend);
        }

        let (px, py) = self.vortex(x, y, pointer);
        (vx + px, vy + py)
    }

    /// Pointer swirl + attraction, falling off linearly to zero at the radius.
    pub fn vortex(&self, x: f32, y: f32, pointer: &PointerState) -> (f32, f32) {
        if !pointer.active || self.mouse_influence <= 0.0 {
            return (0.0, 0.0);
        }

        let dx = pointer.x - x;
        let dy = pointer.y - y;
        let dist = (dx * dx + dy * dy).sqrt();
        if !(dist > POINTER_DEAD_ZONE && dist < self.mouse_radius) {
            return (0.0, 0.0);
        }

        let influence = (1.0 - dist / self.mouse_radius) * self.mouse_influence;
        let (nx, ny) = (dx / dist, dy / dist);
        // Tangent is the attraction vector rotated by 90 degrees.
        let (tx, ty) = (-ny, nx);
        (
            (tx * SWIRL_FACTOR + nx * ATTRACT_FACTOR) * influence * VORTEX_GAIN,
            (ty * SWIRL_FACTOR + ny * ATTRACT_FACTOR) * influence * VORTEX_GAIN,
        )
    }

    /// Update velocity and integrate position by `velocity * speed`.
    #[inline]
    pub fn apply(&self, slot: &mut [f32], tick: f32, pointer: &PointerState) {
        let (x, y) = (slot[field::X], slot[field::Y]);
        let (vx, vy) = self.velocity(x, y, slot[field::VX], slot[field::VY], tick, pointer);
        let speed = slot[field::SPEED];
        slot[field::VX] = vx;
        slot[field::VY] = vy;
        slot[field::X] = x + vx * speed;
        slot[field::Y] = y + vy * speed;
    }
}

/// Arrival steering towards per-particle targets.
#[derive(Debug, Clone)]
pub struct SeekForce {
    arrival_radius: f32,
    color_damping: f32,
}

impl SeekForce {
    pub fn new(config: &FormationConfig) -> Self {
        Self {
            arrival_radius: config.arrival_radius,
            color_damping: config.color_damping,
        }
    }

    pub fn with_params(arrival_radius: f32, color_damping: f32) -> Self {
        Self {
            arrival_radius,
            color_damping,
        }
    }

    /// Slow-down radius for a mover.
    ///
    /// Capped at `max_speed² / max_force` so the linear deceleration profile
    /// never asks for more braking than the force clamp allows.
    #[inline]
    pub fn slowing_radius(&self, max_speed: f32, max_force: f32) -> f32 {
        self.arrival_radius.min(max_speed * max_speed / max_force)
    }

    /// Clamped steering delta for a mover.
    pub fn steering(
        &self,
        (x, y): (f32, f32),
        (vx, vy): (f32, f32),
        (tx, ty): (f32, f32),
        max_speed: f32,
        max_force: f32,
    ) -> (f32, f32) {
        let dx = tx - x;
        let dy = ty - y;
        let dist = (dx * dx + dy * dy).sqrt();
        if !(dist > ARRIVAL_EPSILON) {
            return (0.0, 0.0);
        }

        let radius = self.slowing_radius(max_speed, max_force);
        let scale = if dist < radius { dist / radius } else { 1.0 };
        let desired_x = dx / dist * max_speed * scale;
        let desired_y = dy / dist * max_speed * scale;

        let (steer_x, steer_y) = limit(desired_x - vx, desired_y - vy, max_force);
        if steer_x.is_finite() && steer_y.is_finite() {
            (steer_x, steer_y)
        } else {
            (0.0, 0.0)
        }
    }

    /// Steer, integrate, and advance the colour blend.
    #[inline]
    pub fn apply(&self, slot: &mut [f32]) {
        let (sx, sy) = self.steering(
            (slot[field::X], slot[field::Y]),
            (slot[field::VX], slot[field::VY]),
            (slot[field::TARGET_X], slot[field::TARGET_Y]),
            slot[field::SPEED],
            slot[field::MAX_FORCE],
        );
        slot[field::VX] += sx;
        slot[field::VY] += sy;
        slot[field::X] += slot[field::VX];
        slot[field::Y] += slot[field::VY];

        let blend = (slot[field::BLEND] + slot[field::BLEND_RATE]).min(1.0);
        slot[field::BLEND] = blend;
        let current = Rgb::new(slot[field::COLOR_R], slot[field::COLOR_G], slot[field::COLOR_B]);
        let target = Rgb::new(slot[field::TARGET_R], slot[field::TARGET_G], slot[field::TARGET_B]);
        let next = current.lerp(target, blend * self.color_damping);
        slot[field::COLOR_R] = next.r;
        slot[field::COLOR_G] = next.g;
        slot[field::COLOR_B] = next.b;
    }
}

/// Straight-line drift that wraps around the viewport.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftForce;

impl DriftForce {
    /// Integrate one frame. A particle leaving one edge re-enters at the
    /// opposite one.
    #[inline]
    pub fn apply(&self, slot: &mut [f32], (width, height): (f32, f32)) {
        slot[field::X] = wrap(slot[field::X] + slot[field::VX], width);
        slot[field::Y] = wrap(slot[field::Y] + slot[field::VY], height);
    }
}

#[inline]
fn wrap(v: f32, extent: f32) -> f32 {
    if v < 0.0 {
        extent
    } else if v > extent {
        0.0
    } else {
        v
    }
}

/// Force model of an engine instance.
#[derive(Debug, Clone)]
pub enum ForceModel {
    FlowField(FlowFieldForce),
    Seek(SeekForce),
    Drift(DriftForce),
}

impl ForceModel {
    /// Build the model selected by `config.mode`.
    pub fn from_config(config: &EngineConfig, seed: u64) -> Self {
        match &config.mode {
            ForceMode::Ambient => {
                ForceModel::FlowField(FlowFieldForce::new(config, seed))
            }
            ForceMode::Formation(formation) => {
                ForceModel::Seek(SeekForce::new(formation))
            }
            ForceMode::Drift(_) => ForceModel::Drift(DriftForce),
        }
    }

    /// Slot layout this model reads and writes.
    pub fn layout(&self) -> Layout {
        match self {
            ForceModel::FlowField(_) => Layout::Ambient,
            ForceModel::Seek(_) => Layout::Steering,
            ForceModel::Drift(_) => Layout::Drift,
        }
    }

    /// Advance every particle by one frame, in place.
    ///
    /// `bounds` is the logical viewport size.
    pub fn step(
        &self,
        store: &mut ParticleStore,
        tick: u64,
        pointer: PointerState,
        bounds: (f32, f32),
    ) {
        let tick = tick as f32;
        match self {
            ForceModel::FlowField(force) => {
                store.par_for_each_slot(|_, slot| force.apply(slot, tick, &pointer));
            }
            ForceModel::Seek(force) => {
                store.par_for_each_slot(|_, slot| force.apply(slot));
            }
            ForceModel::Drift(force) => {
                store.par_for_each_slot(|_, slot| force.apply(slot, bounds));
            }
        }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t) * a + t * b
}

#[inline]
fn limit(x: f32, y: f32, max: f32) -> (f32, f32) {
    let mag = (x * x + y * y).sqrt();
    if mag > max {
        (x / mag * max, y / mag * max)
    } else {
        (x, y)
    }
}

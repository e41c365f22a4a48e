//! Engine loop - drives one simulation + render step per host frame.
//!
//! ```text
//! Idle --mount--> Running <--set_visible--> Paused
//!   \                |                        |
//!    \---------------+------dispose-----------+--> Disposed
//! ```
//!
//! Reduced motion renders a single static frame on mount and stays paused.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, UnitCircle};

use crate::render::{Canvas, CpuBackend, RenderBackend, RenderPipeline};
use crate::schema::{
    ConfigError, EngineConfig, ForceMode, FormationConfig, Palette, Profile, Rgb,
};

use super::{
    AmbientSpawn, DriftSpawn, ForceModel, FormationSpawn, LifecycleManager, ParticleStore,
    PointerState, SpawnPolicy, SpawnSampler, SpawnTarget, field,
};

/// Host per-frame callback facility.
///
/// Requests are one-shot: the host calls [`Engine::on_frame`] once per
/// granted request. Pending requests must be cancelled explicitly.
pub trait FrameScheduler {
    type Handle: Copy + PartialEq + fmt::Debug;

    fn request_frame(&mut self) -> Self::Handle;
    fn cancel_frame(&mut self, handle: Self::Handle);
}

/// Scheduler that only records requests. Used by batch export and tests.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Vec<u64>,
    requested: usize,
    cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles requested and not yet fired or cancelled.
    pub fn pending(&self) -> &[u64] {
        &self.pending
    }

    /// Fire the oldest pending request, returning its handle.
    pub fn fire(&mut self) -> Option<u64> {
        (!self.pending.is_empty()).then(|| self.pending.remove(0))
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    type Handle = u64;

    fn request_frame(&mut self) -> u64 {
        self.next += 1;
        self.requested += 1;
        self.pending.push(self.next);
        self.next
    }

    fn cancel_frame(&mut self, handle: u64) {
        if let Some(pos) = self.pending.iter().position(|&h| h == handle) {
            self.pending.remove(pos);
            self.cancelled += 1;
        }
    }
}

/// Lifecycle state of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Disposed,
}

/// Mounted surface: logical size plus the effective device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// Snapshot of engine statistics.
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub state: EngineState,
    pub tick: u64,
    pub renders: u64,
    pub particle_count: usize,
    pub mean_age_ratio: f32,
    pub mean_brightness: f32,
    pub recycled_total: u64,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} tick={} renders={} particles={} age={:.3} brightness={:.4} recycled={}",
            self.state,
            self.tick,
            self.renders,
            self.particle_count,
            self.mean_age_ratio,
            self.mean_brightness,
            self.recycled_total
        )
    }
}

/// A particle engine instance.
///
/// `B` is the drawing surface; the default CPU backend keeps every frame
/// readable for export and tests.
pub struct Engine<S: FrameScheduler, B: RenderBackend = CpuBackend> {
    config: EngineConfig,
    profile: Profile,
    palette: Palette,
    scheduler: S,
    state: EngineState,
    force: ForceModel,
    lifecycle: LifecycleManager,
    store: ParticleStore,
    policy: Option<SpawnPolicy>,
    pipeline: Option<RenderPipeline<B>>,
    sampler: Option<SpawnSampler>,
    rng: StdRng,
    pointer: PointerState,
    visible: bool,
    device_pixel_ratio: f32,
    viewport: Option<Viewport>,
    pending: Option<S::Handle>,
    tick: u64,
    renders: u64,
}

impl<S: FrameScheduler> Engine<S, CpuBackend> {
    /// Validate `config` and build an idle engine on the CPU rasteriser.
    pub fn new(config: EngineConfig, scheduler: S) -> Result<Self, ConfigError> {
        Self::with_backend(config, scheduler, CpuBackend::new())
    }

    /// Last presented frame.
    pub fn frame(&self) -> Option<&Canvas> {
        self.viewport?;
        self.pipeline.as_ref().map(RenderPipeline::frame)
    }

    /// Last presented frame as RGBA8 in device pixels.
    pub fn frame_rgba(&self) -> Option<Vec<u8>> {
        self.frame().map(Canvas::to_rgba8)
    }
}

impl<S: FrameScheduler, B: RenderBackend> Engine<S, B> {
    /// Validate `config` and build an idle engine drawing through `backend`.
    pub fn with_backend(
        config: EngineConfig,
        scheduler: S,
        backend: B,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random::<u64>);
        let force = ForceModel::from_config(&config, seed);
        let sampler = match &config.mode {
            ForceMode::Formation(formation) => Some(SpawnSampler::new(formation)?),
            ForceMode::Ambient | ForceMode::Drift(_) => None,
        };
        let pipeline = RenderPipeline::new(&config, backend)?;
        log::debug!("Engine created: {} mode, seed {}", config.mode.name(), seed);

        Ok(Self {
            profile: config.profile(),
            palette: config.palette()?,
            store: ParticleStore::new(force.layout()),
            config,
            scheduler,
            state: EngineState::Idle,
            force,
            lifecycle: LifecycleManager::new(),
            policy: None,
            pipeline: Some(pipeline),
            sampler,
            rng: StdRng::seed_from_u64(seed),
            pointer: PointerState::inactive(),
            visible: true,
            device_pixel_ratio: 1.0,
            viewport: None,
            pending: None,
            tick: 0,
            renders: 0,
        })
    }

    /// Attach to a surface of `width × height` logical pixels.
    ///
    /// Zero dimensions defer initialisation until a non-zero
    /// [`resize`](Self::resize) arrives.
    pub fn mount(
        &mut self,
        width: u32,
        height: u32,
        device_pixel_ratio: f32,
    ) -> Result<(), ConfigError> {
        if self.state != EngineState::Idle {
            return Ok(());
        }
        self.device_pixel_ratio = device_pixel_ratio;
        if width == 0 || height == 0 {
            log::warn!("Mount deferred: surface is {}x{}", width, height);
            return Ok(());
        }

        self.reseed(width, height)?;
        if self.state == EngineState::Disposed {
            return Ok(());
        }
        if self.config.reduced_motion {
            self.render_static();
            self.state = EngineState::Paused;
        } else if self.visible {
            self.state = EngineState::Running;
            self.schedule();
        } else {
            self.state = EngineState::Paused;
        }
        log::debug!(
            "Mounted {}x{} @{:.2} with {} particles ({:?})",
            width,
            height,
            self.scale(),
            self.store.len(),
            self.state
        );
        Ok(())
    }

    /// Host frame callback. Returns whether a frame was rendered.
    pub fn on_frame(&mut self) -> bool {
        self.pending = None;
        if self.state != EngineState::Running || !self.visible {
            return false;
        }
        let rendered = self.step();
        self.schedule();
        rendered
    }

    /// Advance one frame: forces, lifecycle, render.
    ///
    /// Also used directly by batch export. No-op before mount or after disposal.
    pub fn step(&mut self) -> bool {
        if matches!(self.state, EngineState::Idle | EngineState::Disposed) {
            return false;
        }
        let (Some(viewport), Some(policy), Some(pipeline)) =
            (self.viewport, &self.policy, &mut self.pipeline)
        else {
            return false;
        };

        self.tick += 1;
        let bounds = (viewport.width as f32, viewport.height as f32);
        self.force.step(&mut self.store, self.tick, self.pointer, bounds);
        self.lifecycle.advance(&mut self.store, policy, &mut self.rng);
        if let Err(e) = pipeline.render(&self.store) {
            log::warn!("Render failed: {}", e);
            self.context_lost();
            return false;
        }
        self.renders += 1;
        true
    }

    /// Viewport or device pixel ratio change: full re-seed of every slot.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        device_pixel_ratio: f32,
    ) -> Result<(), ConfigError> {
        match self.state {
            EngineState::Disposed => return Ok(()),
            EngineState::Idle => {
                return self.mount(width, height, device_pixel_ratio);
            }
            EngineState::Running | EngineState::Paused => {}
        }
        self.device_pixel_ratio = device_pixel_ratio;
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.reseed(width, height)?;
        if self.config.reduced_motion && self.state != EngineState::Disposed {
            self.render_static();
        }
        log::debug!("Resized to {}x{} @{:.2}", width, height, self.scale());
        Ok(())
    }

    /// Switch the low-power profile. Applies from the next re-seed.
    pub fn set_mobile(&mut self, mobile: bool) {
        if self.config.mobile != mobile {
            self.config.mobile = mobile;
            self.profile = self.config.profile();
            log::debug!("Mobile profile {}", if mobile { "on" } else { "off" });
        }
    }

    /// Replace the formation text without re-seeding.
    ///
    /// Live particles keep their position and velocity and steer towards
    /// the new targets, blending into `color`. Slots the new text has no
    /// target for fly off-screen in the background colour.
    pub fn set_text(&mut self, text: &str, color: Rgb) -> Result<(), ConfigError> {
        let ForceMode::Formation(current) = &self.config.mode else {
            return Err(ConfigError::NotFormation);
        };
        if text.trim().is_empty() {
            return Err(ConfigError::EmptyText);
        }
        if self.state == EngineState::Disposed {
            return Ok(());
        }

        let formation = FormationConfig {
            text: text.to_string(),
            target_color: color.to_hex(),
            ..current.clone()
        };
        let sampler = SpawnSampler::new(&formation)?;
        let targets = match self.viewport {
            Some(v) => Some(sampler.sample(text, v.width, v.height, &mut self.rng)?),
            None => None,
        };
        self.config.mode = ForceMode::Formation(formation);
        self.sampler = Some(sampler);

        if let Some(targets) = targets {
            self.retarget(targets)?;
        }
        Ok(())
    }

    /// Overwrite the pointer position.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        if self.state != EngineState::Disposed {
            self.pointer = PointerState::at(x, y);
        }
    }

    pub fn clear_pointer(&mut self) {
        if self.state != EngineState::Disposed {
            self.pointer = PointerState::inactive();
        }
    }

    /// Visibility from an intersection observer.
    pub fn set_visible(&mut self, visible: bool) {
        if self.state == EngineState::Disposed {
            return;
        }
        self.visible = visible;
        match (self.state, visible) {
            (EngineState::Running, false) => {
                self.cancel_pending();
                self.state = EngineState::Paused;
            }
            (EngineState::Paused, true) if !self.config.reduced_motion => {
                self.state = EngineState::Running;
                self.schedule();
            }
            _ => {}
        }
    }

    /// Cancel the pending frame and release every buffer. Terminal.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        self.cancel_pending();
        self.state = EngineState::Disposed;
        self.pipeline = None;
        self.policy = None;
        self.store.allocate(0);
        self.pointer = PointerState::inactive();
        log::debug!("Engine disposed after {} frames", self.tick);
    }

    /// The drawing surface went away. The instance stops for good.
    pub fn context_lost(&mut self) {
        if self.state != EngineState::Disposed {
            log::warn!("Rendering context lost; stopping engine");
            self.dispose();
        }
    }

    /// Override the trail fade alpha (used for the closing frames of an export).
    pub fn set_trail_alpha(&mut self, alpha: f32) {
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.set_fade_alpha(alpha);
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of completed render passes.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn pipeline(&self) -> Option<&RenderPipeline<B>> {
        self.pipeline.as_ref()
    }

    pub fn stats(&self) -> EngineStats {
        let n = self.store.len();
        let mean_age_ratio = if n == 0 {
            0.0
        } else {
            self.store
                .slots()
                .map(|s| s[field::AGE] / s[field::TTL].max(f32::EPSILON))
                .sum::<f32>()
                / n as f32
        };
        EngineStats {
            state: self.state,
            tick: self.tick,
            renders: self.renders,
            particle_count: n,
            mean_age_ratio,
            mean_brightness: self
                .pipeline
                .as_ref()
                .filter(|_| self.viewport.is_some())
                .and_then(|p| p.backend().mean_brightness())
                .unwrap_or(0.0),
            recycled_total: self.lifecycle.recycled_total(),
        }
    }

    fn scale(&self) -> f32 {
        let dpr = self.device_pixel_ratio;
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        dpr.min(self.profile.max_device_pixel_ratio)
    }

    /// Rebuild the spawn policy for a new viewport and re-seed every slot.
    fn reseed(&mut self, width: u32, height: u32) -> Result<(), ConfigError> {
        let scale = self.scale();
        let (policy, count) = self.spawn_policy(width, height)?;

        self.store.allocate(count);
        self.store.spawn_all(&policy, &mut self.rng);
        self.policy = Some(policy);

        let resized = self
            .pipeline
            .as_mut()
            .map(|pipeline| pipeline.resize(width, height, scale));
        if let Some(Err(e)) = resized {
            log::warn!("Surface resize failed: {}", e);
            self.context_lost();
            return Ok(());
        }
        self.viewport = Some(Viewport {
            width,
            height,
            scale,
        });
        Ok(())
    }

    /// Point every slot at the new target pool. A larger pool is spread
    /// evenly over the slots; slots past a smaller one are sent away.
    fn retarget(&mut self, targets: Vec<SpawnTarget>) -> Result<(), ConfigError> {
        let Some(viewport) = self.viewport else {
            return Ok(());
        };
        let background = self.config.background()?;
        let (w, h) = (viewport.width as f32, viewport.height as f32);
        let (cx, cy) = (w * 0.5, h * 0.5);
        let exit = (w + h) * 0.5;
        let (n, len) = (self.store.len(), targets.len());

        let mut killed = 0;
        for i in 0..n {
            let target = if len > n {
                Some(targets[i * len / n])
            } else {
                targets.get(i).copied()
            };
            let target = target.unwrap_or_else(|| {
                killed += 1;
                let [ux, uy]: [f32; 2] = UnitCircle.sample(&mut self.rng);
                SpawnTarget {
                    x: cx + ux * exit,
                    y: cy + uy * exit,
                    color: background,
                }
            });
            let slot = self.store.slot_mut(i);
            slot[field::TARGET_X] = target.x;
            slot[field::TARGET_Y] = target.y;
            slot[field::TARGET_R] = target.color.r;
            slot[field::TARGET_G] = target.color.g;
            slot[field::TARGET_B] = target.color.b;
            slot[field::BLEND] = 0.0;
        }

        log::debug!(
            "Retargeted {} particles onto {} targets, {} sent off-screen",
            n,
            len,
            killed
        );
        if let Some(SpawnPolicy::Formation(spawn)) = &mut self.policy {
            spawn.targets = targets;
        }
        Ok(())
    }

    fn spawn_policy(&mut self, width: u32, height: u32) -> Result<(SpawnPolicy, usize), ConfigError> {
        let (w, h) = (width as f32, height as f32);
        match (&self.config.mode, &self.sampler) {
            (ForceMode::Formation(formation), Some(sampler)) => {
                let targets = sampler.sample(&formation.text, width, height, &mut self.rng)?;
                let count = targets.len();
                let policy = SpawnPolicy::Formation(FormationSpawn {
                    center: (w * 0.5, h * 0.5),
                    ring_min: formation.ring_min,
                    ring_range: formation.ring_range,
                    targets,
                    start_colors: self.palette.colors().to_vec(),
                    ttl: formation.ttl,
                    max_speed_range: formation.max_speed_range,
                    max_force_range: formation.max_force_range,
                    size_range: formation.size_range,
                    color_speed_range: formation.color_speed_range,
                });
                Ok((policy, count))
            }
            (ForceMode::Drift(drift), _) => {
                let profile = self.profile;
                let policy = SpawnPolicy::Drift(DriftSpawn {
                    width: w,
                    height: h,
                    speed: drift.speed,
                    size_range: profile.size_range,
                    opacity_range: drift.opacity_range,
                    colors: self.palette.colors().to_vec(),
                });
                Ok((policy, profile.particle_count))
            }
            _ => {
                let profile = self.profile;
                let policy = SpawnPolicy::Ambient(AmbientSpawn {
                    width: w,
                    height: h,
                    base_ttl: profile.base_ttl,
                    ttl_range: profile.ttl_range,
                    base_speed: self.config.base_speed,
                    speed_range: profile.speed_range,
                    size_range: profile.size_range,
                    hues: self.palette.colors().iter().map(|c| c.hue()).collect(),
                });
                Ok((policy, profile.particle_count))
            }
        }
    }

    fn render_static(&mut self) {
        let Some(pipeline) = &mut self.pipeline else {
            return;
        };
        match pipeline.render(&self.store) {
            Ok(()) => self.renders += 1,
            Err(e) => {
                log::warn!("Render failed: {}", e);
                self.context_lost();
            }
        }
    }

    fn schedule(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
    }
}

impl<S: FrameScheduler, B: RenderBackend> Drop for Engine<S, B> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

impl<S: FrameScheduler, B: RenderBackend> fmt::Debug for Engine<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .field("particles", &self.store.len())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DriftConfig;
    use proptest::prelude::*;

    fn test_config() -> EngineConfig {
        EngineConfig {
            particle_count: 64,
            seed: Some(7),
            ..Default::default()
        }
    }

    fn engine(config: EngineConfig) -> Engine<ManualScheduler> {
        Engine::new(config, ManualScheduler::new()).unwrap()
    }

    #[test]
    fn test_four_particles_distinct_and_fresh() {
        let config = EngineConfig {
            particle_count: 4,
            palette: vec!["#D4AF37".into()],
            base_speed: 1.0,
            seed: Some(3),
            ..Default::default()
        };
        let mut engine = engine(config);
        engine.mount(800, 600, 1.0).unwrap();

        let store = engine.store();
        assert_eq!(store.len(), 4);
        for i in 0..4 {
            assert_eq!(store.particle(i).age, 0.0);
            for j in (i + 1)..4 {
                let (a, b) = (store.particle(i), store.particle(j));
                assert!((a.x, a.y) != (b.x, b.y));
            }
        }
    }

    #[test]
    fn test_reduced_motion_renders_once() {
        let config = EngineConfig {
            reduced_motion: true,
            ..test_config()
        };
        let mut engine = engine(config);
        engine.mount(200, 100, 1.0).unwrap();
        assert_eq!(engine.renders(), 1);
        assert_eq!(engine.state(), EngineState::Paused);
        assert_eq!(engine.scheduler().requested(), 0);

        assert!(!engine.on_frame());
        engine.set_visible(false);
        engine.set_visible(true);
        assert_eq!(engine.renders(), 1);
        assert_eq!(engine.scheduler().requested(), 0);
        assert_eq!(engine.tick(), 0);

        engine.resize(300, 100, 1.0).unwrap();
        assert_eq!(engine.renders(), 2);
        assert_eq!(engine.scheduler().requested(), 0);
    }

    #[test]
    fn test_resize_reseeds_into_new_bounds() {
        let mut engine = engine(test_config());
        engine.mount(800, 600, 1.0).unwrap();
        for _ in 0..10 {
            engine.step();
        }
        engine.resize(400, 300, 1.0).unwrap();
        for i in 0..engine.store().len() {
            let p = engine.store().particle(i);
            assert!((0.0..=400.0).contains(&p.x) && (0.0..=300.0).contains(&p.y));
            assert_eq!(p.age, 0.0);
        }
        assert!(engine.step());
        for i in 0..engine.store().len() {
            let p = engine.store().particle(i);
            assert!((0.0..=400.0).contains(&p.x) && (0.0..=300.0).contains(&p.y));
        }
        assert_eq!(engine.viewport().map(|v| (v.width, v.height)), Some((400, 300)));
    }

    #[test]
    fn test_frame_loop_requests_next_frame() {
        let mut engine = engine(test_config());
        engine.mount(100, 100, 1.0).unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.scheduler().pending().len(), 1);

        for _ in 0..3 {
            assert!(engine.scheduler_mut().fire().is_some());
            assert!(engine.on_frame());
        }
        assert_eq!(engine.tick(), 3);
        assert_eq!(engine.scheduler().pending().len(), 1);
        assert_eq!(engine.scheduler().requested(), 4);
    }

    #[test]
    fn test_visibility_pauses_and_resumes() {
        let mut engine = engine(test_config());
        engine.mount(100, 100, 1.0).unwrap();

        engine.set_visible(false);
        assert_eq!(engine.state(), EngineState::Paused);
        assert!(engine.scheduler().pending().is_empty());
        assert_eq!(engine.scheduler().cancelled(), 1);
        assert!(!engine.on_frame());

        engine.set_visible(true);
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.scheduler().pending().len(), 1);
    }

    #[test]
    fn test_dispose_is_clean() {
        let mut engine = engine(test_config());
        engine.mount(100, 100, 1.0).unwrap();
        engine.scheduler_mut().fire();
        engine.on_frame();
        let renders = engine.renders();

        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert!(engine.scheduler().pending().is_empty());
        assert_eq!(engine.scheduler().cancelled(), 1);

        engine.resize(300, 300, 1.0).unwrap();
        engine.set_pointer(10.0, 10.0);
        engine.clear_pointer();
        engine.set_visible(false);
        engine.set_visible(true);
        assert!(!engine.on_frame());
        assert!(!engine.step());

        assert_eq!(engine.renders(), renders);
        assert!(engine.frame_rgba().is_none());
        assert!(engine.store().is_empty());
        assert!(engine.scheduler().pending().is_empty());
        assert!(!engine.pointer().active);
    }

    #[test]
    fn test_context_loss_stops_engine() {
        let mut engine = engine(test_config());
        engine.mount(100, 100, 1.0).unwrap();
        engine.context_lost();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert!(engine.scheduler().pending().is_empty());
    }

    #[test]
    fn test_zero_size_defers_mount() {
        let mut engine = engine(test_config());
        engine.mount(0, 0, 2.0).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.store().is_empty());
        assert!(!engine.step());

        engine.resize(120, 80, 2.0).unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.store().len(), 64);
        assert_eq!(engine.viewport().map(|v| v.scale), Some(2.0));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = EngineConfig {
            particle_count: 0,
            ..Default::default()
        };
        assert!(Engine::new(config, ManualScheduler::new()).is_err());
    }

    #[test]
    fn test_mobile_profile_caps_dpr_and_count() {
        let config = EngineConfig {
            mobile: true,
            ..test_config()
        };
        let mut engine = engine(config);
        engine.mount(100, 100, 3.0).unwrap();
        assert_eq!(engine.store().len(), 32);
        assert_eq!(engine.viewport().map(|v| v.scale), Some(2.0));
        assert_eq!(engine.frame().map(Canvas::width), Some(200));
    }

    #[test]
    fn test_resize_follows_device_pixel_ratio() {
        let mut engine = engine(test_config());
        engine.mount(100, 80, 1.0).unwrap();
        assert_eq!(engine.frame().map(Canvas::width), Some(100));

        engine.resize(100, 80, 2.0).unwrap();
        assert_eq!(engine.frame().map(Canvas::width), Some(200));
        assert_eq!(engine.frame().map(Canvas::height), Some(160));
        assert_eq!(engine.viewport().map(|v| v.scale), Some(2.0));
    }

    #[test]
    fn test_set_mobile_applies_on_next_resize() {
        let mut engine = engine(test_config());
        engine.mount(100, 100, 3.0).unwrap();
        engine.set_mobile(true);
        assert_eq!(engine.store().len(), 64);

        engine.resize(100, 100, 3.0).unwrap();
        assert_eq!(engine.store().len(), 32);
        assert_eq!(engine.viewport().map(|v| v.scale), Some(2.0));

        engine.set_mobile(false);
        engine.resize(100, 100, 3.0).unwrap();
        assert_eq!(engine.store().len(), 64);
    }

    #[test]
    fn test_frame_is_none_before_mount() {
        let engine = engine(test_config());
        assert!(engine.frame().is_none());
        assert_eq!(engine.stats().mean_brightness, 0.0);
    }

    #[test]
    fn test_pointer_is_latest_value() {
        let mut engine = engine(test_config());
        engine.set_pointer(1.0, 2.0);
        engine.set_pointer(3.0, 4.0);
        assert_eq!(engine.pointer(), PointerState::at(3.0, 4.0));
        engine.clear_pointer();
        assert!(!engine.pointer().active);
    }

    #[test]
    fn test_formation_engine_uses_text_targets() {
        let config = EngineConfig {
            seed: Some(1),
            ..EngineConfig::formation("HI", 70.0)
        };
        let mut engine = engine(config);
        engine.mount(300, 150, 1.0).unwrap();
        let n = engine.store().len();
        assert!(n > 20);
        assert_eq!(engine.store().stride(), field::STEERING);

        for _ in 0..300 {
            engine.step();
        }
        let settled = (0..n)
            .filter(|&i| {
                let s = engine.store().slot(i);
                let dx = s[field::TARGET_X] - s[field::X];
                let dy = s[field::TARGET_Y] - s[field::Y];
                (dx * dx + dy * dy).sqrt() < 3.0
            })
            .count();
        assert!(settled * 10 >= n * 9, "{} of {} settled", settled, n);
        assert_eq!(engine.store().len(), n);
    }

    #[test]
    fn test_set_text_retargets_in_place() {
        let config = EngineConfig {
            seed: Some(1),
            ..EngineConfig::formation("HI", 70.0)
        };
        let mut engine = engine(config);
        engine.mount(300, 150, 1.0).unwrap();
        for _ in 0..20 {
            engine.step();
        }
        let n = engine.store().len();
        let before: Vec<(f32, f32)> = (0..n)
            .map(|i| {
                let p = engine.store().particle(i);
                (p.x, p.y)
            })
            .collect();

        let ForceMode::Formation(formation) = &engine.config().mode else {
            panic!("not a formation engine");
        };
        let m = SpawnSampler::new(&FormationConfig {
            text: "II".into(),
            ..formation.clone()
        })
        .unwrap()
        .sample("II", 300, 150, &mut StdRng::seed_from_u64(0))
        .unwrap()
        .len();
        assert!(m < n, "{} >= {}", m, n);

        let cyan = Rgb::from_hex("#06B6D4").unwrap();
        engine.set_text("II", cyan).unwrap();

        let store = engine.store();
        assert_eq!(store.len(), n);
        let off_screen = (0..n)
            .filter(|&i| {
                let s = store.slot(i);
                !(0.0..=300.0).contains(&s[field::TARGET_X])
                    || !(0.0..=150.0).contains(&s[field::TARGET_Y])
            })
            .count();
        assert_eq!(off_screen, n - m);
        for (i, &position) in before.iter().enumerate() {
            let s = store.slot(i);
            assert_eq!(s[field::BLEND], 0.0);
            assert_eq!((s[field::X], s[field::Y]), position);
        }
        assert!((store.slot(0)[field::TARGET_B] - cyan.b).abs() < 1e-6);
        assert!(matches!(
            &engine.config().mode,
            ForceMode::Formation(f) if f.text == "II" && f.target_color == "#06B6D4"
        ));
    }

    #[test]
    fn test_set_text_rejects_wrong_mode_and_blank_text() {
        let mut ambient = engine(test_config());
        assert!(matches!(
            ambient.set_text("HI", Rgb::WHITE),
            Err(ConfigError::NotFormation)
        ));

        let mut formation = engine(EngineConfig::formation("HI", 70.0));
        assert!(matches!(
            formation.set_text("   ", Rgb::WHITE),
            Err(ConfigError::EmptyText)
        ));
    }

    #[test]
    fn test_set_text_before_mount_samples_new_text() {
        let config = EngineConfig {
            seed: Some(2),
            ..EngineConfig::formation("HI", 70.0)
        };
        let mut engine = engine(config);
        engine.set_text("II", Rgb::WHITE).unwrap();
        engine.mount(300, 150, 1.0).unwrap();

        let ForceMode::Formation(formation) = &engine.config().mode else {
            panic!("not a formation engine");
        };
        let expected = SpawnSampler::new(formation)
            .unwrap()
            .sample("II", 300, 150, &mut StdRng::seed_from_u64(0))
            .unwrap()
            .len();
        assert_eq!(engine.store().len(), expected);
    }

    #[test]
    fn test_four_drifting_dots() {
        let config = EngineConfig {
            particle_count: 4,
            palette: vec!["#D4AF37".into()],
            seed: Some(3),
            mode: ForceMode::Drift(DriftConfig {
                speed: 1.0,
                ..DriftConfig::default()
            }),
            ..EngineConfig::drift()
        };
        let mut engine = engine(config);
        engine.mount(800, 600, 1.0).unwrap();
        assert_eq!(engine.store().len(), 4);
        assert_eq!(engine.store().stride(), field::DRIFT);

        let gold = Rgb::from_hex("#D4AF37").unwrap();
        for slot in engine.store().slots() {
            assert!(slot[field::VX].abs() <= 0.25 && slot[field::VY].abs() <= 0.25);
            assert!((0.3..=0.8).contains(&slot[field::OPACITY]));
            assert_eq!(slot[field::FILL_R], gold.r);
        }

        for _ in 0..2000 {
            assert!(engine.step());
        }
        for slot in engine.store().slots() {
            assert!((0.0..=800.0).contains(&slot[field::X]));
            assert!((0.0..=600.0).contains(&slot[field::Y]));
        }
        assert_eq!(engine.stats().recycled_total, 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut engine = engine(test_config());
        engine.mount(100, 100, 1.0).unwrap();
        for _ in 0..5 {
            engine.step();
        }
        let stats = engine.stats();
        assert_eq!(stats.tick, 5);
        assert_eq!(stats.particle_count, 64);
        assert!(stats.mean_age_ratio > 0.0 && stats.mean_age_ratio <= 1.0);
        assert!(stats.mean_brightness > 0.0);
        assert!(stats.to_string().contains("particles=64"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_drift_stays_in_bounds(
            seed in any::<u64>(),
            n in 1usize..60,
            width in 16u32..200,
            height in 16u32..200,
            speed in 0.0f32..40.0,
            frames in 1usize..60,
        ) {
            let config = EngineConfig {
                particle_count: n,
                seed: Some(seed),
                mode: ForceMode::Drift(DriftConfig {
                    speed,
                    ..DriftConfig::default()
                }),
                ..EngineConfig::drift()
            };
            let mut engine = engine(config);
            engine.mount(width, height, 1.0).unwrap();

            for _ in 0..frames {
                prop_assert!(engine.step());
                for slot in engine.store().slots() {
                    prop_assert!(slot[field::X] >= 0.0 && slot[field::X] <= width as f32);
                    prop_assert!(slot[field::Y] >= 0.0 && slot[field::Y] <= height as f32);
                }
            }
            prop_assert_eq!(engine.stats().recycled_total, 0);
        }

        #[test]
        fn prop_ambient_invariants_hold_every_frame(
            seed in any::<u64>(),
            n in 1usize..80,
            width in 16u32..200,
            height in 16u32..200,
            frames in 1usize..30,
        ) {
            let config = EngineConfig {
                particle_count: n,
                seed: Some(seed),
                base_speed: 2.0,
                ..Default::default()
            };
            let mut engine = engine(config);
            engine.mount(width, height, 1.0).unwrap();
            engine.set_pointer(width as f32 / 2.0, height as f32 / 2.0);

            for _ in 0..frames {
                prop_assert!(engine.step());
                let store = engine.store();
                prop_assert_eq!(store.len(), n);
                for i in 0..n {
                    let p = store.particle(i);
                    prop_assert!(p.age >= 0.0 && p.age <= p.ttl);
                    prop_assert!(p.x >= 0.0 && p.x <= width as f32);
                    prop_assert!(p.y >= 0.0 && p.y <= height as f32);
                }
            }
        }
    }
}

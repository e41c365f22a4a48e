//! Particle lifecycle: spawn policies and in-place recycling.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, UnitCircle};

use crate::schema::Rgb;

use super::{ParticleStore, field};

/// A glyph-sampled destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnTarget {
    pub x: f32,
    pub y: f32,
    pub color: Rgb,
}

/// Uniform-random spawn across the viewport.
#[derive(Debug, Clone)]
pub struct AmbientSpawn {
    pub width: f32,
    pub height: f32,
    pub base_ttl: f32,
    pub ttl_range: f32,
    pub base_speed: f32,
    pub speed_range: f32,
    pub size_range: (f32, f32),
    /// Hues in degrees, one picked per spawn.
    pub hues: Vec<f32>,
}

/// Ring spawn around the viewport centre, steering towards a fixed target.
#[derive(Debug, Clone)]
pub struct FormationSpawn {
    pub center: (f32, f32),
    pub ring_min: f32,
    pub ring_range: f32,
    pub targets: Vec<SpawnTarget>,
    /// Start colours, one picked per spawn.
    pub start_colors: Vec<Rgb>,
    pub ttl: f32,
    pub max_speed_range: (f32, f32),
    pub max_force_range: (f32, f32),
    pub size_range: (f32, f32),
    pub color_speed_range: (f32, f32),
}

/// Uniform spawn with a constant velocity, fill colour and opacity.
#[derive(Debug, Clone)]
pub struct DriftSpawn {
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub size_range: (f32, f32),
    pub opacity_range: (f32, f32),
    /// Fill colours, one picked per spawn.
    pub colors: Vec<Rgb>,
}

/// How a slot is (re)initialised.
#[derive(Debug, Clone)]
pub enum SpawnPolicy {
    Ambient(AmbientSpawn),
    Formation(FormationSpawn),
    Drift(DriftSpawn),
}

impl SpawnPolicy {
    /// Write a fresh state for particle `index` into a zeroed slot.
    pub fn spawn<R: Rng + ?Sized>(&self, index: usize, slot: &mut [f32], rng: &mut R) {
        match self {
            SpawnPolicy::Ambient(policy) => policy.spawn(slot, rng),
            SpawnPolicy::Formation(policy) => policy.spawn(index, slot, rng),
            SpawnPolicy::Drift(policy) => policy.spawn(slot, rng),
        }
    }

    /// Viewport that particles recycle outside of. Formation particles
    /// travel in from off-screen and have none.
    pub fn bounds(&self) -> Option<(f32, f32)> {
        match self {
            SpawnPolicy::Ambient(policy) => Some((policy.width, policy.height)),
            SpawnPolicy::Formation(_) => None,
            SpawnPolicy::Drift(policy) => Some((policy.width, policy.height)),
        }
    }
}

impl AmbientSpawn {
    fn spawn<R: Rng + ?Sized>(&self, slot: &mut [f32], rng: &mut R) {
        slot[field::X] = rand_up_to(rng, self.width);
        slot[field::Y] = rand_up_to(rng, self.height);
        slot[field::VX] = 0.0;
        slot[field::VY] = 0.0;
        slot[field::AGE] = 0.0;
        slot[field::TTL] = self.base_ttl + rand_up_to(rng, self.ttl_range);
        slot[field::SPEED] = self.base_speed + rand_up_to(rng, self.speed_range);
        slot[field::RADIUS] = rand_between(rng, self.size_range);
        slot[field::HUE] = self.hues.choose(rng).copied().unwrap_or(0.0);
    }
}

impl FormationSpawn {
    fn spawn<R: Rng + ?Sized>(&self, index: usize, slot: &mut [f32], rng: &mut R) {
        let [ux, uy]: [f32; 2] = UnitCircle.sample(rng);
        let distance = self.ring_min + rand_up_to(rng, self.ring_range);
        slot[field::X] = self.center.0 + ux * distance;
        slot[field::Y] = self.center.1 + uy * distance;
        slot[field::VX] = 0.0;
        slot[field::VY] = 0.0;
        slot[field::AGE] = 0.0;
        slot[field::TTL] = self.ttl;
        slot[field::SPEED] = rand_between(rng, self.max_speed_range);
        slot[field::RADIUS] = rand_between(rng, self.size_range);
        slot[field::BLEND] = 0.0;

        let target = self
            .targets
            .get(index % self.targets.len().max(1))
            .copied()
            .unwrap_or(SpawnTarget {
                x: self.center.0,
                y: self.center.1,
                color: Rgb::WHITE,
            });
        slot[field::TARGET_X] = target.x;
        slot[field::TARGET_Y] = target.y;
        slot[field::MAX_FORCE] = rand_between(rng, self.max_force_range);

        let start = self.start_colors.choose(rng).copied().unwrap_or(target.color);
        slot[field::COLOR_R] = start.r;
        slot[field::COLOR_G] = start.g;
        slot[field::COLOR_B] = start.b;
        slot[field::TARGET_R] = target.color.r;
        slot[field::TARGET_G] = target.color.g;
        slot[field::TARGET_B] = target.color.b;
        slot[field::BLEND_RATE] = rand_between(rng, self.color_speed_range);
    }
}

impl DriftSpawn {
    fn spawn<R: Rng + ?Sized>(&self, slot: &mut [f32], rng: &mut R) {
        slot[field::X] = rand_up_to(rng, self.width);
        slot[field::Y] = rand_up_to(rng, self.height);
        slot[field::VX] = (rng.r#gen::<f32>() - 0.5) * self.speed * 0.5;
        slot[field::VY] = (rng.r#gen::<f32>() - 0.5) * self.speed * 0.5;
        slot[field::AGE] = 0.0;
        // Dots live until the next re-seed.
        slot[field::TTL] = f32::INFINITY;
        slot[field::SPEED] = 1.0;
        slot[field::RADIUS] = rand_between(rng, self.size_range);

        let color = self.colors.choose(rng).copied().unwrap_or(Rgb::WHITE);
        slot[field::HUE] = color.hue();
        slot[field::FILL_R] = color.r;
        slot[field::FILL_G] = color.g;
        slot[field::FILL_B] = color.b;
        slot[field::OPACITY] = rand_between(rng, self.opacity_range);
    }
}

#[inline]
fn rand_up_to<R: Rng + ?Sized>(rng: &mut R, n: f32) -> f32 {
    rng.r#gen::<f32>() * n
}

#[inline]
fn rand_between<R: Rng + ?Sized>(rng: &mut R, (min, max): (f32, f32)) -> f32 {
    min + rand_up_to(rng, max - min)
}

/// Ages particles and recycles the ones that expired or left the viewport.
#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleManager {
    recycled_total: u64,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every slot by one frame. Returns the number of recycled slots.
    ///
    /// Runs after the force step and before rendering, so no expired or
    /// out-of-bounds particle is ever drawn.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        store: &mut ParticleStore,
        policy: &SpawnPolicy,
        rng: &mut R,
    ) -> usize {
        let bounds = policy.bounds();
        let mut recycled = 0;
        for i in 0..store.len() {
            let slot = store.slot_mut(i);
            slot[field::AGE] += 1.0;
            if needs_recycle(slot, bounds) {
                store.spawn(i, policy, rng);
                recycled += 1;
            }
        }
        self.recycled_total += recycled as u64;
        recycled
    }

    /// Slots recycled since construction.
    pub fn recycled_total(&self) -> u64 {
        self.recycled_total
    }
}

#[inline]
fn needs_recycle(slot: &[f32], bounds: Option<(f32, f32)>) -> bool {
    let (x, y) = (slot[field::X], slot[field::Y]);
    if !(x.is_finite() && y.is_finite()) || slot[field::AGE] > slot[field::TTL] {
        return true;
    }
    match bounds {
        Some((width, height)) => x < 0.0 || x > width || y < 0.0 || y > height,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Layout;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ambient(width: f32, height: f32) -> SpawnPolicy {
        SpawnPolicy::Ambient(AmbientSpawn {
            width,
            height,
            base_ttl: 80.0,
            ttl_range: 200.0,
            base_speed: 0.1,
            speed_range: 1.2,
            size_range: (1.0, 3.5),
            hues: vec![46.0, 189.0],
        })
    }

    fn formation(targets: Vec<SpawnTarget>) -> SpawnPolicy {
        SpawnPolicy::Formation(FormationSpawn {
            center: (600.0, 315.0),
            ring_min: 200.0,
            ring_range: 200.0,
            targets,
            start_colors: vec![Rgb::from_u8(6, 182, 212)],
            ttl: 100_000.0,
            max_speed_range: (18.0, 26.0),
            max_force_range: (1.0, 1.5),
            size_range: (2.0, 4.0),
            color_speed_range: (0.03, 0.07),
        })
    }

    #[test]
    fn test_ambient_spawn_ranges() {
        let policy = ambient(800.0, 600.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut store = ParticleStore::new(Layout::Ambient);
        store.allocate(200);
        store.spawn_all(&policy, &mut rng);

        for i in 0..store.len() {
            let p = store.particle(i);
            assert!((0.0..=800.0).contains(&p.x) && (0.0..=600.0).contains(&p.y));
            assert_eq!((p.vx, p.vy, p.age), (0.0, 0.0, 0.0));
            assert!((80.0..=280.0).contains(&p.ttl));
            assert!((0.1..=1.3).contains(&p.speed));
            assert!((1.0..=3.5).contains(&p.radius));
            assert!(p.hue == 46.0 || p.hue == 189.0);
        }
    }

    #[test]
    fn test_formation_spawn_on_ring_with_target() {
        let target = SpawnTarget {
            x: 10.0,
            y: 20.0,
            color: Rgb::from_u8(212, 175, 55),
        };
        let policy = formation(vec![target]);
        let mut rng = StdRng::seed_from_u64(2);
        let mut store = ParticleStore::new(Layout::Steering);
        store.allocate(50);
        store.spawn_all(&policy, &mut rng);

        for i in 0..store.len() {
            let slot = store.slot(i);
            let dx = slot[field::X] - 600.0;
            let dy = slot[field::Y] - 315.0;
            let r = (dx * dx + dy * dy).sqrt();
            assert!((199.9..=400.1).contains(&r), "ring radius {}", r);
            assert_eq!(slot[field::TARGET_X], 10.0);
            assert_eq!(slot[field::TARGET_Y], 20.0);
            assert!((18.0..=26.0).contains(&slot[field::SPEED]));
            assert!((1.0..=1.5).contains(&slot[field::MAX_FORCE]));
            assert_eq!(slot[field::BLEND], 0.0);
            assert!((slot[field::TARGET_R] - 212.0 / 255.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_formation_targets_by_index() {
        let targets = (0..3)
            .map(|k| SpawnTarget {
                x: k as f32,
                y: 0.0,
                color: Rgb::WHITE,
            })
            .collect();
        let policy = formation(targets);
        let mut rng = StdRng::seed_from_u64(3);
        let mut store = ParticleStore::new(Layout::Steering);
        store.allocate(7);
        store.spawn_all(&policy, &mut rng);
        for i in 0..7 {
            assert_eq!(store.get(i, field::TARGET_X), (i % 3) as f32);
        }
    }

    #[test]
    fn test_expired_particle_recycles() {
        let policy = ambient(100.0, 100.0);
        let mut rng = StdRng::seed_from_u64(4);
        let mut store = ParticleStore::new(Layout::Ambient);
        store.allocate(1);
        store.spawn(0, &policy, &mut rng);
        let ttl = store.get(0, field::TTL);
        store.set(0, field::AGE, ttl);

        let mut lifecycle = LifecycleManager::new();
        assert_eq!(lifecycle.advance(&mut store, &policy, &mut rng), 1);
        assert_eq!(store.get(0, field::AGE), 0.0);
        assert_eq!(lifecycle.recycled_total(), 1);
    }

    #[test]
    fn test_formation_ignores_bounds() {
        let policy = formation(vec![]);
        let mut rng = StdRng::seed_from_u64(5);
        let mut store = ParticleStore::new(Layout::Steering);
        store.allocate(1);
        store.spawn(0, &policy, &mut rng);
        store.set(0, field::X, -5000.0);

        let mut lifecycle = LifecycleManager::new();
        assert_eq!(lifecycle.advance(&mut store, &policy, &mut rng), 0);
        assert_eq!(store.get(0, field::AGE), 1.0);
    }

    #[test]
    fn test_nan_position_recycles() {
        let policy = formation(vec![]);
        let mut rng = StdRng::seed_from_u64(6);
        let mut store = ParticleStore::new(Layout::Steering);
        store.allocate(1);
        store.spawn(0, &policy, &mut rng);
        store.set(0, field::X, f32::NAN);

        let mut lifecycle = LifecycleManager::new();
        assert_eq!(lifecycle.advance(&mut store, &policy, &mut rng), 1);
        assert!(store.get(0, field::X).is_finite());
    }

    #[test]
    fn test_drift_spawn_ranges() {
        let policy = SpawnPolicy::Drift(DriftSpawn {
            width: 400.0,
            height: 300.0,
            speed: 1.0,
            size_range: (1.0, 3.0),
            opacity_range: (0.3, 0.8),
            colors: vec![Rgb::from_u8(212, 175, 55)],
        });
        let mut rng = StdRng::seed_from_u64(8);
        let mut store = ParticleStore::new(Layout::Drift);
        store.allocate(100);
        store.spawn_all(&policy, &mut rng);

        for i in 0..store.len() {
            let slot = store.slot(i);
            assert!((0.0..=400.0).contains(&slot[field::X]));
            assert!(slot[field::VX].abs() <= 0.25 && slot[field::VY].abs() <= 0.25);
            assert!((0.3..=0.8).contains(&slot[field::OPACITY]));
            assert!((slot[field::FILL_R] - 212.0 / 255.0).abs() < 1e-6);
            assert_eq!(slot[field::TTL], f32::INFINITY);
        }

        let mut lifecycle = LifecycleManager::new();
        assert_eq!(lifecycle.advance(&mut store, &policy, &mut rng), 0);
    }

    proptest! {
        #[test]
        fn prop_lifecycle_and_bounds_hold(
            seed in any::<u64>(),
            n in 1usize..64,
            dx in -50.0f32..50.0,
            dy in -50.0f32..50.0,
            frames in 1usize..40,
        ) {
            let policy = ambient(320.0, 240.0);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut store = ParticleStore::new(Layout::Ambient);
            store.allocate(n);
            store.spawn_all(&policy, &mut rng);
            let mut lifecycle = LifecycleManager::new();

            for _ in 0..frames {
                store.for_each_slot(|_, slot| {
                    slot[field::X] += dx;
                    slot[field::Y] += dy;
                });
                lifecycle.advance(&mut store, &policy, &mut rng);

                for i in 0..n {
                    let p = store.particle(i);
                    prop_assert!(p.age >= 0.0 && p.age <= p.ttl);
                    prop_assert!((0.0..=320.0).contains(&p.x));
                    prop_assert!((0.0..=240.0).contains(&p.y));
                }
            }
        }
    }
}

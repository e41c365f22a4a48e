//! Struct-of-arrays particle storage.
//!
//! Every particle lives in one contiguous `f32` buffer at
//! `index * stride + field`. Slots are reused in place on recycle; the buffer
//! is only reallocated by [`ParticleStore::allocate`].

use rand::Rng;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::SpawnPolicy;

/// Field offsets within a particle slot.
pub mod field {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const VX: usize = 2;
    pub const VY: usize = 3;
    pub const AGE: usize = 4;
    pub const TTL: usize = 5;
    /// Speed multiplier (ambient) or maximum speed (steering).
    pub const SPEED: usize = 6;
    pub const RADIUS: usize = 7;
    /// Static hue in degrees (ambient) or blend progress (steering).
    pub const HUE: usize = 8;

    /// Width of an ambient slot.
    pub const CORE: usize = 9;

    pub const TARGET_X: usize = 9;
    pub const TARGET_Y: usize = 10;
    pub const MAX_FORCE: usize = 11;
    pub const COLOR_R: usize = 12;
    pub const COLOR_G: usize = 13;
    pub const COLOR_B: usize = 14;
    pub const TARGET_R: usize = 15;
    pub const TARGET_G: usize = 16;
    pub const TARGET_B: usize = 17;
    pub const BLEND_RATE: usize = 18;

    /// Width of a steering slot.
    pub const STEERING: usize = 19;

    pub const FILL_R: usize = 9;
    pub const FILL_G: usize = 10;
    pub const FILL_B: usize = 11;
    pub const OPACITY: usize = 12;

    /// Width of a drift slot.
    pub const DRIFT: usize = 13;

    /// Alias: steering slots keep their colour blend progress in the hue column.
    pub const BLEND: usize = HUE;
}

/// Slot layout, chosen by the force model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Ambient,
    Steering,
    Drift,
}

impl Layout {
    /// Number of `f32` fields per particle.
    #[inline]
    pub const fn stride(self) -> usize {
        match self {
            Layout::Ambient => field::CORE,
            Layout::Steering => field::STEERING,
            Layout::Drift => field::DRIFT,
        }
    }
}

/// Snapshot of the core fields of one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub age: f32,
    pub ttl: f32,
    pub speed: f32,
    pub radius: f32,
    pub hue: f32,
}

impl Particle {
    fn from_slot(slot: &[f32]) -> Self {
        Self {
            x: slot[field::X],
            y: slot[field::Y],
            vx: slot[field::VX],
            vy: slot[field::VY],
            age: slot[field::AGE],
            ttl: slot[field::TTL],
            speed: slot[field::SPEED],
            radius: slot[field::RADIUS],
            hue: slot[field::HUE],
        }
    }
}

/// Flat particle buffer.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    data: Vec<f32>,
    layout: Layout,
    len: usize,
}

impl ParticleStore {
    /// Create an empty store. Call [`allocate`](Self::allocate) before use.
    pub fn new(layout: Layout) -> Self {
        Self {
            data: Vec::new(),
            layout,
            len: 0,
        }
    }

    /// Size the buffer for `n` particles, discarding all previous state.
    pub fn allocate(&mut self, n: usize) {
        self.data.clear();
        self.data.resize(n * self.stride(), 0.0);
        self.len = n;
    }

    /// Write a fresh spawn state into slot `i`.
    pub fn spawn<R: Rng + ?Sized>(&mut self, i: usize, policy: &SpawnPolicy, rng: &mut R) {
        let stride = self.stride();
        let slot = &mut self.data[i * stride..(i + 1) * stride];
        slot.fill(0.0);
        policy.spawn(i, slot, rng);
    }

    /// Re-seed every slot.
    pub fn spawn_all<R: Rng + ?Sized>(&mut self, policy: &SpawnPolicy, rng: &mut R) {
        for i in 0..self.len {
            self.spawn(i, policy, rng);
        }
    }

    /// Visit every slot in increasing index order.
    pub fn for_each_slot<F: FnMut(usize, &mut [f32])>(&mut self, mut f: F) {
        let stride = self.stride();
        for (i, slot) in self.data.chunks_exact_mut(stride).enumerate() {
            f(i, slot);
        }
    }

    /// Visit every slot, in parallel on native targets.
    ///
    /// Particles are independent, so the closure must not rely on ordering.
    pub fn par_for_each_slot<F>(&mut self, f: F)
    where
        F: Fn(usize, &mut [f32]) + Send + Sync,
    {
        let stride = self.stride();

        #[cfg(not(target_arch = "wasm32"))]
        self.data
            .par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(i, slot)| f(i, slot));

        #[cfg(target_arch = "wasm32")]
        for (i, slot) in self.data.chunks_exact_mut(stride).enumerate() {
            f(i, slot);
        }
    }

    /// Iterate over slots read-only.
    pub fn slots(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.stride())
    }

    #[inline]
    pub fn slot(&self, i: usize) -> &[f32] {
        let stride = self.stride();
        &self.data[i * stride..(i + 1) * stride]
    }

    #[inline]
    pub fn slot_mut(&mut self, i: usize) -> &mut [f32] {
        let stride = self.stride();
        &mut self.data[i * stride..(i + 1) * stride]
    }

    #[inline]
    pub fn get(&self, i: usize, field: usize) -> f32 {
        self.data[i * self.stride() + field]
    }

    #[inline]
    pub fn set(&mut self, i: usize, field: usize, value: f32) {
        let stride = self.stride();
        self.data[i * stride + field] = value;
    }

    /// Core fields of slot `i`.
    pub fn particle(&self, i: usize) -> Particle {
        Particle::from_slot(self.slot(i))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Raw backing buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

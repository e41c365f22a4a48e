//! Compute module - Particle simulation for the vortex and formation engines.

mod engine;
mod force;
mod lifecycle;
mod noise;
mod sampler;
mod store;

pub mod font;

pub use engine::*;
pub use force::*;
pub use lifecycle::*;
pub use self::noise::*;
pub use sampler::*;
pub use store::*;

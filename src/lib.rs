//! Vortex Particles - flow-field and text-formation particle backgrounds.
//!
//! A fixed pool of particles is advanced once per frame by a force model and
//! drawn through a layered raster pipeline with fading trails and glow.
//!
//! # Architecture
//!
//! - `schema`: Configuration types, colours and validation
//! - `compute`: Noise field, particle store, forces, lifecycle and the engine loop
//! - `render`: Raster backends (CPU canvas, browser Canvas 2D) and the
//!   trail/glow/present pipeline
//! - `animation`: Offline GIF/PNG export (native only)
//!
//! Three force models share the pipeline: the ambient flow field
//! (noise-driven motion with a pointer vortex), the formation variant
//! (particles steer from a ring onto targets sampled from rendered text) and
//! plain drifting dots that wrap at the edges.
//!
//! # Example
//!
//! ```rust,no_run
//! use vortex_particles::{
//!     compute::{Engine, ManualScheduler},
//!     schema::EngineConfig,
//! };
//!
//! let config = EngineConfig {
//!     seed: Some(7),
//!     ..EngineConfig::default()
//! };
//! let mut engine = Engine::new(config, ManualScheduler::new()).unwrap();
//! engine.mount(800, 450, 1.0).unwrap();
//!
//! for _ in 0..100 {
//!     engine.step();
//! }
//!
//! println!("{}", engine.stats());
//! ```

pub mod compute;
pub mod render;
pub mod schema;

// Offline export (not available in the browser build)
#[cfg(not(target_arch = "wasm32"))]
pub mod animation;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use compute::{Engine, EngineState, EngineStats, FrameScheduler, ManualScheduler};
pub use render::{Canvas, CpuBackend, RenderBackend, RenderError, RenderPipeline};
pub use schema::{ConfigError, DriftConfig, EngineConfig, FormationConfig};

//! Render module - raster backends and the layered frame pipeline.

mod backend;
mod canvas;
mod pipeline;
#[cfg(target_arch = "wasm32")]
mod web;

pub use backend::*;
pub use canvas::*;
pub use pipeline::*;
#[cfg(target_arch = "wasm32")]
pub use web::*;

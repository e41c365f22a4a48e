//! Schema module - Configuration and colour types for particle engines.

mod color;
mod config;

pub use color::*;
pub use config::*;

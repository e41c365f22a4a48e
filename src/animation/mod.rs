//! Offline export of rendered frames.
//!
//! Batch runs drive an [`Engine`](crate::compute::Engine) synchronously with a
//! [`ManualScheduler`](crate::compute::ManualScheduler) and encode every
//! presented frame as it is produced:
//!
//! - [`export_formation`]: the looping social-preview GIF, text assembling
//!   from a ring of particles.
//! - [`export_ambient`]: a GIF of the flow-field background.
//! - [`write_snapshot_png`]: a single still.
//!
//! Output is written to `<path>.partial` and only renamed into place once
//! complete, so an interrupted export never leaves a truncated file behind
//! under the requested name.

use std::io;
use std::path::PathBuf;

use crate::schema::ConfigError;

mod export;
mod recorder;

pub use export::{
    ExportOptions, ExportStats, export_ambient, export_formation, write_snapshot_png,
};
pub use recorder::{GifRecorder, RecorderConfig, RecorderStats};

/// Failures while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Frame is {actual} bytes, expected {expected} for {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Export to {} did not complete", .0.display())]
    Incomplete(PathBuf),
    #[error("Expected a {expected} configuration")]
    WrongMode { expected: &'static str },
    #[error("Engine produced no frame")]
    NoFrame,
}

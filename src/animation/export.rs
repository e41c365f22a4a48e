//! Batch export loops.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use image::{ImageFormat, RgbaImage};

use super::recorder::partial_path;
use super::{ExportError, GifRecorder, RecorderConfig};
use crate::compute::{Engine, ManualScheduler};
use crate::schema::{ConfigError, EngineConfig, ForceMode};

/// Surface and timing of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Logical surface width.
    pub width: u32,
    /// Logical surface height.
    pub height: u32,
    pub frames: usize,
    pub fps: f32,
    pub device_pixel_ratio: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        // 20 fps for 2.5 s, the size social cards are rendered at.
        Self {
            width: 1200,
            height: 630,
            frames: 50,
            fps: 20.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames == 0 {
            return Err(ConfigError::ZeroFrames);
        }
        if !(self.fps > 0.0) {
            return Err(ConfigError::NonPositive("fps"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::NonPositive("export size"));
        }
        if !(self.device_pixel_ratio > 0.0) {
            return Err(ConfigError::NonPositive("device_pixel_ratio"));
        }
        Ok(())
    }

    /// GIF frame delay.
    pub fn delay_ms(&self) -> u32 {
        (1000.0 / self.fps).round().max(1.0) as u32
    }
}

/// Summary of a finished export.
#[derive(Debug, Clone)]
pub struct ExportStats {
    pub frames: u64,
    pub bytes: u64,
    /// Output size in device pixels.
    pub width: u32,
    pub height: u32,
    pub particles: usize,
    /// Mean luma of the last frame.
    pub final_brightness: f32,
    pub elapsed: Duration,
}

impl fmt::Display for ExportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames at {}x{}, {} particles, {} bytes in {:.2?} (final brightness {:.4})",
            self.frames,
            self.width,
            self.height,
            self.particles,
            self.bytes,
            self.elapsed,
            self.final_brightness
        )
    }
}

/// Render the text-formation animation to a looping GIF.
///
/// The last `settle_frames` frames switch the trail fade to `settle_alpha`
/// so the loop restarts from a clean frame.
pub fn export_formation<P: AsRef<Path>>(
    config: &EngineConfig,
    options: &ExportOptions,
    path: P,
) -> Result<ExportStats, ExportError> {
    let formation = match &config.mode {
        ForceMode::Formation(formation) => formation,
        ForceMode::Ambient | ForceMode::Drift(_) => {
            return Err(ExportError::WrongMode {
                expected: "formation",
            });
        }
    };
    let settle = (formation.settle_frames, formation.settle_alpha);
    run_export(config, options, path.as_ref(), Some(settle))
}

/// Render a background (flow field or drifting dots) to a looping GIF.
pub fn export_ambient<P: AsRef<Path>>(
    config: &EngineConfig,
    options: &ExportOptions,
    path: P,
) -> Result<ExportStats, ExportError> {
    if config.is_formation() {
        return Err(ExportError::WrongMode { expected: "ambient" });
    }
    run_export(config, options, path.as_ref(), None)
}

fn run_export(
    config: &EngineConfig,
    options: &ExportOptions,
    path: &Path,
    settle: Option<(usize, f32)>,
) -> Result<ExportStats, ExportError> {
    options.validate()?;
    let start = Instant::now();

    let mut engine = Engine::new(config.clone(), ManualScheduler::new())?;
    engine.mount(options.width, options.height, options.device_pixel_ratio)?;
    let (width, height) = {
        let frame = engine.frame().ok_or(ExportError::NoFrame)?;
        (frame.width(), frame.height())
    };

    let mut recorder = GifRecorder::new(
        path,
        width,
        height,
        RecorderConfig {
            delay_ms: options.delay_ms(),
            ..Default::default()
        },
    )?;
    log::info!(
        "Exporting {} frames at {}x{} to {}",
        options.frames,
        width,
        height,
        path.display()
    );

    let settle_from = settle.map(|(frames, _)| options.frames.saturating_sub(frames));
    for frame in 0..options.frames {
        if let (Some(from), Some((_, alpha))) = (settle_from, settle) {
            if frame == from {
                engine.set_trail_alpha(alpha);
            }
        }
        engine.step();
        recorder.record_frame(engine.frame().ok_or(ExportError::NoFrame)?)?;

        if (frame + 1) % 10 == 0 {
            log::info!("Frame {}/{}", frame + 1, options.frames);
        }
    }

    let stats = engine.stats();
    let recorded = recorder.finalize()?;
    Ok(ExportStats {
        frames: recorded.frame_count,
        bytes: recorded.total_bytes,
        width,
        height,
        particles: stats.particle_count,
        final_brightness: stats.mean_brightness,
        elapsed: start.elapsed(),
    })
}

/// Write one still frame as PNG.
///
/// The engine renders its reduced-motion static frame, then advances
/// `warmup` further steps before the frame is captured.
pub fn write_snapshot_png<P: AsRef<Path>>(
    config: &EngineConfig,
    options: &ExportOptions,
    warmup: usize,
    path: P,
) -> Result<ExportStats, ExportError> {
    let path = path.as_ref();
    let start = Instant::now();

    let mut config = config.clone();
    config.reduced_motion = true;
    let mut engine = Engine::new(config, ManualScheduler::new())?;
    engine.mount(options.width, options.height, options.device_pixel_ratio)?;
    for _ in 0..warmup {
        engine.step();
    }

    let frame = engine.frame().ok_or(ExportError::NoFrame)?;
    let (width, height) = (frame.width(), frame.height());
    let rgba = frame.to_rgba8();
    let actual = rgba.len();
    let image = RgbaImage::from_raw(width, height, rgba).ok_or(ExportError::FrameSize {
        width,
        height,
        expected: (width * height * 4) as usize,
        actual,
    })?;

    let partial = partial_path(path);
    if let Err(e) = image.save_with_format(&partial, ImageFormat::Png) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    fs::rename(&partial, path)?;
    log::info!("Wrote {}x{} snapshot to {}", width, height, path.display());

    let stats = engine.stats();
    Ok(ExportStats {
        frames: 1,
        bytes: fs::metadata(path)?.len(),
        width,
        height,
        particles: stats.particle_count,
        final_brightness: stats.mean_brightness,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_options(frames: usize) -> ExportOptions {
        ExportOptions {
            width: 160,
            height: 80,
            frames,
            ..Default::default()
        }
    }

    fn small_formation() -> EngineConfig {
        EngineConfig {
            seed: Some(7),
            ..EngineConfig::formation("HI", 40.0)
        }
    }

    #[test]
    fn test_options_defaults() {
        let options = ExportOptions::default();
        assert_eq!((options.width, options.height), (1200, 630));
        assert_eq!(options.frames, 50);
        assert_eq!(options.delay_ms(), 50);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_reject_zero_frames() {
        assert!(matches!(
            small_options(0).validate(),
            Err(ConfigError::ZeroFrames)
        ));
    }

    #[test]
    fn test_export_formation_gif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("og.gif");

        let stats = export_formation(&small_formation(), &small_options(6), &path).unwrap();
        assert_eq!(stats.frames, 6);
        assert_eq!((stats.width, stats.height), (160, 80));
        assert!(stats.particles > 0);
        assert!(stats.bytes > 0);

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(*bytes.last().unwrap(), 0x3B);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_export_ambient_gif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ambient.gif");
        let config = EngineConfig {
            particle_count: 40,
            seed: Some(3),
            ..EngineConfig::default()
        };

        let stats = export_ambient(&config, &small_options(4), &path).unwrap();
        assert_eq!(stats.frames, 4);
        assert!(path.exists());
    }

    #[test]
    fn test_export_drift_gif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drift.gif");
        let config = EngineConfig {
            seed: Some(5),
            ..EngineConfig::drift()
        };

        let stats = export_ambient(&config, &small_options(3), &path).unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.particles, 50);
        assert!(stats.final_brightness > 0.0);
    }

    #[test]
    fn test_export_mode_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wrong.gif");
        assert!(matches!(
            export_formation(&EngineConfig::default(), &small_options(2), &path),
            Err(ExportError::WrongMode { .. })
        ));
        assert!(matches!(
            export_ambient(&small_formation(), &small_options(2), &path),
            Err(ExportError::WrongMode { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_config_creates_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gif");
        let config = EngineConfig {
            particle_count: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            export_ambient(&config, &small_options(2), &path),
            Err(ExportError::Config(ConfigError::InvalidParticleCount))
        ));
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_snapshot_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("still.png");
        let config = EngineConfig {
            particle_count: 40,
            seed: Some(11),
            ..EngineConfig::default()
        };
        let options = ExportOptions {
            device_pixel_ratio: 2.0,
            ..small_options(1)
        };

        let stats = write_snapshot_png(&config, &options, 3, &path).unwrap();
        assert_eq!((stats.width, stats.height), (320, 160));

        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (320, 160));
    }
}

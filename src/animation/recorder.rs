//! GIF recorder for capturing rendered frames.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use super::ExportError;
use crate::render::Canvas;

/// Last byte of every complete GIF stream.
const GIF_TRAILER: u8 = 0x3B;

/// Configuration for GIF recording.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Per-frame delay in milliseconds.
    pub delay_ms: u32,
    /// Quantiser speed, 1 (best) to 30 (fastest).
    pub speed: i32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            delay_ms: 50,
            speed: 10,
        }
    }
}

/// Looping GIF writer.
///
/// Frames go to `<path>.partial`; [`finalize`](Self::finalize) closes the
/// stream, checks the trailer and renames into place. A recorder dropped
/// without finalizing removes its partial file.
///
/// ```ignore
/// let mut recorder = GifRecorder::new("og.gif", 1200, 630, RecorderConfig::default())?;
/// for _ in 0..50 {
///     engine.step();
///     recorder.record_frame(engine.frame().unwrap())?;
/// }
/// recorder.finalize()?;
/// ```
pub struct GifRecorder {
    encoder: Option<GifEncoder<BufWriter<File>>>,
    path: PathBuf,
    partial: PathBuf,
    width: u32,
    height: u32,
    config: RecorderConfig,
    frames_written: u64,
}

impl GifRecorder {
    /// Create a recorder for `width × height` device-pixel frames.
    pub fn new<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        config: RecorderConfig,
    ) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        let partial = partial_path(&path);
        let file = File::create(&partial)?;
        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), config.speed.clamp(1, 30));
        encoder.set_repeat(Repeat::Infinite)?;
        log::debug!("Recording {}x{} GIF to {}", width, height, partial.display());

        Ok(Self {
            encoder: Some(encoder),
            path,
            partial,
            width,
            height,
            config,
            frames_written: 0,
        })
    }

    /// Encode a frame. Frames are written in call order.
    pub fn record_frame(&mut self, frame: &Canvas) -> Result<(), ExportError> {
        self.record_rgba(frame.to_rgba8())
    }

    /// Encode a packed RGBA8 frame.
    pub fn record_rgba(&mut self, rgba: Vec<u8>) -> Result<(), ExportError> {
        let expected = (self.width * self.height * 4) as usize;
        let actual = rgba.len();
        let image = RgbaImage::from_raw(self.width, self.height, rgba).ok_or(
            ExportError::FrameSize {
                width: self.width,
                height: self.height,
                expected,
                actual,
            },
        )?;

        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| ExportError::Incomplete(self.path.clone()))?;
        let delay = Delay::from_numer_denom_ms(self.config.delay_ms, 1);
        encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the stream, verify it and move it into place.
    pub fn finalize(mut self) -> Result<RecorderStats, ExportError> {
        // Dropping the encoder writes the trailer and flushes the buffer.
        drop(self.encoder.take());

        if self.frames_written == 0 || !has_trailer(&self.partial)? {
            return Err(ExportError::Incomplete(self.path.clone()));
        }
        fs::rename(&self.partial, &self.path)?;
        let total_bytes = fs::metadata(&self.path)?.len();

        Ok(RecorderStats {
            frame_count: self.frames_written,
            total_bytes,
            delay_ms: self.config.delay_ms,
        })
    }

    /// Get number of frames recorded so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for GifRecorder {
    fn drop(&mut self) {
        if self.encoder.take().is_some() || self.partial.exists() {
            let _ = fs::remove_file(&self.partial);
        }
    }
}

/// `<path>.partial`
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn has_trailer(path: &Path) -> Result<bool, ExportError> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == GIF_TRAILER)
}

/// Statistics from a recording session.
#[derive(Debug, Clone)]
pub struct RecorderStats {
    /// Total frames recorded.
    pub frame_count: u64,
    /// Final file size in bytes.
    pub total_bytes: u64,
    /// Per-frame delay.
    pub delay_ms: u32,
}

impl std::fmt::Display for RecorderStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} ms/frame",
            self.frame_count, self.total_bytes, self.delay_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Rgb;
    use tempfile::tempdir;

    fn test_frame(shade: u8) -> Canvas {
        let mut canvas = Canvas::new(16, 8, 1.0);
        canvas.clear(Rgb::from_u8(shade, 11, 12));
        canvas.fill_square(4.0, 2.0, 4.0, Rgb::from_u8(212, 175, 55), 1.0);
        canvas
    }

    #[test]
    fn test_recorder_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.gif");

        let mut recorder = GifRecorder::new(&path, 16, 8, RecorderConfig::default()).unwrap();
        for i in 0..10 {
            recorder.record_frame(&test_frame(i * 20)).unwrap();
        }
        let stats = recorder.finalize().unwrap();
        assert_eq!(stats.frame_count, 10);
        assert!(stats.total_bytes > 0);

        assert!(path.exists());
        assert!(!partial_path(&path).exists());
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(*bytes.last().unwrap(), GIF_TRAILER);
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("size.gif");
        let mut recorder = GifRecorder::new(&path, 32, 8, RecorderConfig::default()).unwrap();
        assert!(matches!(
            recorder.record_frame(&test_frame(0)),
            Err(ExportError::FrameSize { .. })
        ));
    }

    #[test]
    fn test_abandoned_recording_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abandoned.gif");
        {
            let mut recorder =
                GifRecorder::new(&path, 16, 8, RecorderConfig::default()).unwrap();
            recorder.record_frame(&test_frame(0)).unwrap();
            assert!(partial_path(&path).exists());
        }
        assert!(!partial_path(&path).exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_recording_is_incomplete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.gif");
        let recorder = GifRecorder::new(&path, 16, 8, RecorderConfig::default()).unwrap();
        assert!(matches!(recorder.finalize(), Err(ExportError::Incomplete(_))));
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }
}

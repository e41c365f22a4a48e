//! Text rasterisation into a spawn target pool.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::render::Canvas;
use crate::schema::{ConfigError, FormationConfig, Rgb};

use super::SpawnTarget;
use super::font::{GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, glyph, is_lit};

/// Red channel above which a sampled pixel counts as lit.
const LIT_THRESHOLD: f32 = 0.5;

/// Rasterises text with the bitmap font and samples lit pixels.
#[derive(Debug, Clone)]
pub struct SpawnSampler {
    font_size: f32,
    pixel_step: usize,
    shuffle: bool,
    color: Rgb,
}

impl SpawnSampler {
    pub fn new(config: &FormationConfig) -> Result<Self, ConfigError> {
        if config.pixel_step == 0 {
            return Err(ConfigError::InvalidPixelStep);
        }
        Ok(Self {
            font_size: config.font_size,
            pixel_step: config.pixel_step,
            shuffle: config.shuffle,
            color: config.target_color()?,
        })
    }

    /// Size of one font cell in logical pixels.
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.font_size / GLYPH_HEIGHT as f32
    }

    /// Logical `(width, height)` of `text` when rendered.
    pub fn text_extent(&self, text: &str) -> (f32, f32) {
        let chars = text.chars().count();
        if chars == 0 {
            return (0.0, 0.0);
        }
        let columns = chars * GLYPH_ADVANCE - 1;
        (columns as f32 * self.cell_size(), self.font_size)
    }

    /// Draw `text` in white, centred on a `width × height` surface.
    pub fn rasterize(&self, text: &str, width: u32, height: u32) -> Canvas {
        let mut canvas = Canvas::new(width, height, 1.0);
        let cell = self.cell_size();
        let (text_width, text_height) = self.text_extent(text);
        let left = (width as f32 - text_width) * 0.5;
        let top = (height as f32 - text_height) * 0.5;

        for (index, c) in text.chars().enumerate() {
            let Some(g) = glyph(c) else {
                continue;
            };
            let origin_x = left + (index * GLYPH_ADVANCE) as f32 * cell;
            for row in 0..GLYPH_HEIGHT {
                for col in 0..GLYPH_WIDTH {
                    if is_lit(g, col, row) {
                        canvas.fill_square(
                            origin_x + col as f32 * cell,
                            top + row as f32 * cell,
                            cell,
                            Rgb::WHITE,
                            1.0,
                        );
                    }
                }
            }
        }
        canvas
    }

    /// Sample lit pixels every `pixel_step` pixels on both axes.
    ///
    /// The pool is shuffled when configured so that slot order does not
    /// follow scan order.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        text: &str,
        width: u32,
        height: u32,
        rng: &mut R,
    ) -> Result<Vec<SpawnTarget>, ConfigError> {
        let canvas = self.rasterize(text, width, height);
        let mut targets = Vec::new();
        for y in (0..canvas.height()).step_by(self.pixel_step) {
            for x in (0..canvas.width()).step_by(self.pixel_step) {
                if canvas.pixel(x, y)[0] > LIT_THRESHOLD {
                    targets.push(SpawnTarget {
                        x: x as f32,
                        y: y as f32,
                        color: self.color,
                    });
                }
            }
        }

        if targets.is_empty() {
            return Err(ConfigError::NoTargets {
                text: text.to_string(),
                width,
                height,
            });
        }
        if self.shuffle {
            targets.shuffle(rng);
        }
        log::debug!(
            "Sampled {} targets from {:?} at {}x{}",
            targets.len(),
            text,
            width,
            height
        );
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sampler(font_size: f32, pixel_step: usize, shuffle: bool) -> SpawnSampler {
        SpawnSampler::new(&FormationConfig {
            font_size,
            pixel_step,
            shuffle,
            ..FormationConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_extent() {
        let s = sampler(70.0, 4, false);
        assert_eq!(s.text_extent(""), (0.0, 0.0));
        let (w, h) = s.text_extent("AB");
        assert!((w - 110.0).abs() < 1e-4);
        assert_eq!(h, 70.0);
    }

    #[test]
    fn test_targets_lie_inside_text_box() {
        let s = sampler(70.0, 2, false);
        let mut rng = StdRng::seed_from_u64(0);
        let targets = s.sample("HI", 400, 200, &mut rng).unwrap();
        assert!(!targets.is_empty());

        let (w, h) = s.text_extent("HI");
        let (left, top) = ((400.0 - w) / 2.0, (200.0 - h) / 2.0);
        for t in &targets {
            assert!(t.x >= left - 1.0 && t.x <= left + w + 1.0);
            assert!(t.y >= top - 1.0 && t.y <= top + h + 1.0);
            assert_eq!(t.x as u32 % 2, 0);
            assert_eq!(t.y as u32 % 2, 0);
        }
    }

    #[test]
    fn test_default_brand_text_samples() {
        let config = FormationConfig::default();
        let s = SpawnSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let targets = s.sample(&config.text, 1200, 630, &mut rng).unwrap();
        assert!(targets.len() > 500, "only {} targets", targets.len());
        let gold = config.target_color().unwrap();
        assert!(targets.iter().all(|t| t.color == gold));
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let s = sampler(70.0, 4, true);
        let a = s.sample("OK", 300, 100, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = s.sample("OK", 300, 100, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);

        let ordered = sampler(70.0, 4, false)
            .sample("OK", 300, 100, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(a.len(), ordered.len());
        assert_ne!(a, ordered);
    }

    #[test]
    fn test_blank_text_is_an_error() {
        let s = sampler(70.0, 4, false);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            s.sample("€€", 300, 100, &mut rng),
            Err(ConfigError::NoTargets { .. })
        ));
        assert!(matches!(
            s.sample("A", 0, 0, &mut rng),
            Err(ConfigError::NoTargets { .. })
        ));
    }
}

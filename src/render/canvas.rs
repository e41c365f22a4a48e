//! CPU raster surface.
//!
//! A float RGB framebuffer in device pixels. Drawing calls take logical
//! coordinates and are scaled by the device pixel ratio, mirroring a 2-D
//! canvas context with `ctx.scale(dpr, dpr)` applied.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::schema::Rgb;

/// Float RGB framebuffer.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: Vec<[f32; 3]>,
    /// Scratch buffer for separable passes.
    scratch: Vec<[f32; 3]>,
    width: u32,
    height: u32,
    scale: f32,
}

impl Canvas {
    /// Create a black canvas for a `logical_width × logical_height` viewport.
    pub fn new(logical_width: u32, logical_height: u32, scale: f32) -> Self {
        let width = device_extent(logical_width, scale);
        let height = device_extent(logical_height, scale);
        Self {
            pixels: vec![[0.0; 3]; (width * height) as usize],
            scratch: Vec::new(),
            width,
            height,
            scale,
        }
    }

    /// Device pixel width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Device pixel height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Device pixels per logical pixel.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn pixels(&self) -> &[[f32; 3]] {
        &self.pixels
    }

    /// Pixel at device coordinates.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn clear(&mut self, color: Rgb) {
        self.pixels.fill([color.r, color.g, color.b]);
    }

    /// Fill the whole surface with `color` at `alpha` (source-over).
    pub fn fade(&mut self, color: Rgb, alpha: f32) {
        let keep = 1.0 - alpha;
        let add = [color.r * alpha, color.g * alpha, color.b * alpha];
        for p in &mut self.pixels {
            for c in 0..3 {
                p[c] = p[c] * keep + add[c];
            }
        }
    }

    /// Stroke a round-capped, anti-aliased line between two logical points.
    ///
    /// Zero-length segments draw nothing, like a 2-D canvas stroke.
    pub fn stroke_segment(
        &mut self,
        (x0, y0): (f32, f32),
        (x1, y1): (f32, f32),
        line_width: f32,
        color: Rgb,
        alpha: f32,
    ) {
        if alpha <= 0.0 || line_width <= 0.0 {
            return;
        }
        let s = self.scale;
        let (ax, ay, bx, by) = (x0 * s, y0 * s, x1 * s, y1 * s);
        let (dx, dy) = (bx - ax, by - ay);
        let len_sq = dx * dx + dy * dy;
        let finite = [ax, ay, bx, by].iter().all(|v| v.is_finite());
        if !finite || !(len_sq > 0.0) {
            return;
        }

        let half = line_width * s * 0.5;
        let Some((px0, py0, px1, py1)) = self.clip_box(
            ax.min(bx) - half - 1.0,
            ay.min(by) - half - 1.0,
            ax.max(bx) + half + 1.0,
            ay.max(by) + half + 1.0,
        ) else {
            return;
        };

        for py in py0..py1 {
            for px in px0..px1 {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;
                let t = (((cx - ax) * dx + (cy - ay) * dy) / len_sq).clamp(0.0, 1.0);
                let ex = cx - (ax + t * dx);
                let ey = cy - (ay + t * dy);
                let dist = (ex * ex + ey * ey).sqrt();
                let coverage = (half - dist + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, color, alpha * coverage);
                }
            }
        }
    }

    /// Fill an axis-aligned square with its top-left corner at a logical point.
    pub fn fill_square(&mut self, x: f32, y: f32, size: f32, color: Rgb, alpha: f32) {
        if alpha <= 0.0 || size <= 0.0 || !(x.is_finite() && y.is_finite()) {
            return;
        }
        let s = self.scale;
        let (left, top, right, bottom) = (x * s, y * s, (x + size) * s, (y + size) * s);
        let Some((px0, py0, px1, py1)) = self.clip_box(left, top, right, bottom) else {
            return;
        };

        for py in py0..py1 {
            let cover_y = overlap(py as f32, top, bottom);
            for px in px0..px1 {
                let coverage = cover_y * overlap(px as f32, left, right);
                if coverage > 0.0 {
                    self.blend(px, py, color, alpha * coverage);
                }
            }
        }
    }

    /// Fill an anti-aliased disc centred on a logical point.
    pub fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32) {
        if alpha <= 0.0 || radius <= 0.0 || !(x.is_finite() && y.is_finite()) {
            return;
        }
        let s = self.scale;
        let (cx, cy, r) = (x * s, y * s, radius * s);
        let Some((px0, py0, px1, py1)) =
            self.clip_box(cx - r - 1.0, cy - r - 1.0, cx + r + 1.0, cy + r + 1.0)
        else {
            return;
        };

        for py in py0..py1 {
            let dy = py as f32 + 0.5 - cy;
            for px in px0..px1 {
                let dx = px as f32 + 0.5 - cx;
                let coverage = (r - (dx * dx + dy * dy).sqrt() + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, color, alpha * coverage);
                }
            }
        }
    }

    /// Gaussian blur with standard deviation `radius` logical pixels.
    ///
    /// Approximated by three box passes per axis, so the cost per pixel does
    /// not grow with the radius.
    pub fn gaussian_blur(&mut self, radius: f32) {
        let sigma = radius * self.scale;
        if !(sigma > 0.0) || self.pixels.is_empty() {
            return;
        }
        let width = self.width as usize;
        let height = self.height as usize;

        self.scratch.resize(self.pixels.len(), [0.0; 3]);
        for size in box_sizes(sigma) {
            let r = size / 2;
            box_horizontal(&self.pixels, &mut self.scratch, width, r);
            box_vertical(&self.scratch, &mut self.pixels, width, height, r);
        }
    }

    /// Multiply every channel by `factor`, clamped to `[0, 1]`.
    pub fn scale_brightness(&mut self, factor: f32) {
        for p in &mut self.pixels {
            for c in p.iter_mut() {
                *c = (*c * factor).clamp(0.0, 1.0);
            }
        }
    }

    /// Additive ("lighter") composite of `other` at `alpha`, clamped.
    ///
    /// Both canvases must share dimensions; mismatched sources are ignored.
    pub fn composite_lighter(&mut self, other: &Canvas, alpha: f32) {
        if alpha <= 0.0 || other.pixels.len() != self.pixels.len() {
            return;
        }
        for (dst, src) in self.pixels.iter_mut().zip(&other.pixels) {
            for c in 0..3 {
                dst[c] = (dst[c] + src[c] * alpha).min(1.0);
            }
        }
    }

    /// Additive composite of this canvas onto itself.
    pub fn composite_self_lighter(&mut self, alpha: f32) {
        if alpha <= 0.0 {
            return;
        }
        let gain = 1.0 + alpha;
        for p in &mut self.pixels {
            for c in p.iter_mut() {
                *c = (*c * gain).min(1.0);
            }
        }
    }

    /// Copy pixels from a canvas of the same dimensions.
    pub fn copy_from(&mut self, other: &Canvas) {
        if other.pixels.len() == self.pixels.len() {
            self.pixels.copy_from_slice(&other.pixels);
        }
    }

    /// Mean luma over all pixels.
    pub fn mean_brightness(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .pixels
            .iter()
            .map(|p| Rgb::new(p[0], p[1], p[2]).luma() as f64)
            .sum();
        (sum / self.pixels.len() as f64) as f32
    }

    /// Convert to packed RGBA8 (opaque).
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        self.write_rgba8(&mut out);
        out
    }

    /// Append packed RGBA8 to `out`.
    pub fn write_rgba8(&self, out: &mut Vec<u8>) {
        for p in &self.pixels {
            out.extend_from_slice(&[to_u8(p[0]), to_u8(p[1]), to_u8(p[2]), 255]);
        }
    }

    /// Device-pixel bounds of a box, clipped to the surface. `None` if empty.
    fn clip_box(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<(u32, u32, u32, u32)> {
        let w = self.width as f32;
        let h = self.height as f32;
        let px0 = x0.floor().clamp(0.0, w) as u32;
        let py0 = y0.floor().clamp(0.0, h) as u32;
        let px1 = x1.ceil().clamp(0.0, w) as u32;
        let py1 = y1.ceil().clamp(0.0, h) as u32;
        (px0 < px1 && py0 < py1).then_some((px0, py0, px1, py1))
    }

    #[inline]
    fn blend(&mut self, x: u32, y: u32, color: Rgb, alpha: f32) {
        let a = alpha.clamp(0.0, 1.0);
        let p = &mut self.pixels[(y * self.width + x) as usize];
        p[0] += (color.r - p[0]) * a;
        p[1] += (color.g - p[1]) * a;
        p[2] += (color.b - p[2]) * a;
    }
}

#[inline]
pub(crate) fn device_extent(logical: u32, scale: f32) -> u32 {
    (logical as f32 * scale).round().max(0.0) as u32
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Length of `[p, p + 1)` covered by `[lo, hi)`.
#[inline]
fn overlap(p: f32, lo: f32, hi: f32) -> f32 {
    ((p + 1.0).min(hi) - p.max(lo)).max(0.0)
}

/// Odd box widths whose three successive passes approximate a gaussian of
/// standard deviation `sigma`.
fn box_sizes(sigma: f32) -> [usize; 3] {
    const PASSES: f32 = 3.0;
    let ideal = (12.0 * sigma * sigma / PASSES + 1.0).sqrt();
    let mut lower = ideal.floor() as i64;
    if lower % 2 == 0 {
        lower -= 1;
    }
    let lower = lower.max(1);
    let upper = lower + 2;
    let wl = lower as f32;
    let m = ((12.0 * sigma * sigma - PASSES * wl * wl - 4.0 * PASSES * wl - 3.0 * PASSES)
        / (-4.0 * wl - 4.0))
        .round() as i64;
    let mut sizes = [0usize; 3];
    for (i, size) in sizes.iter_mut().enumerate() {
        *size = if (i as i64) < m { lower } else { upper } as usize;
    }
    sizes
}

/// Running-sum box filter of radius `r` along one row, edges clamped.
fn box_row(src: &[[f32; 3]], dst: &mut [[f32; 3]], r: usize) {
    if src.is_empty() {
        return;
    }
    let last = src.len() as isize - 1;
    let at = |i: isize| src[i.clamp(0, last) as usize];
    let inv = 1.0 / (2 * r + 1) as f32;
    let r = r as isize;

    let mut acc = [0.0f32; 3];
    for k in -r..=r {
        let p = at(k);
        acc[0] += p[0];
        acc[1] += p[1];
        acc[2] += p[2];
    }
    for (x, out) in dst.iter_mut().enumerate() {
        *out = [acc[0] * inv, acc[1] * inv, acc[2] * inv];
        let x = x as isize;
        let (add, sub) = (at(x + r + 1), at(x - r));
        acc[0] += add[0] - sub[0];
        acc[1] += add[1] - sub[1];
        acc[2] += add[2] - sub[2];
    }
}

fn box_horizontal(src: &[[f32; 3]], dst: &mut [[f32; 3]], width: usize, r: usize) {
    #[cfg(not(target_arch = "wasm32"))]
    dst.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(out, row)| box_row(row, out, r));

    #[cfg(target_arch = "wasm32")]
    for (out, row) in dst.chunks_mut(width).zip(src.chunks(width)) {
        box_row(row, out, r);
    }
}

/// Column pass as a running sum over whole rows.
fn box_vertical(src: &[[f32; 3]], dst: &mut [[f32; 3]], width: usize, height: usize, r: usize) {
    if width == 0 || height == 0 {
        return;
    }
    let last = height as isize - 1;
    let row = |y: isize| {
        let y = y.clamp(0, last) as usize;
        &src[y * width..(y + 1) * width]
    };
    let inv = 1.0 / (2 * r + 1) as f32;
    let r = r as isize;

    let mut acc = vec![[0.0f32; 3]; width];
    for k in -r..=r {
        for (a, p) in acc.iter_mut().zip(row(k)) {
            a[0] += p[0];
            a[1] += p[1];
            a[2] += p[2];
        }
    }
    for (y, out) in dst.chunks_mut(width).enumerate() {
        for (o, a) in out.iter_mut().zip(&acc) {
            *o = [a[0] * inv, a[1] * inv, a[2] * inv];
        }
        let y = y as isize;
        for ((a, add), sub) in acc.iter_mut().zip(row(y + r + 1)).zip(row(y - r)) {
            a[0] += add[0] - sub[0];
            a[1] += add[1] - sub[1];
            a[2] += add[2] - sub[2];
        }
    }
}

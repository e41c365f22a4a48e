//! Canvas 2D backend for the browser build.
//!
//! Particles are drawn onto an offscreen trail canvas in logical
//! coordinates. Compose copies it to the visible canvas and lets the
//! browser do the glow with a CSS `blur() brightness()` filter under the
//! "lighter" composite, so no pixels cross into wasm memory.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::schema::Rgb;

use super::{Glow, RenderBackend, RenderError};

const TAU: f64 = std::f64::consts::PI * 2.0;

pub struct WebBackend {
    canvas: HtmlCanvasElement,
    visible: CanvasRenderingContext2d,
    trail_canvas: HtmlCanvasElement,
    trail: CanvasRenderingContext2d,
    width: f64,
    height: f64,
    scale: f64,
}

impl WebBackend {
    /// Bind to `canvas` and allocate the offscreen trail layer.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("No document"))?;
        let trail_canvas = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()?;
        let visible = context_2d(&canvas)?;
        let trail = context_2d(&trail_canvas)?;
        Ok(Self {
            canvas,
            visible,
            trail_canvas,
            trail,
            width: 0.0,
            height: 0.0,
            scale: 1.0,
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl RenderBackend for WebBackend {
    fn resize(
        &mut self,
        logical_width: u32,
        logical_height: u32,
        scale: f32,
    ) -> Result<(), RenderError> {
        let device_width = (logical_width as f32 * scale).round().max(1.0) as u32;
        let device_height = (logical_height as f32 * scale).round().max(1.0) as u32;
        for canvas in [&self.canvas, &self.trail_canvas] {
            canvas.set_width(device_width);
            canvas.set_height(device_height);
        }

        let style = self.canvas.style();
        style
            .set_property("width", &format!("{logical_width}px"))
            .map_err(lost)?;
        style
            .set_property("height", &format!("{logical_height}px"))
            .map_err(lost)?;

        // Resizing resets context state, including the transform.
        let s = scale as f64;
        self.trail.set_transform(s, 0.0, 0.0, s, 0.0, 0.0).map_err(lost)?;
        self.trail.set_line_cap("round");

        self.width = logical_width as f64;
        self.height = logical_height as f64;
        self.scale = s;
        Ok(())
    }

    fn clear(&mut self, color: Rgb) {
        let css = color.to_css();
        self.trail.set_global_alpha(1.0);
        self.trail.set_fill_style_str(&css);
        self.trail.fill_rect(0.0, 0.0, self.width, self.height);
        self.visible.set_global_alpha(1.0);
        self.visible.set_fill_style_str(&css);
        self.visible.fill_rect(
            0.0,
            0.0,
            self.canvas.width() as f64,
            self.canvas.height() as f64,
        );
    }

    fn fade(&mut self, color: Rgb, alpha: f32) {
        self.trail.set_global_alpha(alpha as f64);
        self.trail.set_fill_style_str(&color.to_css());
        self.trail.fill_rect(0.0, 0.0, self.width, self.height);
    }

    fn stroke_segment(
        &mut self,
        from: (f32, f32),
        to: (f32, f32),
        line_width: f32,
        color: Rgb,
        alpha: f32,
    ) {
        if alpha <= 0.0 || line_width <= 0.0 {
            return;
        }
        let ctx = &self.trail;
        ctx.set_global_alpha(alpha as f64);
        ctx.set_stroke_style_str(&color.to_css());
        ctx.set_line_width(line_width as f64);
        ctx.begin_path();
        ctx.move_to(from.0 as f64, from.1 as f64);
        ctx.line_to(to.0 as f64, to.1 as f64);
        ctx.stroke();
    }

    fn fill_square(&mut self, x: f32, y: f32, size: f32, color: Rgb, alpha: f32) {
        if alpha <= 0.0 || size <= 0.0 {
            return;
        }
        self.trail.set_global_alpha(alpha as f64);
        self.trail.set_fill_style_str(&color.to_css());
        self.trail
            .fill_rect(x as f64, y as f64, size as f64, size as f64);
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgb, alpha: f32) {
        if alpha <= 0.0 || radius <= 0.0 {
            return;
        }
        let ctx = &self.trail;
        ctx.set_global_alpha(alpha as f64);
        ctx.set_fill_style_str(&color.to_css());
        ctx.begin_path();
        if ctx
            .arc(x as f64, y as f64, radius as f64, 0.0, TAU)
            .is_ok()
        {
            ctx.fill();
        }
    }

    fn compose(&mut self, glow: Option<Glow>, present_alpha: f32) -> Result<(), RenderError> {
        let ctx = &self.visible;
        ctx.set_global_alpha(1.0);
        ctx.set_global_composite_operation("copy").map_err(lost)?;
        ctx.draw_image_with_html_canvas_element(&self.trail_canvas, 0.0, 0.0)
            .map_err(lost)?;

        ctx.set_global_composite_operation("lighter").map_err(lost)?;
        if let Some(glow) = glow {
            ctx.set_filter(&format!(
                "blur({}px) brightness({}%)",
                glow.blur as f64 * self.scale,
                glow.brightness * 100.0
            ));
            ctx.set_global_alpha(glow.alpha as f64);
            let drawn = ctx.draw_image_with_html_canvas_element(&self.trail_canvas, 0.0, 0.0);
            ctx.set_filter("none");
            drawn.map_err(lost)?;
        }
        if present_alpha > 0.0 {
            ctx.set_global_alpha(present_alpha as f64);
            ctx.draw_image_with_html_canvas_element(&self.canvas, 0.0, 0.0)
                .map_err(lost)?;
        }

        ctx.set_global_alpha(1.0);
        ctx.set_global_composite_operation("source-over")
            .map_err(lost)?;
        Ok(())
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(JsValue::from)
}

fn lost(e: JsValue) -> RenderError {
    RenderError::ContextLost(format!("{e:?}"))
}

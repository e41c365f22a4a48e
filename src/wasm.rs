//! WebAssembly bindings for Vortex Particles.
//!
//! [`WasmVortex`] mounts an [`Engine`] on a `<canvas>` element and drives it
//! from `requestAnimationFrame`. Frames are drawn straight into the canvas
//! through [`WebBackend`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Event, EventTarget, HtmlCanvasElement, IntersectionObserver, IntersectionObserverEntry,
    MouseEvent, TouchEvent, Window,
};

use crate::compute::{Engine, EngineState, FrameScheduler};
use crate::render::WebBackend;
use crate::schema::{EngineConfig, ForceMode, Rgb};

/// Viewports narrower than this use the mobile profile.
const MOBILE_BREAKPOINT: f64 = 768.0;

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    // Initialize WASM logger
    wasm_logger::init(wasm_logger::Config::default());
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// `requestAnimationFrame` scheduler. The callback slot is filled once the
/// owning host exists.
struct RafScheduler {
    window: Window,
    callback: FrameCallback,
}

impl FrameScheduler for RafScheduler {
    type Handle = i32;

    fn request_frame(&mut self) -> i32 {
        let callback = self.callback.borrow();
        let Some(callback) = callback.as_ref() else {
            return 0;
        };
        self.window
            .request_animation_frame(callback.as_ref().unchecked_ref())
            .unwrap_or_else(|e| {
                log::warn!("requestAnimationFrame failed: {:?}", e);
                0
            })
    }

    fn cancel_frame(&mut self, handle: i32) {
        if let Err(e) = self.window.cancel_animation_frame(handle) {
            log::warn!("cancelAnimationFrame failed: {:?}", e);
        }
    }
}

struct Host {
    engine: Engine<RafScheduler, WebBackend>,
    canvas: HtmlCanvasElement,
    /// Mobile profile forced by the caller's config, independent of width.
    requested_mobile: bool,
}

impl Host {
    /// Pointer position relative to the canvas.
    fn pointer_at(&mut self, client_x: i32, client_y: i32) {
        let rect = self.canvas.get_bounding_client_rect();
        self.engine.set_pointer(
            (client_x as f64 - rect.left()) as f32,
            (client_y as f64 - rect.top()) as f32,
        );
    }

    /// Re-read the surface size, pixel ratio and device profile.
    fn resize(&mut self, window: &Window) {
        let (width, height) = surface_size(window, &self.canvas);
        let dpr = window.device_pixel_ratio() as f32;
        self.engine
            .set_mobile(self.requested_mobile || is_narrow(window));
        if let Err(e) = self.engine.resize(width, height, dpr) {
            log::warn!("Resize failed: {}", e);
        }
    }
}

struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

/// Serializable engine statistics.
#[derive(Serialize)]
struct StatsSnapshot {
    state: &'static str,
    tick: u64,
    renders: u64,
    particle_count: usize,
    mean_age_ratio: f32,
    mean_brightness: f32,
    recycled_total: u64,
}

/// Particle background bound to a canvas element.
#[wasm_bindgen]
pub struct WasmVortex {
    host: Rc<RefCell<Host>>,
    frame_callback: FrameCallback,
    listeners: Vec<Listener>,
    observer: Option<IntersectionObserver>,
    observer_callback: Option<Closure<dyn FnMut(js_sys::Array)>>,
}

#[wasm_bindgen]
impl WasmVortex {
    /// Create and mount an engine on `canvas`.
    ///
    /// `config` may be undefined (defaults), a JSON string, or a plain object
    /// with `EngineConfig` fields.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, config: JsValue) -> Result<WasmVortex, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let mut config = parse_config(config)?;
        if media_matches(&window, "(prefers-reduced-motion: reduce)") {
            config.reduced_motion = true;
        }
        let requested_mobile = config.mobile;
        config.mobile = requested_mobile || is_narrow(&window);

        let backend = WebBackend::new(canvas.clone())?;
        let frame_callback: FrameCallback = Rc::new(RefCell::new(None));
        let scheduler = RafScheduler {
            window: window.clone(),
            callback: frame_callback.clone(),
        };
        let engine = Engine::with_backend(config, scheduler, backend)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))?;
        let host = Rc::new(RefCell::new(Host {
            engine,
            canvas: canvas.clone(),
            requested_mobile,
        }));

        let weak = Rc::downgrade(&host);
        *frame_callback.borrow_mut() = Some(Closure::new(move |_timestamp: f64| {
            with_host(&weak, |host| {
                host.engine.on_frame();
            });
        }));

        let mut vortex = WasmVortex {
            host,
            frame_callback,
            listeners: Vec::new(),
            observer: None,
            observer_callback: None,
        };
        let resize_window = window.clone();
        vortex.listen(&window, "resize", move |host, _| host.resize(&resize_window))?;
        vortex.listen(&window, "mousemove", |host, event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                host.pointer_at(event.client_x(), event.client_y());
            }
        })?;
        vortex.listen(&window, "mouseleave", |host, _| host.engine.clear_pointer())?;
        vortex.listen(&window, "touchmove", |host, event| {
            if let Some(touch) = event
                .dyn_ref::<TouchEvent>()
                .and_then(|event| event.touches().get(0))
            {
                host.pointer_at(touch.client_x(), touch.client_y());
            }
        })?;
        vortex.listen(&window, "touchend", |host, _| host.engine.clear_pointer())?;
        vortex.observe(&canvas)?;

        {
            let mut host = vortex.host.borrow_mut();
            let dpr = window.device_pixel_ratio() as f32;
            let (width, height) = surface_size(&window, &host.canvas);
            host.engine
                .mount(width, height, dpr)
                .map_err(|e| JsValue::from_str(&format!("Mount failed: {e}")))?;
        }
        Ok(vortex)
    }

    /// Stop the animation and release every listener, observer and buffer.
    #[wasm_bindgen]
    pub fn dispose(&mut self) {
        if let Ok(mut host) = self.host.try_borrow_mut() {
            host.engine.dispose();
        }
        for listener in self.listeners.drain(..) {
            let _ = listener.target.remove_event_listener_with_callback(
                listener.kind,
                listener.callback.as_ref().unchecked_ref(),
            );
        }
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.observer_callback = None;
        self.frame_callback.borrow_mut().take();
    }

    /// Set the pointer in canvas coordinates.
    #[wasm_bindgen(js_name = setPointer)]
    pub fn set_pointer(&self, x: f32, y: f32) {
        self.host.borrow_mut().engine.set_pointer(x, y);
    }

    #[wasm_bindgen(js_name = clearPointer)]
    pub fn clear_pointer(&self) {
        self.host.borrow_mut().engine.clear_pointer();
    }

    #[wasm_bindgen(js_name = setVisible)]
    pub fn set_visible(&self, visible: bool) {
        self.host.borrow_mut().engine.set_visible(visible);
    }

    /// Morph a formation engine into new text. `color` is a hex string and
    /// defaults to the current settle colour.
    #[wasm_bindgen(js_name = setText)]
    pub fn set_text(&self, text: &str, color: Option<String>) -> Result<(), JsValue> {
        let mut host = self.host.borrow_mut();
        let color = match color {
            Some(hex) => Rgb::from_hex(&hex),
            None => match &host.engine.config().mode {
                ForceMode::Formation(formation) => formation.target_color(),
                _ => Ok(Rgb::WHITE),
            },
        }
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
        host.engine
            .set_text(text, color)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Get engine statistics as a JS object.
    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        let stats = self.host.borrow().engine.stats();
        let snapshot = StatsSnapshot {
            state: match stats.state {
                EngineState::Idle => "idle",
                EngineState::Running => "running",
                EngineState::Paused => "paused",
                EngineState::Disposed => "disposed",
            },
            tick: stats.tick,
            renders: stats.renders,
            particle_count: stats.particle_count,
            mean_age_ratio: stats.mean_age_ratio,
            mean_brightness: stats.mean_brightness,
            recycled_total: stats.recycled_total,
        };
        serde_wasm_bindgen::to_value(&snapshot)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
    }

    #[wasm_bindgen(js_name = particleCount)]
    pub fn particle_count(&self) -> usize {
        self.host.borrow().engine.store().len()
    }
}

impl WasmVortex {
    fn listen<F>(
        &mut self,
        target: &EventTarget,
        kind: &'static str,
        mut handler: F,
    ) -> Result<(), JsValue>
    where
        F: FnMut(&mut Host, &Event) + 'static,
    {
        let weak = Rc::downgrade(&self.host);
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            with_host(&weak, |host| handler(host, &event));
        });
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        self.listeners.push(Listener {
            target: target.clone(),
            kind,
            callback,
        });
        Ok(())
    }

    fn observe(&mut self, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
        let weak = Rc::downgrade(&self.host);
        let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
            let visible = entries
                .get(0)
                .dyn_into::<IntersectionObserverEntry>()
                .map_or(true, |entry| entry.is_intersecting());
            with_host(&weak, |host| host.engine.set_visible(visible));
        });
        let observer = IntersectionObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe(canvas);
        self.observer = Some(observer);
        self.observer_callback = Some(callback);
        Ok(())
    }
}

impl Drop for WasmVortex {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Run `f` on the host if it is still alive and not already borrowed.
fn with_host(weak: &Weak<RefCell<Host>>, f: impl FnOnce(&mut Host)) {
    let Some(host) = weak.upgrade() else {
        return;
    };
    let Ok(mut host) = host.try_borrow_mut() else {
        return;
    };
    f(&mut host);
}

/// Logical size of the element the canvas fills, falling back to the window.
///
/// The canvas's own client size is pinned by the inline style the backend
/// writes, so it cannot follow layout changes.
fn surface_size(window: &Window, canvas: &HtmlCanvasElement) -> (u32, u32) {
    if let Some(parent) = canvas.parent_element() {
        let (w, h) = (parent.client_width(), parent.client_height());
        if w > 0 && h > 0 {
            return (w as u32, h as u32);
        }
    }
    let inner = |v: Result<JsValue, JsValue>| {
        v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0).max(0.0) as u32
    };
    (inner(window.inner_width()), inner(window.inner_height()))
}

fn is_narrow(window: &Window) -> bool {
    window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .is_some_and(|w| w < MOBILE_BREAKPOINT)
}

fn media_matches(window: &Window, query: &str) -> bool {
    matches!(window.match_media(query), Ok(Some(list)) if list.matches())
}

fn parse_config(value: JsValue) -> Result<EngineConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(EngineConfig::default());
    }
    if let Some(json) = value.as_string() {
        return serde_json::from_str(&json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config JSON: {e}")));
    }
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))
}

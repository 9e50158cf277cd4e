// camera_engine: Rust/WASM camera engine for a zoomable portfolio grid.
// All motion logic lives here; JS forwards DOM events and paints the camera.

mod camera;
mod clock;
mod content;
mod error;
mod events;
mod geometry;
mod gesture;
mod observe;
mod pointer;
mod scroll;
mod shortcuts;
mod swipe;
mod timeline;
mod types;
mod zoom_toggle;

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub use camera::{
    camera_from_command, command_from_focus, commands_equal, focus_from_command, resolve_command,
    resolve_command_from, timing_for, CameraController, CameraSnapshot, CommandFuture,
    CommandResult, ControllerConfig, ControllerOptions, ResetTarget, Resolved,
};
pub use clock::{Clock, InstantClock, ManualClock};
pub use content::{row_index, validate_rows, GridShape, Item, Row, RowKind};
pub use error::EngineError;
pub use events::{log_hook, silent_hook, EngineEvent, EventHook, SkipReason, ToggleAction};
pub use geometry::{FixedViewport, Geometry, Gutters, Size, ViewportProvider};
pub use gesture::{
    GestureIntent, GestureTranslator, PinchDirection, PinchPointerType, SwipeAxis, SwipeDirection,
};
pub use observe::{Subscribers, Subscription};
pub use pointer::{PointerBatch, PointerInput, PointerKind, PointerPhase, PointerSnapshot, PointerTracker};
pub use scroll::{Overflow, ScrollBox, ScrollOutcome, ScrollPolicy, WheelInput};
pub use shortcuts::{KeyInput, KeyOutcome, ShortcutPolicy};
pub use timeline::{ease, FrameTimeline, TimelineHandle, TimelineProvider, Tween, TweenEvents};
pub use types::*;
pub use zoom_toggle::{ZoomToggle, ZoomToggleState};

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    #[cfg(feature = "console_log")]
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::debug!("logger already installed");
    }
}

/// Live layout numbers for the host's CSS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub viewport: Viewport,
    pub gutters: Gutters,
    pub grid_scale: f64,
    pub grid_size: Size,
}

/// Handle returned to JS by the `subscribe*` methods.
#[wasm_bindgen]
pub struct EngineSubscription {
    inner: Option<Subscription>,
}

#[wasm_bindgen]
impl EngineSubscription {
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.inner.take() {
            subscription.unsubscribe();
        }
    }
}

/// Main engine interface exposed to JavaScript.
/// Inputs and outputs cross the boundary as JSON strings.
#[wasm_bindgen]
pub struct Engine {
    controller: CameraController,
    timeline: Rc<FrameTimeline>,
    geometry: Geometry<FixedViewport>,
    grid: GridShape,
    tracker: PointerTracker,
    translator: Rc<RefCell<GestureTranslator>>,
    toggle: Rc<ZoomToggle>,
    scroll: ScrollPolicy,
    shortcuts: ShortcutPolicy,
    clock: Rc<ManualClock>,
    events: Subscribers<EngineEvent>,
    intents: Rc<RefCell<Vec<GestureIntent>>>,
    links: Vec<Subscription>,
    base_immediate: bool,
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn parse<'a, T: serde::Deserialize<'a>>(what: &str, json: &'a str) -> Result<T, EngineError> {
    serde_json::from_str(json)
        .map_err(|e| EngineError::Serialization(format!("Invalid {what}: {e}")))
}

fn command_promise(future: CommandFuture) -> js_sys::Promise {
    future_to_promise(async move {
        match future.await {
            Ok(Some(transition)) => serde_json::to_string(&transition)
                .map(|json| JsValue::from_str(&json))
                .map_err(|e| to_js(e.into())),
            Ok(None) => Ok(JsValue::NULL),
            Err(err) => Err(to_js(err)),
        }
    })
}

fn call_js(callback: &js_sys::Function, json: Result<String, serde_json::Error>) {
    let json = match json {
        Ok(json) => json,
        Err(err) => {
            log::error!("failed to serialize for subscriber: {err}");
            return;
        }
    };
    if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
        log::error!("subscriber threw: {err:?}");
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Engine, JsValue> {
        let config: EngineConfig = parse("config", config_json).map_err(to_js)?;
        Engine::from_config(config).map_err(to_js)
    }

    /// Forward one pointer event. Returns the gesture intents it produced.
    pub fn pointer(&self, input_json: &str) -> Result<String, JsValue> {
        let input: PointerInput = parse("pointer input", input_json).map_err(to_js)?;
        let intents = self.handle_pointer(&input);
        serde_json::to_string(&intents).map_err(|e| to_js(e.into()))
    }

    /// Forward one wheel event. Returns the outcome; the host calls
    /// `preventDefault` unless it is `ignored`.
    pub fn wheel(&self, input_json: &str) -> Result<String, JsValue> {
        let input: WheelInput = parse("wheel input", input_json).map_err(to_js)?;
        let outcome = self.handle_wheel(&input);
        serde_json::to_string(&outcome).map_err(|e| to_js(e.into()))
    }

    /// Forward one keydown.
    pub fn key(&self, input_json: &str) -> Result<String, JsValue> {
        let input: KeyInput = parse("key input", input_json).map_err(to_js)?;
        let outcome = self.shortcuts.handle(&input);
        serde_json::to_string(&outcome).map_err(|e| to_js(e.into()))
    }

    /// Advance animations to `now_ms` (the rAF timestamp). Returns true while animating.
    pub fn tick(&self, now_ms: f64) -> bool {
        self.clock.set(now_ms);
        self.timeline.tick(now_ms)
    }

    pub fn resize(&self, vw: f64, vh: f64) {
        let viewport = Viewport::new(vw, vh);
        self.geometry.provider().set(viewport);
        self.controller.set_viewport(viewport);
    }

    /// `(hover: hover) and (pointer: fine)` media query result.
    pub fn set_desktop_pointer(&self, desktop_pointer: bool) {
        self.scroll.set_desktop_pointer(desktop_pointer);
    }

    /// `prefers-reduced-motion` makes every transition snap.
    pub fn set_reduced_motion(&self, reduced: bool) {
        self.controller.set_immediate(self.base_immediate || reduced);
    }

    pub fn camera(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.controller.camera()).map_err(|e| to_js(e.into()))
    }

    pub fn focus(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.controller.focus()).map_err(|e| to_js(e.into()))
    }

    /// Focus, camera and queued commands.
    pub fn state(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.controller.state()).map_err(|e| to_js(e.into()))
    }

    pub fn layout(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.current_layout()).map_err(|e| to_js(e.into()))
    }

    #[wasm_bindgen(js_name = toggleState)]
    pub fn toggle_state(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.toggle.state()).map_err(|e| to_js(e.into()))
    }

    /// `callback(snapshotJson)` after every camera update.
    pub fn subscribe(&self, callback: js_sys::Function) -> EngineSubscription {
        let inner = self
            .controller
            .subscribe(move |snapshot| call_js(&callback, serde_json::to_string(snapshot)));
        EngineSubscription { inner: Some(inner) }
    }

    /// `callback(eventJson)` for every engine event.
    #[wasm_bindgen(js_name = subscribeEvents)]
    pub fn subscribe_events(&self, callback: js_sys::Function) -> EngineSubscription {
        let inner = self
            .events
            .subscribe(move |event| call_js(&callback, serde_json::to_string(event)));
        EngineSubscription { inner: Some(inner) }
    }

    /// Resolves with the transition JSON, or `null` when the command was a no-op.
    #[wasm_bindgen(js_name = zoomOutToGrid)]
    pub fn zoom_out_to_grid(&self) -> js_sys::Promise {
        command_promise(self.controller.zoom_out_to_grid())
    }

    #[wasm_bindgen(js_name = focusRow)]
    pub fn focus_row(&self, row_slug: &str, tile_index: Option<u32>) -> js_sys::Promise {
        command_promise(
            self.controller
                .focus_row(row_slug, tile_index.map(|index| index as usize)),
        )
    }

    #[wasm_bindgen(js_name = focusTile)]
    pub fn focus_tile(&self, row_slug: &str, tile_slug: &str, tile_index: Option<u32>) -> js_sys::Promise {
        command_promise(self.controller.focus_tile(
            row_slug,
            tile_slug,
            tile_index.map(|index| index as usize),
        ))
    }

    /// Detach every listener and stop running tweens.
    pub fn dispose(&mut self) {
        self.tracker.dispose();
        self.toggle.dispose();
        for link in self.links.drain(..) {
            link.unsubscribe();
        }
        self.timeline.clear();
        self.translator.borrow_mut().clear();
        self.events.clear();
    }
}

impl Engine {
    /// Build an engine without going through JSON; native hosts and tests start here.
    pub fn from_config(config: EngineConfig) -> Result<Engine, EngineError> {
        config.validate()?;

        let events: Subscribers<EngineEvent> = Subscribers::new();
        let hook: EventHook = {
            let events = events.clone();
            let log = log_hook();
            Rc::new(move |event| {
                log(event);
                events.emit(event);
            })
        };

        let viewport = config.viewport.unwrap_or(Viewport::FALLBACK);
        let timeline = Rc::new(FrameTimeline::new());
        let controller = CameraController::new(
            ControllerConfig::from_engine(&config),
            timeline.clone(),
            ControllerOptions {
                motion: config.motion,
                immediate: config.immediate,
                initial_focus: Some(config.start_focus()),
                initial_camera: None,
                hook: hook.clone(),
            },
        );

        let clock = Rc::new(ManualClock::new(0.0));
        let toggle = Rc::new(ZoomToggle::new(
            controller.clone(),
            clock.clone(),
            config.toggle,
            hook.clone(),
        ));

        let tracker = PointerTracker::new();
        let translator = Rc::new(RefCell::new(GestureTranslator::new(config.gestures)));
        let intents = Rc::new(RefCell::new(Vec::new()));
        let mut links = vec![GestureTranslator::connect(&translator, &tracker)];
        {
            let translated = translator.borrow();
            links.push(swipe::connect(&translated, toggle.clone()));
            let collected = Rc::clone(&intents);
            links.push(translated.subscribe(move |intent| collected.borrow_mut().push(intent.clone())));
        }

        log::debug!(
            "camera engine ready: {} rows, {}x{} grid, focus {:?}",
            config.rows.len(),
            config.grid_shape().columns,
            config.grid_shape().rows,
            controller.focus()
        );

        Ok(Engine {
            scroll: ScrollPolicy::new(toggle.clone(), config.scroll, true, hook.clone()),
            shortcuts: ShortcutPolicy::new(controller.clone(), hook),
            geometry: Geometry::new(config.geometry, FixedViewport::new(Some(viewport))),
            grid: config.grid_shape(),
            base_immediate: config.immediate,
            controller,
            timeline,
            tracker,
            translator,
            toggle,
            clock,
            events,
            intents,
            links,
        })
    }

    pub fn controller(&self) -> &CameraController {
        &self.controller
    }

    pub fn zoom_toggle(&self) -> &ZoomToggle {
        &self.toggle
    }

    pub fn handle_pointer(&self, input: &PointerInput) -> Vec<GestureIntent> {
        self.clock.set(input.time);
        self.tracker.handle(input);
        std::mem::take(&mut *self.intents.borrow_mut())
    }

    pub fn handle_wheel(&self, input: &WheelInput) -> ScrollOutcome {
        self.clock.set(input.time);
        self.scroll.handle(input)
    }

    pub fn handle_key(&self, input: &KeyInput) -> KeyOutcome {
        self.shortcuts.handle(input)
    }

    pub fn subscribe_native(&self, callback: impl FnMut(&EngineEvent) + 'static) -> Subscription {
        self.events.subscribe(callback)
    }

    pub fn current_layout(&self) -> Layout {
        Layout {
            viewport: self.geometry.viewport(),
            gutters: self.geometry.gutters(None),
            grid_scale: self.geometry.grid_scale(),
            grid_size: self.geometry.grid_size(self.grid),
        }
    }
}

// Pointer tracking: raw down/move/up/cancel events in, kinematic batches out.
// The host owns DOM listeners (pointerdown on the root, the rest on window) and forwards events here.

use std::cell::{Cell, RefCell};

use serde::{Deserialize, Serialize};

use crate::observe::{Subscribers, Subscription};

/// Floor for elapsed time between samples; same-frame duplicates would divide by zero.
const MIN_DT_MS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

impl PointerPhase {
    pub fn is_end(self) -> bool {
        matches!(self, PointerPhase::Up | PointerPhase::Cancel)
    }
}

/// Input device class, as reported by `PointerEvent.pointerType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
    Pen,
    #[serde(other)]
    Unknown,
}

/// One raw pointer event forwarded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerInput {
    pub id: i32,
    pub phase: PointerPhase,
    #[serde(default)]
    pub pointer_type: PointerKind,
    pub x: f64,
    pub y: f64,
    /// Event time in milliseconds.
    pub time: f64,
    #[serde(default)]
    pub buttons: u16,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub pressure: f64,
}

impl PointerInput {
    pub fn new(id: i32, phase: PointerPhase, x: f64, y: f64, time: f64) -> Self {
        PointerInput {
            id,
            phase,
            pointer_type: PointerKind::Touch,
            x,
            y,
            time,
            buttons: 1,
            is_primary: id == 1,
            pressure: 0.0,
        }
    }

    pub fn with_kind(mut self, kind: PointerKind) -> Self {
        self.pointer_type = kind;
        self
    }
}

/// Kinematic record of one pointer. Velocities are in px/ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerSnapshot {
    pub id: i32,
    pub pointer_type: PointerKind,
    pub buttons: u16,
    pub x: f64,
    pub y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    /// Displacement since `down`.
    pub offset_x: f64,
    pub offset_y: f64,
    pub pressure: f64,
    pub is_primary: bool,
    pub time: f64,
    pub down_time: f64,
    pub phase: PointerPhase,
    pub active: bool,
}

/// What subscribers receive for every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerBatch {
    pub phase: PointerPhase,
    pub changed: PointerSnapshot,
    /// Pointers still down after this event, in press order.
    pub active: Vec<PointerSnapshot>,
    pub event: PointerInput,
}

#[derive(Debug, Clone)]
struct TrackedPointer {
    id: i32,
    pointer_type: PointerKind,
    buttons: u16,
    is_primary: bool,
    pressure: f64,
    down_x: f64,
    down_y: f64,
    down_time: f64,
    last_x: f64,
    last_y: f64,
    last_time: f64,
    delta_x: f64,
    delta_y: f64,
    velocity_x: f64,
    velocity_y: f64,
    phase: PointerPhase,
}

impl TrackedPointer {
    fn register(input: &PointerInput) -> Self {
        TrackedPointer {
            id: input.id,
            pointer_type: input.pointer_type,
            buttons: input.buttons,
            is_primary: input.is_primary,
            pressure: input.pressure,
            down_x: input.x,
            down_y: input.y,
            down_time: input.time,
            last_x: input.x,
            last_y: input.y,
            last_time: input.time,
            delta_x: 0.0,
            delta_y: 0.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            phase: PointerPhase::Down,
        }
    }

    fn update(&mut self, input: &PointerInput) {
        let delta_x = input.x - self.last_x;
        let delta_y = input.y - self.last_y;
        let dt = (input.time - self.last_time).max(MIN_DT_MS);

        self.pointer_type = input.pointer_type;
        self.buttons = input.buttons;
        self.is_primary = input.is_primary;
        self.pressure = input.pressure;
        self.last_x = input.x;
        self.last_y = input.y;
        self.last_time = input.time;
        self.phase = input.phase;

        if input.phase == PointerPhase::Down {
            self.delta_x = 0.0;
            self.delta_y = 0.0;
            self.velocity_x = 0.0;
            self.velocity_y = 0.0;
        } else {
            self.delta_x = delta_x;
            self.delta_y = delta_y;
            self.velocity_x = delta_x / dt;
            self.velocity_y = delta_y / dt;
        }
    }

    fn snapshot(&self) -> PointerSnapshot {
        PointerSnapshot {
            id: self.id,
            pointer_type: self.pointer_type,
            buttons: self.buttons,
            x: self.last_x,
            y: self.last_y,
            delta_x: self.delta_x,
            delta_y: self.delta_y,
            velocity_x: self.velocity_x,
            velocity_y: self.velocity_y,
            offset_x: self.last_x - self.down_x,
            offset_y: self.last_y - self.down_y,
            pressure: self.pressure,
            is_primary: self.is_primary,
            time: self.last_time,
            down_time: self.down_time,
            phase: self.phase,
            active: !self.phase.is_end(),
        }
    }
}

/// Live set of active pointers, fanned out to subscribers as batches.
///
/// Explicitly constructed and owned by the application shell; independent
/// instances never share state.
#[derive(Debug)]
pub struct PointerTracker {
    pointers: RefCell<Vec<TrackedPointer>>,
    subscribers: Subscribers<PointerBatch>,
    attached: Cell<bool>,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerTracker {
    /// A tracker that accepts events immediately.
    pub fn new() -> Self {
        PointerTracker {
            pointers: RefCell::new(Vec::new()),
            subscribers: Subscribers::new(),
            attached: Cell::new(true),
        }
    }

    /// Re-attach after [`PointerTracker::dispose`], starting from a clean slate.
    pub fn attach(&self) {
        self.pointers.borrow_mut().clear();
        self.attached.set(true);
    }

    /// Stop accepting events and forget every pointer. Safe to call twice.
    pub fn dispose(&self) {
        self.attached.set(false);
        self.pointers.borrow_mut().clear();
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub fn subscribe(&self, callback: impl FnMut(&PointerBatch) + 'static) -> Subscription {
        self.subscribers.subscribe(callback)
    }

    pub fn active(&self) -> Vec<PointerSnapshot> {
        self.pointers
            .borrow()
            .iter()
            .map(TrackedPointer::snapshot)
            .collect()
    }

    /// Process one event. Returns `false` when it was ignored (detached, or
    /// move/up/cancel for a pointer that never went down).
    pub fn handle(&self, input: &PointerInput) -> bool {
        if !self.attached.get() {
            return false;
        }

        let batch = {
            let mut pointers = self.pointers.borrow_mut();
            let changed = match input.phase {
                PointerPhase::Down => {
                    pointers.retain(|pointer| pointer.id != input.id);
                    let mut pointer = TrackedPointer::register(input);
                    pointer.update(input);
                    let snapshot = pointer.snapshot();
                    pointers.push(pointer);
                    snapshot
                }
                PointerPhase::Move | PointerPhase::Up | PointerPhase::Cancel => {
                    let Some(position) = pointers.iter().position(|p| p.id == input.id) else {
                        return false;
                    };
                    pointers[position].update(input);
                    let snapshot = pointers[position].snapshot();
                    if input.phase.is_end() {
                        pointers.remove(position);
                    }
                    snapshot
                }
            };
            PointerBatch {
                phase: input.phase,
                changed,
                active: pointers.iter().map(TrackedPointer::snapshot).collect(),
                event: input.clone(),
            }
        };

        self.subscribers.emit(&batch);
        true
    }
}

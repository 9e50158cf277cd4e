// Camera tweening behind an injected provider. The controller never knows which engine animates.
// `FrameTimeline` is the built-in provider, ticked by the host from requestAnimationFrame.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::types::*;

/// One camera move: `from` to `to` over `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: CameraState,
    pub to: CameraState,
    pub duration: f64,
    pub easing: EasingType,
}

impl Tween {
    /// Interpolated camera at linear progress `t` (clamped to 0..=1).
    pub fn sample(&self, t: f64) -> CameraState {
        let t = t.clamp(0.0, 1.0);
        self.from.lerp(&self.to, ease(t, self.easing))
    }
}

/// Callbacks a provider drives while a tween runs. Called with no borrows held.
pub trait TweenEvents {
    fn update(&self, camera: CameraState);
    fn complete(&self);
    fn interrupt(&self);
}

pub trait TimelineHandle {
    /// Stop the tween. Fires `interrupt` unless it already finished.
    fn kill(&self);
}

/// Anything that can animate a [`Tween`]; may call back synchronously from `play`.
pub trait TimelineProvider {
    fn play(&self, tween: Tween, events: Rc<dyn TweenEvents>) -> Box<dyn TimelineHandle>;
}

pub fn ease(t: f64, easing: EasingType) -> f64 {
    match easing {
        EasingType::Linear => t,
        EasingType::EaseOut => 1.0 - (1.0 - t).powi(3),
        EasingType::EaseInOut => {
            if t < 0.5 {
                4.0 * t * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
            }
        }
        EasingType::Spring => {
            let c4 = (2.0 * std::f64::consts::PI) / 3.0;
            if t == 0.0 {
                0.0
            } else if t == 1.0 {
                1.0
            } else {
                2.0_f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
        }
    }
}

struct Running {
    id: u64,
    tween: Tween,
    events: Rc<dyn TweenEvents>,
    /// Set on the first tick after `play`.
    started_ms: Option<f64>,
}

#[derive(Default)]
struct FrameState {
    next_id: u64,
    running: Vec<Running>,
}

/// Host-ticked timeline. Each `tick` advances every running tween.
#[derive(Clone, Default)]
pub struct FrameTimeline {
    state: Rc<RefCell<FrameState>>,
}

impl fmt::Debug for FrameTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTimeline")
            .field("running", &self.len())
            .finish()
    }
}

impl FrameTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().running.len()
    }

    pub fn is_idle(&self) -> bool {
        self.len() == 0
    }

    /// Advance to `now_ms`. Returns true while anything is still running.
    pub fn tick(&self, now_ms: f64) -> bool {
        let mut updates = Vec::new();
        let mut finished = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            let mut index = 0;
            while index < state.running.len() {
                let running = &mut state.running[index];
                let started = *running.started_ms.get_or_insert(now_ms);
                let duration_ms = running.tween.duration * 1000.0;
                let t = if duration_ms <= 0.0 {
                    1.0
                } else {
                    (now_ms - started) / duration_ms
                };
                let camera = running.tween.sample(t);
                updates.push((Rc::clone(&running.events), camera));
                if t >= 1.0 {
                    finished.push(state.running.remove(index).events);
                } else {
                    index += 1;
                }
            }
        }

        for (events, camera) in updates {
            events.update(camera);
        }
        for events in finished {
            events.complete();
        }
        !self.is_idle()
    }

    /// Kill every running tween.
    pub fn clear(&self) {
        let drained: Vec<Running> = self.state.borrow_mut().running.drain(..).collect();
        for running in drained {
            running.events.interrupt();
        }
    }
}

impl TimelineProvider for FrameTimeline {
    fn play(&self, tween: Tween, events: Rc<dyn TweenEvents>) -> Box<dyn TimelineHandle> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.running.push(Running {
            id,
            tween,
            events,
            started_ms: None,
        });
        Box::new(FrameHandle {
            id,
            state: Rc::downgrade(&self.state),
        })
    }
}

struct FrameHandle {
    id: u64,
    state: Weak<RefCell<FrameState>>,
}

impl TimelineHandle for FrameHandle {
    fn kill(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let removed = {
            let mut state = state.borrow_mut();
            state
                .running
                .iter()
                .position(|running| running.id == self.id)
                .map(|index| state.running.remove(index))
        };
        if let Some(running) = removed {
            running.events.interrupt();
        }
    }
}

// Wheel policy: vertical wheel intent on desktop pointers toggles between grid and bookmark.
// The host serializes the target's ancestor chain; scrollability is decided here.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::events::{EngineEvent, EventHook, SkipReason};
use crate::types::ScrollConfig;
use crate::zoom_toggle::ZoomToggle;

/// CSS overflow value, as reported by `getComputedStyle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Clip,
    Auto,
    Scroll,
    #[serde(other)]
    Other,
}

impl Overflow {
    fn scrolls(self) -> bool {
        matches!(self, Overflow::Auto | Overflow::Scroll)
    }
}

/// One element of the event target's ancestor chain, target first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollBox {
    pub overflow: Overflow,
    pub overflow_y: Overflow,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollBox {
    pub fn can_scroll(&self) -> bool {
        (self.overflow_y.scrolls() || self.overflow.scrolls())
            && self.scroll_height > self.client_height
    }
}

/// One wheel event. Only `time` is required; it drives the restore cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WheelInput {
    #[serde(default)]
    pub delta_x: f64,
    #[serde(default)]
    pub delta_y: f64,
    #[serde(default)]
    pub ctrl_key: bool,
    #[serde(default)]
    pub meta_key: bool,
    #[serde(default)]
    pub default_prevented: bool,
    #[serde(default)]
    pub target_chain: Vec<ScrollBox>,
    /// `event.timeStamp` in milliseconds.
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ScrollOutcome {
    ZoomOut { issued: bool },
    Restore { issued: bool },
    Ignored { reason: SkipReason },
}

/// Wheel handler over a zoom toggle.
pub struct ScrollPolicy {
    toggle: Rc<ZoomToggle>,
    config: ScrollConfig,
    desktop_pointer: Cell<bool>,
    hook: EventHook,
}

impl ScrollPolicy {
    pub fn new(toggle: Rc<ZoomToggle>, config: ScrollConfig, desktop_pointer: bool, hook: EventHook) -> Self {
        ScrollPolicy {
            toggle,
            config,
            desktop_pointer: Cell::new(desktop_pointer),
            hook,
        }
    }

    /// Follows `(hover: hover) and (pointer: fine)` changes.
    pub fn set_desktop_pointer(&self, desktop_pointer: bool) {
        self.desktop_pointer.set(desktop_pointer);
    }

    pub fn desktop_pointer(&self) -> bool {
        self.desktop_pointer.get()
    }

    pub fn handle(&self, input: &WheelInput) -> ScrollOutcome {
        match self.classify(input) {
            Err(reason) => {
                (self.hook)(&EngineEvent::WheelIgnored { reason });
                ScrollOutcome::Ignored { reason }
            }
            Ok(outcome) => outcome,
        }
    }

    fn classify(&self, input: &WheelInput) -> Result<ScrollOutcome, SkipReason> {
        if !self.desktop_pointer.get() {
            return Err(SkipReason::NotDesktopPointer);
        }
        if input.default_prevented {
            return Err(SkipReason::DefaultPrevented);
        }
        if input.ctrl_key || input.meta_key {
            return Err(SkipReason::Modifier);
        }
        if input.delta_y.abs() < input.delta_x.abs() {
            return Err(SkipReason::HorizontalDominant);
        }
        if input.delta_y.abs() < self.config.min_delta_y {
            return Err(SkipReason::BelowThreshold);
        }
        if input.target_chain.iter().any(ScrollBox::can_scroll) {
            return Err(SkipReason::ScrollableAncestor);
        }

        let on_grid = self.toggle.state().current_focus.is_grid();
        if input.delta_y < 0.0 {
            if on_grid {
                return Err(SkipReason::AlreadyGrid);
            }
            Ok(ScrollOutcome::ZoomOut {
                issued: self.toggle.zoom_out(),
            })
        } else {
            if !on_grid {
                return Err(SkipReason::NotGrid);
            }
            Ok(ScrollOutcome::Restore {
                issued: self.toggle.restore(),
            })
        }
    }
}

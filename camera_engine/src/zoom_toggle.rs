// Toggle-style zoom out / restore for gestures that carry no explicit target.
// Remembers the last non-grid focus and gates re-entrant triggers.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::camera::CameraController;
use crate::clock::Clock;
use crate::events::{EngineEvent, EventHook, SkipReason, ToggleAction};
use crate::observe::Subscription;
use crate::types::{CameraCommand, FocusState, ToggleConfig};

/// Observable toggle state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomToggleState {
    pub current_focus: FocusState,
    /// The bookmark restore returns to.
    pub last_non_grid_focus: Option<FocusState>,
    pub transition_pending: bool,
    pub zoom_out_pending: bool,
}

struct Gate {
    current_focus: FocusState,
    bookmark: Option<FocusState>,
    transition_pending: bool,
    zoom_out_pending: bool,
    cooldown_until: f64,
}

struct Shared {
    gate: RefCell<Gate>,
    clock: Rc<dyn Clock>,
    hook: EventHook,
    config: ToggleConfig,
}

impl Shared {
    fn ignore(&self, action: ToggleAction, reason: SkipReason) -> bool {
        (self.hook)(&EngineEvent::ToggleIgnored { action, reason });
        false
    }

    fn settle(&self, action: ToggleAction, ok: bool) {
        {
            let mut gate = self.gate.borrow_mut();
            gate.transition_pending = false;
            if action == ToggleAction::ZoomOut {
                gate.zoom_out_pending = false;
                gate.cooldown_until = self.clock.now_ms() + self.config.cooldown_ms;
            }
        }
        (self.hook)(&EngineEvent::ToggleSettled { action, ok });
    }
}

/// Session-level zoom toggle over a [`CameraController`].
pub struct ZoomToggle {
    shared: Rc<Shared>,
    controller: CameraController,
    focus_subscription: RefCell<Option<Subscription>>,
}

impl ZoomToggle {
    pub fn new(
        controller: CameraController,
        clock: Rc<dyn Clock>,
        config: ToggleConfig,
        hook: EventHook,
    ) -> Self {
        let focus = controller.focus();
        let shared = Rc::new(Shared {
            gate: RefCell::new(Gate {
                bookmark: (!focus.is_grid()).then(|| focus.clone()),
                current_focus: focus,
                transition_pending: false,
                zoom_out_pending: false,
                cooldown_until: f64::NEG_INFINITY,
            }),
            clock,
            hook,
            config,
        });

        let weak = Rc::downgrade(&shared);
        let subscription = controller.subscribe(move |snapshot| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut gate = shared.gate.borrow_mut();
            if gate.current_focus != snapshot.focus {
                gate.current_focus = snapshot.focus.clone();
            }
            if !snapshot.focus.is_grid() {
                gate.bookmark = Some(snapshot.focus.clone());
            }
        });

        ZoomToggle {
            shared,
            controller,
            focus_subscription: RefCell::new(Some(subscription)),
        }
    }

    pub fn state(&self) -> ZoomToggleState {
        let gate = self.shared.gate.borrow();
        ZoomToggleState {
            current_focus: gate.current_focus.clone(),
            last_non_grid_focus: gate.bookmark.clone(),
            transition_pending: gate.transition_pending,
            zoom_out_pending: gate.zoom_out_pending,
        }
    }

    /// Zoom out when focused, restore when on the grid. Returns whether a command was issued.
    pub fn toggle(&self) -> bool {
        let on_grid = self.shared.gate.borrow().current_focus.is_grid();
        if on_grid {
            self.explicit(ToggleAction::Restore)
        } else {
            if self.shared.gate.borrow().transition_pending {
                return self
                    .shared
                    .ignore(ToggleAction::ZoomOut, SkipReason::TransitionPending);
            }
            self.run(ToggleAction::ZoomOut)
        }
    }

    pub fn zoom_out(&self) -> bool {
        self.explicit(ToggleAction::ZoomOut)
    }

    pub fn restore(&self) -> bool {
        self.explicit(ToggleAction::Restore)
    }

    /// Stop following focus changes. Safe to call twice.
    pub fn dispose(&self) {
        if let Some(subscription) = self.focus_subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }

    fn explicit(&self, action: ToggleAction) -> bool {
        let blocked = {
            let gate = self.shared.gate.borrow();
            if gate.transition_pending {
                Some(SkipReason::TransitionPending)
            } else if action == ToggleAction::Restore && gate.zoom_out_pending {
                Some(SkipReason::AwaitingZoomOut)
            } else if action == ToggleAction::Restore
                && self.shared.clock.now_ms() < gate.cooldown_until
            {
                Some(SkipReason::Cooldown)
            } else {
                None
            }
        };
        match blocked {
            Some(reason) => self.shared.ignore(action, reason),
            None => self.run(action),
        }
    }

    fn run(&self, action: ToggleAction) -> bool {
        let command = {
            let mut gate = self.shared.gate.borrow_mut();
            match action {
                ToggleAction::ZoomOut => {
                    if gate.current_focus.is_grid() {
                        None
                    } else {
                        gate.bookmark = Some(gate.current_focus.clone());
                        gate.transition_pending = true;
                        gate.zoom_out_pending = true;
                        Some(CameraCommand::ZoomOutToGrid)
                    }
                }
                ToggleAction::Restore => match &gate.bookmark {
                    Some(bookmark) if !bookmark.is_grid() => {
                        let command = CameraCommand::from_focus(bookmark);
                        gate.transition_pending = true;
                        Some(command)
                    }
                    _ => None,
                },
            }
        };

        let Some(command) = command else {
            let reason = match action {
                ToggleAction::ZoomOut => SkipReason::AlreadyGrid,
                ToggleAction::Restore => SkipReason::NoBookmark,
            };
            return self.shared.ignore(action, reason);
        };

        (self.shared.hook)(&EngineEvent::ToggleIssued { action });
        let weak: Weak<Shared> = Rc::downgrade(&self.shared);
        self.controller.issue_with(command, move |result| {
            if let Some(shared) = weak.upgrade() {
                shared.settle(action, result.is_ok());
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{ControllerConfig, ControllerOptions};
    use crate::clock::ManualClock;
    use crate::content::{GridShape, Row, RowKind};
    use crate::events::silent_hook;
    use crate::timeline::FrameTimeline;

    struct Rig {
        controller: CameraController,
        timeline: Rc<FrameTimeline>,
        clock: Rc<ManualClock>,
        toggle: ZoomToggle,
        events: Rc<RefCell<Vec<EngineEvent>>>,
    }

    fn rig(immediate: bool) -> Rig {
        let rows = vec![
            Row::new("hero", RowKind::Hero),
            Row::new("film", RowKind::FilmGallery).with_items(["teaser", "documentary"]),
        ];
        let timeline = Rc::new(FrameTimeline::new());
        let controller = CameraController::new(
            ControllerConfig::new(rows, GridShape::new(4, 1)),
            timeline.clone(),
            ControllerOptions {
                immediate,
                initial_focus: Some(FocusState::row("hero", None)),
                hook: silent_hook(),
                ..ControllerOptions::default()
            },
        );
        let clock = Rc::new(ManualClock::new(0.0));
        let events = Rc::new(RefCell::new(Vec::new()));
        let hook: EventHook = {
            let events = Rc::clone(&events);
            Rc::new(move |event: &EngineEvent| events.borrow_mut().push(event.clone()))
        };
        let toggle = ZoomToggle::new(
            controller.clone(),
            clock.clone(),
            ToggleConfig::default(),
            hook,
        );
        Rig {
            controller,
            timeline,
            clock,
            toggle,
            events,
        }
    }

    impl Rig {
        fn last_ignore(&self) -> Option<SkipReason> {
            self.events.borrow().iter().rev().find_map(|event| match event {
                EngineEvent::ToggleIgnored { reason, .. } => Some(*reason),
                _ => None,
            })
        }
    }

    #[test]
    fn initial_bookmark_is_current_focus() {
        let rig = rig(true);
        let state = rig.toggle.state();
        assert_eq!(state.last_non_grid_focus, Some(FocusState::row("hero", None)));
        assert!(!state.transition_pending);
    }

    #[test]
    fn toggle_round_trip_restores_bookmark() {
        let rig = rig(true);
        let _ = rig.controller.focus_tile("film", "documentary", None);

        assert!(rig.toggle.toggle());
        assert_eq!(rig.controller.focus(), FocusState::Grid);

        rig.clock.advance(300.0);
        assert!(rig.toggle.toggle());
        assert_eq!(
            rig.controller.focus(),
            FocusState::tile("film", "documentary", Some(1))
        );
    }

    #[test]
    fn restore_blocked_during_cooldown() {
        let rig = rig(true);
        rig.clock.set(1000.0);
        assert!(rig.toggle.zoom_out());
        rig.clock.set(1100.0);
        assert!(!rig.toggle.restore());
        assert_eq!(rig.last_ignore(), Some(SkipReason::Cooldown));
        rig.clock.set(1250.0);
        assert!(rig.toggle.restore());
        assert_eq!(rig.controller.focus(), FocusState::row("hero", None));
    }

    #[test]
    fn second_trigger_while_pending_is_ignored() {
        let rig = rig(false);
        assert!(rig.toggle.toggle());
        assert!(rig.toggle.state().transition_pending);
        assert!(rig.toggle.state().zoom_out_pending);

        assert!(!rig.toggle.toggle());
        assert_eq!(rig.last_ignore(), Some(SkipReason::TransitionPending));

        rig.timeline.tick(0.0);
        rig.timeline.tick(1000.0);
        let state = rig.toggle.state();
        assert!(!state.transition_pending);
        assert!(!state.zoom_out_pending);
        assert_eq!(state.current_focus, FocusState::Grid);
    }

    #[test]
    fn restore_waits_for_zoom_out() {
        let rig = rig(false);
        assert!(rig.toggle.zoom_out());
        // Simulate the pending flag outliving the transition flag.
        rig.toggle.shared.gate.borrow_mut().transition_pending = false;
        assert!(!rig.toggle.restore());
        assert_eq!(rig.last_ignore(), Some(SkipReason::AwaitingZoomOut));
    }

    #[test]
    fn zoom_out_on_grid_is_ignored() {
        let rig = rig(true);
        assert!(rig.toggle.zoom_out());
        rig.clock.advance(1000.0);
        assert!(!rig.toggle.zoom_out());
        assert_eq!(rig.last_ignore(), Some(SkipReason::AlreadyGrid));
    }

    #[test]
    fn restore_without_bookmark_is_ignored() {
        let rows = vec![Row::new("hero", RowKind::Hero)];
        let controller = CameraController::new(
            ControllerConfig::new(rows, GridShape::new(4, 1)),
            Rc::new(FrameTimeline::new()),
            ControllerOptions {
                immediate: true,
                ..ControllerOptions::default()
            },
        );
        let toggle = ZoomToggle::new(
            controller,
            Rc::new(ManualClock::new(0.0)),
            ToggleConfig::default(),
            silent_hook(),
        );
        assert!(!toggle.toggle());
        assert_eq!(toggle.state().last_non_grid_focus, None);
    }

    #[test]
    fn bookmark_follows_latest_non_grid_focus() {
        let rig = rig(true);
        let _ = rig.controller.focus_row("film", Some(1));
        let _ = rig.controller.zoom_out_to_grid();
        assert_eq!(
            rig.toggle.state().last_non_grid_focus,
            Some(FocusState::row("film", Some(1)))
        );
    }

    #[test]
    fn interrupted_zoom_out_still_settles() {
        let rig = rig(false);
        assert!(rig.toggle.zoom_out());
        rig.timeline.clear();
        let state = rig.toggle.state();
        assert!(!state.transition_pending);
        assert!(!state.zoom_out_pending);
        assert!(rig.events.borrow().iter().any(|event| matches!(
            event,
            EngineEvent::ToggleSettled {
                action: ToggleAction::ZoomOut,
                ok: false
            }
        )));
    }

    #[test]
    fn dispose_stops_tracking_focus() {
        let rig = rig(true);
        rig.toggle.dispose();
        rig.toggle.dispose();
        let _ = rig.controller.focus_row("film", None);
        assert_eq!(
            rig.toggle.state().current_focus,
            FocusState::row("hero", None)
        );
    }
}

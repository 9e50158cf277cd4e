// Touch swipe-up toggles the zoom; every other intent passes through untouched.

use std::rc::Rc;

use crate::gesture::{GestureIntent, GestureTranslator, SwipeAxis, SwipeDirection};
use crate::observe::Subscription;
use crate::pointer::PointerKind;
use crate::zoom_toggle::ZoomToggle;

/// A vertical upward swipe from a finger or pen.
pub fn is_swipe_up(intent: &GestureIntent) -> bool {
    matches!(
        intent,
        GestureIntent::Swipe {
            axis: SwipeAxis::Y,
            direction: SwipeDirection::Up,
            pointer_type: PointerKind::Touch | PointerKind::Pen,
            ..
        }
    )
}

/// Returns whether the intent triggered the toggle.
pub fn handle_intent(toggle: &ZoomToggle, intent: &GestureIntent) -> bool {
    if !is_swipe_up(intent) {
        return false;
    }
    toggle.toggle();
    true
}

/// Route every intent the translator emits through [`handle_intent`].
pub fn connect(translator: &GestureTranslator, toggle: Rc<ZoomToggle>) -> Subscription {
    translator.subscribe(move |intent| {
        handle_intent(&toggle, intent);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraController, ControllerConfig, ControllerOptions};
    use crate::clock::ManualClock;
    use crate::content::{GridShape, Row, RowKind};
    use crate::events::silent_hook;
    use crate::pointer::{PointerInput, PointerPhase, PointerTracker};
    use crate::timeline::FrameTimeline;
    use crate::types::{FocusState, GestureConfig, Point, ToggleConfig};
    use std::cell::RefCell;

    fn swipe(pointer_type: PointerKind, axis: SwipeAxis, direction: SwipeDirection) -> GestureIntent {
        GestureIntent::Swipe {
            pointer_type,
            axis,
            direction,
            travel_px: 80.0,
            velocity_px_ms: 1.0,
            duration_ms: 80.0,
        }
    }

    #[test]
    fn only_touch_or_pen_swipe_up_qualifies() {
        assert!(is_swipe_up(&swipe(PointerKind::Touch, SwipeAxis::Y, SwipeDirection::Up)));
        assert!(is_swipe_up(&swipe(PointerKind::Pen, SwipeAxis::Y, SwipeDirection::Up)));
        assert!(!is_swipe_up(&swipe(PointerKind::Mouse, SwipeAxis::Y, SwipeDirection::Up)));
        assert!(!is_swipe_up(&swipe(PointerKind::Touch, SwipeAxis::Y, SwipeDirection::Down)));
        assert!(!is_swipe_up(&swipe(PointerKind::Touch, SwipeAxis::X, SwipeDirection::Left)));
        assert!(!is_swipe_up(&GestureIntent::Tap {
            pointer_type: PointerKind::Touch,
            position: Point::default(),
            time: 0.0,
            duration_ms: 10.0,
        }));
    }

    #[test]
    fn finger_swipe_up_zooms_out() {
        let controller = CameraController::new(
            ControllerConfig::new(vec![Row::new("hero", RowKind::Hero)], GridShape::new(4, 1)),
            Rc::new(FrameTimeline::new()),
            ControllerOptions {
                immediate: true,
                initial_focus: Some(FocusState::row("hero", None)),
                ..ControllerOptions::default()
            },
        );
        let toggle = Rc::new(ZoomToggle::new(
            controller.clone(),
            Rc::new(ManualClock::new(0.0)),
            ToggleConfig::default(),
            silent_hook(),
        ));

        let tracker = PointerTracker::new();
        let translator = Rc::new(RefCell::new(GestureTranslator::new(GestureConfig::default())));
        let _link = GestureTranslator::connect(&translator, &tracker);
        let _swipe = connect(&translator.borrow(), toggle);

        tracker.handle(&PointerInput::new(1, PointerPhase::Down, 200.0, 600.0, 0.0));
        tracker.handle(&PointerInput::new(1, PointerPhase::Move, 202.0, 500.0, 50.0));
        tracker.handle(&PointerInput::new(1, PointerPhase::Up, 202.0, 480.0, 70.0));

        assert_eq!(controller.focus(), FocusState::Grid);
    }
}

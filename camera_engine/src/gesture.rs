// Gesture intents from pointer batches: taps, axis-locked swipes, two-finger pinches.
// A stable "no intent" beats a jittery wrong one: every threshold must be crossed cleanly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::observe::{Subscribers, Subscription};
use crate::pointer::{PointerBatch, PointerKind, PointerPhase, PointerSnapshot, PointerTracker};
use crate::types::{GestureConfig, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwipeAxis {
    X,
    Y,
}

/// Screen-space direction; positive y offsets mean the finger moved down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PinchDirection {
    In,
    Out,
}

/// Device class of a pinch; two different devices report `Mixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PinchPointerType {
    Single(PointerKind),
    Mixed,
}

/// Higher-level gesture produced from raw pointers. Transient; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GestureIntent {
    #[serde(rename_all = "camelCase")]
    Tap {
        pointer_type: PointerKind,
        position: Point,
        time: f64,
        duration_ms: f64,
    },
    #[serde(rename_all = "camelCase")]
    Swipe {
        pointer_type: PointerKind,
        axis: SwipeAxis,
        direction: SwipeDirection,
        travel_px: f64,
        velocity_px_ms: f64,
        duration_ms: f64,
    },
    #[serde(rename_all = "camelCase")]
    Pinch {
        direction: PinchDirection,
        delta: f64,
        scale: f64,
        midpoint: Point,
        pointer_type: PinchPointerType,
        pointers: [i32; 2],
    },
}

#[derive(Debug, Clone)]
struct PointerTrack {
    pointer_type: PointerKind,
    start_time: f64,
    start: Point,
    axis: Option<SwipeAxis>,
    tap_eligible: bool,
    swipe_emitted: bool,
    pinch_participant: bool,
}

#[derive(Debug, Clone)]
struct PinchSession {
    ids: [i32; 2],
    start_distance: f64,
    committed: bool,
    pointer_type: PinchPointerType,
}

/// Per-pointer gesture state machine plus at most one pinch session.
#[derive(Debug)]
pub struct GestureTranslator {
    config: GestureConfig,
    tracks: HashMap<i32, PointerTrack>,
    pinch: Option<PinchSession>,
    intents: Subscribers<GestureIntent>,
}

impl GestureTranslator {
    pub fn new(config: GestureConfig) -> Self {
        GestureTranslator {
            config,
            tracks: HashMap::new(),
            pinch: None,
            intents: Subscribers::new(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }

    /// Intent subscribers; delivery happens in [`GestureTranslator::connect`].
    pub fn intents(&self) -> Subscribers<GestureIntent> {
        self.intents.clone()
    }

    pub fn subscribe(&self, callback: impl FnMut(&GestureIntent) + 'static) -> Subscription {
        self.intents.subscribe(callback)
    }

    /// Forget every track and pinch session.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.pinch = None;
    }

    pub fn tracked(&self) -> usize {
        self.tracks.len()
    }

    /// Feed tracker batches into `translator` and fan resulting intents out.
    ///
    /// The translator is released before intents are delivered, so intent
    /// subscribers may freely inspect it.
    pub fn connect(translator: &Rc<RefCell<Self>>, tracker: &PointerTracker) -> Subscription {
        let translator = Rc::clone(translator);
        let intents = translator.borrow().intents();
        tracker.subscribe(move |batch| {
            let emitted = translator.borrow_mut().ingest_batch(batch);
            for intent in &emitted {
                intents.emit(intent);
            }
        })
    }

    /// Advance the state machine with one batch; returns intents in emission order.
    pub fn ingest_batch(&mut self, batch: &PointerBatch) -> Vec<GestureIntent> {
        let mut out = Vec::new();
        match batch.phase {
            PointerPhase::Down => self.handle_down(&batch.changed),
            PointerPhase::Move => self.handle_move(&batch.changed, &batch.active, &mut out),
            PointerPhase::Up => self.handle_up(&batch.changed, &mut out),
            PointerPhase::Cancel => {
                self.tracks.remove(&batch.changed.id);
            }
        }
        self.update_pinch(&batch.active, &mut out);
        out
    }

    fn handle_down(&mut self, snapshot: &PointerSnapshot) {
        self.tracks.insert(
            snapshot.id,
            PointerTrack {
                pointer_type: snapshot.pointer_type,
                start_time: snapshot.time,
                start: Point::new(snapshot.x, snapshot.y),
                axis: None,
                tap_eligible: true,
                swipe_emitted: false,
                pinch_participant: false,
            },
        );
    }

    fn handle_move(
        &mut self,
        snapshot: &PointerSnapshot,
        active: &[PointerSnapshot],
        out: &mut Vec<GestureIntent>,
    ) {
        let config = self.config;
        let Some(track) = self.tracks.get_mut(&snapshot.id) else {
            return;
        };

        if active.len() > 1 {
            track.tap_eligible = false;
        }
        if track.pinch_participant {
            return;
        }

        let travel = snapshot.offset_x.hypot(snapshot.offset_y);
        if travel > config.tap.max_move_px {
            track.tap_eligible = false;
        }

        lock_axis(track, snapshot, &config);
        let Some(axis) = track.axis else {
            return;
        };
        if track.swipe_emitted {
            return;
        }

        let (offset, velocity) = match axis {
            SwipeAxis::X => (snapshot.offset_x, snapshot.velocity_x),
            SwipeAxis::Y => (snapshot.offset_y, snapshot.velocity_y),
        };
        let travel_px = offset.abs();
        let velocity_px_ms = velocity.abs();
        if travel_px < config.swipe.min_travel_px || velocity_px_ms < config.swipe.min_velocity_px_ms {
            return;
        }

        let direction = match (axis, offset > 0.0) {
            (SwipeAxis::X, true) => SwipeDirection::Right,
            (SwipeAxis::X, false) => SwipeDirection::Left,
            (SwipeAxis::Y, true) => SwipeDirection::Down,
            (SwipeAxis::Y, false) => SwipeDirection::Up,
        };
        out.push(GestureIntent::Swipe {
            pointer_type: track.pointer_type,
            axis,
            direction,
            travel_px,
            velocity_px_ms,
            duration_ms: snapshot.time - track.start_time,
        });
        track.swipe_emitted = true;
        track.tap_eligible = false;
    }

    fn handle_up(&mut self, snapshot: &PointerSnapshot, out: &mut Vec<GestureIntent>) {
        let Some(track) = self.tracks.remove(&snapshot.id) else {
            return;
        };
        if track.pinch_participant || track.swipe_emitted || !track.tap_eligible {
            return;
        }

        let duration = snapshot.time - track.start_time;
        let position = Point::new(snapshot.x, snapshot.y);
        let distance = position.distance(&track.start);
        if duration <= self.config.tap.max_ms && distance <= self.config.tap.max_move_px {
            out.push(GestureIntent::Tap {
                pointer_type: track.pointer_type,
                position,
                time: snapshot.time,
                duration_ms: duration,
            });
        }
    }

    fn update_pinch(&mut self, active: &[PointerSnapshot], out: &mut Vec<GestureIntent>) {
        let [a, b] = active else {
            self.end_pinch();
            return;
        };
        let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
        let ids = [first.id, second.id];
        let first_pos = Point::new(first.x, first.y);
        let second_pos = Point::new(second.x, second.y);
        let distance = first_pos.distance(&second_pos);

        let same_pair = self.pinch.as_ref().is_some_and(|session| session.ids == ids);
        if !same_pair {
            let pointer_type = if first.pointer_type == second.pointer_type {
                PinchPointerType::Single(first.pointer_type)
            } else {
                PinchPointerType::Mixed
            };
            self.pinch = Some(PinchSession {
                ids,
                start_distance: if distance.is_finite() { distance } else { 0.0 },
                committed: false,
                pointer_type,
            });
            self.mark_pinch_participants(ids);
            return;
        }

        self.mark_pinch_participants(ids);
        let commit_delta = self.config.pinch.commit_delta;
        let Some(session) = self.pinch.as_mut() else {
            return;
        };
        if session.committed {
            return;
        }
        if session.start_distance <= 0.0 {
            session.start_distance = distance;
            return;
        }

        let scale = distance / session.start_distance;
        let delta = scale - 1.0;
        if delta.abs() < commit_delta {
            return;
        }
        out.push(GestureIntent::Pinch {
            direction: if delta > 0.0 {
                PinchDirection::Out
            } else {
                PinchDirection::In
            },
            delta,
            scale,
            midpoint: first_pos.midpoint(&second_pos),
            pointer_type: session.pointer_type,
            pointers: session.ids,
        });
        session.committed = true;
    }

    fn mark_pinch_participants(&mut self, ids: [i32; 2]) {
        for id in ids {
            if let Some(track) = self.tracks.get_mut(&id) {
                track.tap_eligible = false;
                track.pinch_participant = true;
            }
        }
    }

    fn end_pinch(&mut self) {
        self.pinch = None;
        for track in self.tracks.values_mut() {
            track.pinch_participant = false;
        }
    }
}

/// Lock once travel passes `axis_lock_px` and one axis dominates; never unlocks.
fn lock_axis(track: &mut PointerTrack, snapshot: &PointerSnapshot, config: &GestureConfig) {
    if track.axis.is_some() {
        return;
    }
    let abs_x = snapshot.offset_x.abs();
    let abs_y = snapshot.offset_y.abs();
    let swipe = &config.swipe;
    if abs_x.max(abs_y) <= swipe.axis_lock_px {
        return;
    }
    if abs_x >= abs_y * swipe.dominance {
        track.axis = Some(SwipeAxis::X);
    } else if abs_y >= abs_x * swipe.dominance {
        track.axis = Some(SwipeAxis::Y);
    }
    if track.axis.is_some() {
        track.tap_eligible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::PointerInput;
    use crate::types::{PinchConfig, SwipeConfig, TapConfig};

    fn config() -> GestureConfig {
        GestureConfig {
            tap: TapConfig {
                max_move_px: 8.0,
                max_ms: 250.0,
            },
            swipe: SwipeConfig {
                min_travel_px: 40.0,
                min_velocity_px_ms: 0.1,
                axis_lock_px: 6.0,
                dominance: 1.2,
            },
            pinch: PinchConfig { commit_delta: 0.15 },
        }
    }

    /// Tracker + translator wired together, recording every intent.
    struct Rig {
        tracker: PointerTracker,
        intents: Rc<RefCell<Vec<GestureIntent>>>,
        translator: Rc<RefCell<GestureTranslator>>,
    }

    impl Rig {
        fn new() -> Self {
            let tracker = PointerTracker::new();
            let translator = Rc::new(RefCell::new(GestureTranslator::new(config())));
            let _link = GestureTranslator::connect(&translator, &tracker);
            let intents = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&intents);
            let _sub = translator
                .borrow()
                .subscribe(move |intent| sink.borrow_mut().push(intent.clone()));
            Rig {
                tracker,
                intents,
                translator,
            }
        }

        fn send(&self, id: i32, phase: PointerPhase, x: f64, y: f64, time: f64) {
            self.tracker.handle(&PointerInput::new(id, phase, x, y, time));
        }

        fn intents(&self) -> Vec<GestureIntent> {
            self.intents.borrow().clone()
        }
    }

    #[test]
    fn tap_below_thresholds() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 100.0, 200.0, 0.0);
        rig.send(1, PointerPhase::Move, 103.0, 202.0, 50.0);
        rig.send(1, PointerPhase::Up, 103.0, 202.0, 120.0);

        let intents = rig.intents();
        assert_eq!(intents.len(), 1);
        match &intents[0] {
            GestureIntent::Tap {
                position,
                duration_ms,
                ..
            } => {
                assert_eq!(*position, Point::new(103.0, 202.0));
                assert_eq!(*duration_ms, 120.0);
            }
            other => panic!("expected tap, got {other:?}"),
        }
    }

    #[test]
    fn tap_boundary_is_inclusive() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Up, 8.0, 0.0, 50.0);
        assert_eq!(rig.intents().len(), 1);

        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Up, 9.0, 0.0, 50.0);
        assert!(rig.intents().is_empty());
    }

    #[test]
    fn slow_press_is_not_a_tap() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Up, 0.0, 0.0, 400.0);
        assert!(rig.intents().is_empty());
    }

    #[test]
    fn large_movement_rejects_tap() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Move, 30.0, 30.0, 20.0);
        rig.send(1, PointerPhase::Up, 30.0, 30.0, 100.0);
        assert!(rig.intents().is_empty());
    }

    #[test]
    fn horizontal_swipe_locks_axis() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Move, 120.0, 5.0, 60.0);
        rig.send(1, PointerPhase::Up, 130.0, 6.0, 90.0);

        let intents = rig.intents();
        assert_eq!(intents.len(), 1);
        match &intents[0] {
            GestureIntent::Swipe {
                axis,
                direction,
                travel_px,
                velocity_px_ms,
                ..
            } => {
                assert_eq!(*axis, SwipeAxis::X);
                assert_eq!(*direction, SwipeDirection::Right);
                assert!(*travel_px >= 120.0);
                assert!(*velocity_px_ms >= 0.1);
            }
            other => panic!("expected swipe, got {other:?}"),
        }
    }

    #[test]
    fn upward_swipe_reports_up() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 200.0, 400.0, 0.0);
        rig.send(1, PointerPhase::Move, 202.0, 330.0, 40.0);
        rig.send(1, PointerPhase::Up, 202.0, 300.0, 60.0);
        assert!(matches!(
            rig.intents().as_slice(),
            [GestureIntent::Swipe {
                axis: SwipeAxis::Y,
                direction: SwipeDirection::Up,
                ..
            }]
        ));
    }

    #[test]
    fn swipe_needs_velocity() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        // 60px over 1s: travel passes, velocity (0.06 px/ms) does not.
        for step in 1..=60 {
            rig.send(1, PointerPhase::Move, f64::from(step), 0.0, f64::from(step) * 16.0);
        }
        rig.send(1, PointerPhase::Up, 60.0, 0.0, 1000.0);
        assert!(rig.intents().is_empty());
    }

    #[test]
    fn swipe_emitted_once_per_press() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Move, 60.0, 0.0, 20.0);
        rig.send(1, PointerPhase::Move, 140.0, 0.0, 40.0);
        rig.send(1, PointerPhase::Move, 140.0, 120.0, 60.0);
        rig.send(1, PointerPhase::Up, 140.0, 120.0, 80.0);
        assert_eq!(rig.intents().len(), 1);
    }

    #[test]
    fn diagonal_drag_never_locks() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Move, 80.0, 80.0, 30.0);
        rig.send(1, PointerPhase::Up, 80.0, 80.0, 60.0);
        assert!(rig.intents().is_empty());
    }

    fn pinch_apart(rig: &Rig) {
        rig.send(1, PointerPhase::Down, 100.0, 100.0, 0.0);
        rig.send(2, PointerPhase::Down, 200.0, 100.0, 5.0);
        // Distance 100 -> 120 -> 140 -> 80: crosses the threshold repeatedly.
        rig.send(2, PointerPhase::Move, 220.0, 100.0, 20.0);
        rig.send(2, PointerPhase::Move, 240.0, 100.0, 40.0);
        rig.send(2, PointerPhase::Move, 180.0, 100.0, 60.0);
    }

    #[test]
    fn pinch_emits_once_per_session() {
        let rig = Rig::new();
        pinch_apart(&rig);

        let intents = rig.intents();
        let pinches: Vec<_> = intents
            .iter()
            .filter(|intent| matches!(intent, GestureIntent::Pinch { .. }))
            .collect();
        assert_eq!(pinches.len(), 1);
        match pinches[0] {
            GestureIntent::Pinch {
                direction,
                scale,
                pointers,
                midpoint,
                ..
            } => {
                assert_eq!(*direction, PinchDirection::Out);
                assert!((*scale - 1.2).abs() < 1e-9);
                assert_eq!(*pointers, [1, 2]);
                assert_eq!(*midpoint, Point::new(160.0, 100.0));
            }
            other => panic!("expected pinch, got {other:?}"),
        }

        rig.send(1, PointerPhase::Up, 100.0, 100.0, 80.0);
        rig.send(2, PointerPhase::Up, 180.0, 100.0, 90.0);
        assert!(
            !rig.intents()
                .iter()
                .any(|intent| matches!(intent, GestureIntent::Tap { .. })),
            "pinch participants never tap"
        );
    }

    #[test]
    fn regrab_starts_new_session() {
        let rig = Rig::new();
        pinch_apart(&rig);
        rig.send(2, PointerPhase::Up, 180.0, 100.0, 70.0);
        rig.send(3, PointerPhase::Down, 300.0, 100.0, 80.0);
        // New pair [1, 3] starts at distance 200; 140 is scale 0.7.
        rig.send(3, PointerPhase::Move, 240.0, 100.0, 100.0);

        let pinches: Vec<_> = rig
            .intents()
            .into_iter()
            .filter_map(|intent| match intent {
                GestureIntent::Pinch {
                    direction, pointers, ..
                } => Some((direction, pointers)),
                _ => None,
            })
            .collect();
        assert_eq!(
            pinches,
            vec![(PinchDirection::Out, [1, 2]), (PinchDirection::In, [1, 3])]
        );
    }

    #[test]
    fn small_pinch_is_noise() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(2, PointerPhase::Down, 100.0, 0.0, 0.0);
        rig.send(2, PointerPhase::Move, 110.0, 0.0, 16.0);
        rig.send(2, PointerPhase::Move, 95.0, 0.0, 32.0);
        assert!(rig.intents().is_empty());
    }

    #[test]
    fn cancel_drops_track_silently() {
        let rig = Rig::new();
        rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
        rig.send(1, PointerPhase::Cancel, 0.0, 0.0, 10.0);
        assert!(rig.intents().is_empty());
        assert_eq!(rig.translator.borrow().tracked(), 0);
    }

    #[test]
    fn batches_for_unknown_pointers_are_ignored() {
        let mut translator = GestureTranslator::new(config());
        let tracker = PointerTracker::new();
        let captured = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&captured);
        let _sub = tracker.subscribe(move |batch| sink.borrow_mut().push(batch.clone()));
        tracker.handle(&PointerInput::new(4, PointerPhase::Down, 0.0, 0.0, 0.0));
        tracker.handle(&PointerInput::new(4, PointerPhase::Up, 0.0, 0.0, 10.0));

        // Deliver only the `up`: the translator never saw the `down`.
        let up = captured.borrow()[1].clone();
        assert!(translator.ingest_batch(&up).is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// A mostly-horizontal fast drag yields exactly one x-axis swipe.
            #[test]
            fn horizontal_drag_swipes_on_x_only(
                dx in 60.0f64..400.0,
                sign in prop::bool::ANY,
                dy_ratio in 0.0f64..0.5,
                steps in 2usize..8,
            ) {
                let rig = Rig::new();
                let dir = if sign { 1.0 } else { -1.0 };
                rig.send(1, PointerPhase::Down, 500.0, 500.0, 0.0);
                for step in 1..=steps {
                    let t = step as f64 / steps as f64;
                    rig.send(
                        1,
                        PointerPhase::Move,
                        500.0 + dir * dx * t,
                        500.0 + dx * dy_ratio * t,
                        t * 100.0,
                    );
                }
                rig.send(1, PointerPhase::Up, 500.0 + dir * dx, 500.0 + dx * dy_ratio, 110.0);

                let intents = rig.intents();
                prop_assert_eq!(intents.len(), 1);
                let is_x_swipe = matches!(
                    intents[0],
                    GestureIntent::Swipe { axis: SwipeAxis::X, .. }
                );
                prop_assert!(is_x_swipe);
            }

            /// Up within the tap radius and time is a tap; beyond the radius never is.
            #[test]
            fn tap_radius_boundary(dist in 0.0f64..20.0, angle in 0.0f64..std::f64::consts::TAU) {
                let rig = Rig::new();
                rig.send(1, PointerPhase::Down, 0.0, 0.0, 0.0);
                rig.send(1, PointerPhase::Up, dist * angle.cos(), dist * angle.sin(), 100.0);
                let tapped = matches!(rig.intents().as_slice(), [GestureIntent::Tap { .. }]);
                let position = Point::new(dist * angle.cos(), dist * angle.sin());
                prop_assert_eq!(tapped, position.distance(&Point::default()) <= 8.0);
            }
        }
    }
}

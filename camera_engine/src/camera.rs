// Command-driven camera state machine.
// Resolution is pure in (command, config, departing focus); sequencing goes through an injected timeline.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};

use crate::content::{row_index, GridShape, Row};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventHook, SkipReason};
use crate::geometry::{center_grid, center_row, center_tile, tile_center};
use crate::observe::{Subscribers, Subscription};
use crate::timeline::{TimelineHandle, TimelineProvider, Tween, TweenEvents};
use crate::types::*;

/// Everything command resolution depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub rows: Vec<Row>,
    pub grid: GridShape,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

impl ControllerConfig {
    pub fn new(rows: Vec<Row>, grid: GridShape) -> Self {
        ControllerConfig {
            rows,
            grid,
            geometry: GeometryConfig::default(),
            viewport: None,
        }
    }

    pub fn from_engine(config: &EngineConfig) -> Self {
        ControllerConfig {
            rows: config.rows.clone(),
            grid: config.grid_shape(),
            geometry: config.geometry,
            viewport: config.viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.unwrap_or(Viewport::FALLBACK)
    }
}

/// Target of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
    pub focus: FocusState,
    pub camera: CameraState,
}

/// What observers receive on every state push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    pub camera: CameraState,
    pub focus: FocusState,
}

pub fn command_from_focus(focus: &FocusState) -> CameraCommand {
    CameraCommand::from_focus(focus)
}

/// Value equality; a missing tile index equals index 0.
pub fn commands_equal(a: &CameraCommand, b: &CameraCommand) -> bool {
    a == b
}

pub fn resolve_command(command: &CameraCommand, config: &ControllerConfig) -> Resolved {
    resolve_command_from(command, config, None)
}

/// Resolve `command`, anchoring a grid zoom-out on `departing` when it is a row or tile.
pub fn resolve_command_from(
    command: &CameraCommand,
    config: &ControllerConfig,
    departing: Option<&FocusState>,
) -> Resolved {
    resolve_checked(command, config, departing).0
}

pub fn camera_from_command(command: &CameraCommand, config: &ControllerConfig) -> CameraState {
    resolve_command(command, config).camera
}

pub fn focus_from_command(command: &CameraCommand, config: &ControllerConfig) -> FocusState {
    resolve_command(command, config).focus
}

/// Resolution plus the lookup failure it recovered from, if any.
///
/// An unknown row lands on the grid. An unknown tile falls back to index 0
/// when the row has items. A tile index past the row's items, or any tile in
/// a row without items, lands on the row itself.
fn resolve_checked(
    command: &CameraCommand,
    config: &ControllerConfig,
    departing: Option<&FocusState>,
) -> (Resolved, Option<EngineError>) {
    let viewport = config.viewport();
    let geometry = &config.geometry;
    match command {
        CameraCommand::ZoomOutToGrid => {
            let anchor = departing.and_then(|focus| focus_anchor(focus, config));
            let resolved = Resolved {
                focus: FocusState::Grid,
                camera: center_grid(geometry, config.grid, viewport, anchor),
            };
            (resolved, None)
        }
        CameraCommand::FocusRow {
            row_slug,
            tile_index,
        } => {
            let index = match row_index(&config.rows, row_slug) {
                Ok(index) => index,
                Err(err) => return (grid_fallback(config), Some(err)),
            };
            match tile_index.map(|tile| checked_tile(&config.rows[index], tile)) {
                Some(Err(err)) => (row_fallback(config, index), Some(err)),
                _ => (
                    Resolved {
                        focus: FocusState::row(row_slug.clone(), *tile_index),
                        camera: center_row(geometry, viewport, index, *tile_index),
                    },
                    None,
                ),
            }
        }
        CameraCommand::FocusTile {
            row_slug,
            tile_slug,
            tile_index,
        } => {
            let index = match row_index(&config.rows, row_slug) {
                Ok(index) => index,
                Err(err) => return (grid_fallback(config), Some(err)),
            };
            let row = &config.rows[index];
            let (tile, err) = match tile_index {
                Some(explicit) => match checked_tile(row, *explicit) {
                    Ok(tile) => (tile, None),
                    Err(err) => return (row_fallback(config, index), Some(err)),
                },
                None => match row.tile_index(tile_slug) {
                    Ok(found) => (found, None),
                    Err(err) if row.gallery_items().is_empty() => {
                        return (row_fallback(config, index), Some(err))
                    }
                    Err(err) => (0, Some(err)),
                },
            };
            (
                Resolved {
                    focus: FocusState::tile(row_slug.clone(), tile_slug.clone(), Some(tile)),
                    camera: center_tile(geometry, viewport, tile, index),
                },
                err,
            )
        }
    }
}

fn checked_tile(row: &Row, tile: usize) -> Result<usize, EngineError> {
    let len = row.gallery_items().len();
    if tile < len {
        Ok(tile)
    } else {
        Err(EngineError::TileIndexOutOfRange {
            row: row.slug.clone(),
            index: tile,
            len,
        })
    }
}

fn grid_fallback(config: &ControllerConfig) -> Resolved {
    Resolved {
        focus: FocusState::Grid,
        camera: center_grid(&config.geometry, config.grid, config.viewport(), None),
    }
}

fn row_fallback(config: &ControllerConfig, index: usize) -> Resolved {
    Resolved {
        focus: FocusState::row(config.rows[index].slug.clone(), None),
        camera: center_row(&config.geometry, config.viewport(), index, None),
    }
}

/// World-space center of the tile a focus looks at.
fn focus_anchor(focus: &FocusState, config: &ControllerConfig) -> Option<Point> {
    let row_slug = focus.row_slug()?;
    let row = row_index(&config.rows, row_slug).ok()?;
    let col = match focus {
        FocusState::Tile {
            tile_slug,
            tile_index: None,
            ..
        } => config.rows[row].tile_index(tile_slug).unwrap_or(0),
        other => other.tile_index().unwrap_or(0),
    };
    Some(tile_center(&config.geometry, config.viewport(), col, row))
}

/// Timing bucket for a move between two focus shapes.
pub fn timing_for(from: &FocusState, to: &FocusState, motion: &MotionConfig) -> Timing {
    match (from, to) {
        (_, FocusState::Grid) => motion.zoom_out,
        (FocusState::Grid, _) => motion.zoom_in,
        (_, FocusState::Tile { .. }) => motion.horizontal_change,
        (_, FocusState::Row { .. }) => Timing {
            duration: motion.vertical_change.total(),
            ease: motion.vertical_change.ease,
        },
    }
}

/// Outcome of one issued command: the transition, `None` for a no-op or reset.
pub type CommandResult = Result<Option<Transition>, EngineError>;

type Responder = Box<dyn FnOnce(CommandResult)>;

/// Resolves when the command's turn has run. A dropped responder reads as a no-op.
#[must_use = "futures do nothing unless polled"]
pub struct CommandFuture {
    rx: oneshot::Receiver<CommandResult>,
}

impl Future for CommandFuture {
    type Output = CommandResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Ok(None)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Construction options beyond the resolution config.
#[derive(Clone)]
pub struct ControllerOptions {
    pub motion: MotionConfig,
    pub immediate: bool,
    pub initial_focus: Option<FocusState>,
    pub initial_camera: Option<CameraState>,
    pub hook: EventHook,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions {
            motion: MotionConfig::default(),
            immediate: false,
            initial_focus: None,
            initial_camera: None,
            hook: crate::events::silent_hook(),
        }
    }
}

/// Where `reset` puts the controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResetTarget {
    pub focus: FocusState,
    pub camera: Option<CameraState>,
}

struct Queued {
    command: CameraCommand,
    responder: Responder,
}

struct Active {
    serial: u64,
    command: CameraCommand,
    from: ControllerState,
    target: Resolved,
    responder: Responder,
    handle: Option<Box<dyn TimelineHandle>>,
}

struct Machine {
    config: ControllerConfig,
    motion: MotionConfig,
    immediate: bool,
    focus: FocusState,
    camera: CameraState,
    queue: VecDeque<Queued>,
    active: Option<Active>,
    next_serial: u64,
    /// The viewport changed while busy; re-resolve once the queue drains.
    viewport_dirty: bool,
}

impl Machine {
    fn queued_commands(&self) -> Vec<CameraCommand> {
        self.queue.iter().map(|q| q.command.clone()).collect()
    }

    fn state(&self) -> ControllerState {
        ControllerState {
            focus: self.focus.clone(),
            camera: self.camera,
            queue: self.queued_commands(),
        }
    }

    fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            camera: self.camera,
            focus: self.focus.clone(),
        }
    }

    /// The command new input is compared against for duplicate suppression.
    fn reference_command(&self) -> (CameraCommand, SkipReason) {
        if let Some(tail) = self.queue.back() {
            return (tail.command.clone(), SkipReason::DuplicateQueued);
        }
        if let Some(active) = &self.active {
            return (active.command.clone(), SkipReason::DuplicateQueued);
        }
        (CameraCommand::from_focus(&self.focus), SkipReason::AlreadyFocused)
    }
}

struct Shared {
    machine: RefCell<Machine>,
    provider: Rc<dyn TimelineProvider>,
    hook: EventHook,
    subscribers: Subscribers<CameraSnapshot>,
}

/// What the controller does next after the machine borrow is released.
enum Step {
    Idle,
    Resized {
        snapshot: CameraSnapshot,
    },
    Settled {
        result: CommandResult,
        responder: Responder,
        events: Vec<EngineEvent>,
        snapshot: CameraSnapshot,
    },
    Animate {
        serial: u64,
        tween: Tween,
        events: Vec<EngineEvent>,
        snapshot: CameraSnapshot,
    },
}

/// FIFO camera controller. Clones share one machine.
///
/// Never holds its internal borrow while calling the timeline, subscribers,
/// the event hook or a responder, so any of them may re-enter.
#[derive(Clone)]
pub struct CameraController {
    shared: Rc<Shared>,
}

impl fmt::Debug for CameraController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraController")
            .field("state", &self.state())
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl CameraController {
    pub fn new(
        config: ControllerConfig,
        provider: Rc<dyn TimelineProvider>,
        options: ControllerOptions,
    ) -> Self {
        let focus = options.initial_focus.unwrap_or_default();
        let resolved = resolve_command(&CameraCommand::from_focus(&focus), &config);
        let camera = options.initial_camera.unwrap_or(resolved.camera);
        CameraController {
            shared: Rc::new(Shared {
                machine: RefCell::new(Machine {
                    config,
                    motion: options.motion,
                    immediate: options.immediate,
                    focus: resolved.focus,
                    camera,
                    queue: VecDeque::new(),
                    active: None,
                    next_serial: 0,
                    viewport_dirty: false,
                }),
                provider,
                hook: options.hook,
                subscribers: Subscribers::new(),
            }),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.shared.machine.borrow().state()
    }

    pub fn focus(&self) -> FocusState {
        self.shared.machine.borrow().focus.clone()
    }

    pub fn camera(&self) -> CameraState {
        self.shared.machine.borrow().camera
    }

    pub fn config(&self) -> ControllerConfig {
        self.shared.machine.borrow().config.clone()
    }

    /// A command is animating or waiting.
    pub fn is_busy(&self) -> bool {
        let machine = self.shared.machine.borrow();
        machine.active.is_some() || !machine.queue.is_empty()
    }

    pub fn is_immediate(&self) -> bool {
        self.shared.machine.borrow().immediate
    }

    /// Takes effect from the next command; an in-flight tween keeps running.
    pub fn set_immediate(&self, immediate: bool) {
        self.shared.machine.borrow_mut().immediate = immediate;
    }

    pub fn set_motion(&self, motion: MotionConfig) {
        self.shared.machine.borrow_mut().motion = motion;
    }

    /// New viewport for later resolutions. The camera snaps to the current
    /// focus re-resolved at the new size, right away when idle or once the
    /// queue drains otherwise.
    pub fn set_viewport(&self, viewport: Viewport) {
        let snapshot = {
            let mut machine = self.shared.machine.borrow_mut();
            machine.config.viewport = Some(viewport);
            if machine.active.is_some() || !machine.queue.is_empty() {
                machine.viewport_dirty = true;
                return;
            }
            let command = CameraCommand::from_focus(&machine.focus);
            machine.camera = resolve_command(&command, &machine.config).camera;
            machine.snapshot()
        };
        self.shared.subscribers.emit(&snapshot);
    }

    pub fn subscribe(&self, callback: impl FnMut(&CameraSnapshot) + 'static) -> Subscription {
        self.shared.subscribers.subscribe(callback)
    }

    pub fn zoom_out_to_grid(&self) -> CommandFuture {
        self.issue(CameraCommand::ZoomOutToGrid)
    }

    pub fn focus_row(&self, row_slug: &str, tile_index: Option<usize>) -> CommandFuture {
        self.issue(CameraCommand::focus_row(row_slug, tile_index))
    }

    pub fn focus_tile(
        &self,
        row_slug: &str,
        tile_slug: &str,
        tile_index: Option<usize>,
    ) -> CommandFuture {
        self.issue(CameraCommand::focus_tile(row_slug, tile_slug, tile_index))
    }

    /// Queue `command`; the future resolves once its turn has run.
    pub fn issue(&self, command: CameraCommand) -> CommandFuture {
        let (tx, rx) = oneshot::channel();
        self.issue_with(command, move |result| {
            let _ = tx.send(result);
        });
        CommandFuture { rx }
    }

    /// Callback flavour of [`CameraController::issue`].
    pub fn issue_with(&self, command: CameraCommand, on_done: impl FnOnce(CommandResult) + 'static) {
        let responder: Responder = Box::new(on_done);
        let outcome = {
            let mut machine = self.shared.machine.borrow_mut();
            let (reference, reason) = machine.reference_command();
            if reference == command {
                Err((reason, responder))
            } else {
                machine.queue.push_back(Queued {
                    command: command.clone(),
                    responder,
                });
                Ok(machine.queue.len())
            }
        };
        match outcome {
            Ok(depth) => {
                (self.shared.hook)(&EngineEvent::CommandQueued { command, depth });
                self.pump();
            }
            Err((reason, responder)) => {
                (self.shared.hook)(&EngineEvent::CommandSkipped { command, reason });
                responder(Ok(None));
            }
        }
    }

    /// Cancel everything and reinitialise. Pending futures resolve to `Ok(None)`.
    pub fn reset(&self, next: Option<ResetTarget>) {
        let next = next.unwrap_or_default();
        let (active, queued, snapshot) = {
            let mut machine = self.shared.machine.borrow_mut();
            let command = CameraCommand::from_focus(&next.focus);
            let resolved = resolve_command(&command, &machine.config);
            machine.focus = resolved.focus;
            machine.camera = next.camera.unwrap_or(resolved.camera);
            machine.viewport_dirty = false;
            let active = machine.active.take();
            let queued: Vec<Queued> = machine.queue.drain(..).collect();
            (active, queued, machine.snapshot())
        };

        let mut dropped = queued.len();
        if let Some(active) = active {
            dropped += 1;
            if let Some(handle) = &active.handle {
                handle.kill();
            }
            (active.responder)(Ok(None));
        }
        for queued in queued {
            (queued.responder)(Ok(None));
        }
        (self.shared.hook)(&EngineEvent::QueueReset { dropped });
        self.shared.subscribers.emit(&snapshot);
    }

    /// Start queued commands until one needs the timeline or the queue is empty.
    fn pump(&self) {
        loop {
            match self.next_step() {
                Step::Idle => return,
                Step::Resized { snapshot } => self.shared.subscribers.emit(&snapshot),
                Step::Settled {
                    result,
                    responder,
                    events,
                    snapshot,
                } => {
                    for event in &events {
                        (self.shared.hook)(event);
                    }
                    self.shared.subscribers.emit(&snapshot);
                    responder(result);
                }
                Step::Animate {
                    serial,
                    tween,
                    events,
                    snapshot,
                } => {
                    for event in &events {
                        (self.shared.hook)(event);
                    }
                    self.shared.subscribers.emit(&snapshot);
                    let callbacks: Rc<dyn TweenEvents> = Rc::new(ActiveTween {
                        controller: Rc::downgrade(&self.shared),
                        serial,
                    });
                    let handle = self.shared.provider.play(tween, callbacks);
                    let mut machine = self.shared.machine.borrow_mut();
                    if let Some(active) = machine.active.as_mut() {
                        if active.serial == serial {
                            active.handle = Some(handle);
                        }
                    }
                    return;
                }
            }
        }
    }

    fn next_step(&self) -> Step {
        let mut machine = self.shared.machine.borrow_mut();
        if machine.active.is_some() {
            return Step::Idle;
        }
        let Some(Queued { command, responder }) = machine.queue.pop_front() else {
            if !std::mem::take(&mut machine.viewport_dirty) {
                return Step::Idle;
            }
            let command = CameraCommand::from_focus(&machine.focus);
            machine.camera = resolve_command(&command, &machine.config).camera;
            return Step::Resized {
                snapshot: machine.snapshot(),
            };
        };

        let (target, fallback) = resolve_checked(&command, &machine.config, Some(&machine.focus));
        let mut events = Vec::new();
        if let Some(err) = fallback {
            events.push(EngineEvent::LookupFallback {
                command: command.clone(),
                detail: err.to_string(),
            });
        }
        let from = machine.state();
        let timing = timing_for(&machine.focus, &target.focus, &machine.motion);
        events.push(EngineEvent::TransitionStarted {
            command: command.clone(),
            from: machine.focus.kind(),
            to: target.focus.kind(),
            duration: if machine.immediate { 0.0 } else { timing.duration },
        });

        if machine.immediate {
            machine.focus = target.focus;
            machine.camera = target.camera;
            let transition = Transition {
                from,
                to: machine.state(),
                command: command.clone(),
            };
            events.push(EngineEvent::TransitionCompleted { command });
            return Step::Settled {
                result: Ok(Some(transition)),
                responder,
                events,
                snapshot: machine.snapshot(),
            };
        }

        let serial = machine.next_serial;
        machine.next_serial += 1;
        let tween = Tween {
            from: machine.camera,
            to: target.camera,
            duration: timing.duration,
            easing: timing.ease,
        };
        // Observers see the target focus for the whole tween.
        machine.focus = target.focus.clone();
        machine.active = Some(Active {
            serial,
            command,
            from,
            target,
            responder,
            handle: None,
        });
        Step::Animate {
            serial,
            tween,
            events,
            snapshot: machine.snapshot(),
        }
    }

    fn on_update(&self, serial: u64, camera: CameraState) {
        let snapshot = {
            let mut machine = self.shared.machine.borrow_mut();
            if !machine.active.as_ref().is_some_and(|a| a.serial == serial) {
                return;
            }
            machine.camera = camera;
            machine.snapshot()
        };
        self.shared.subscribers.emit(&snapshot);
    }

    fn on_complete(&self, serial: u64) {
        let (active, transition, snapshot) = {
            let mut machine = self.shared.machine.borrow_mut();
            let Some(active) = take_active(&mut machine, serial) else {
                return;
            };
            machine.focus = active.target.focus.clone();
            machine.camera = active.target.camera;
            let transition = Transition {
                from: active.from.clone(),
                to: machine.state(),
                command: active.command.clone(),
            };
            (active, transition, machine.snapshot())
        };
        self.shared.subscribers.emit(&snapshot);
        (self.shared.hook)(&EngineEvent::TransitionCompleted {
            command: active.command,
        });
        (active.responder)(Ok(Some(transition)));
        self.pump();
    }

    fn on_interrupt(&self, serial: u64) {
        let (active, snapshot) = {
            let mut machine = self.shared.machine.borrow_mut();
            let Some(active) = take_active(&mut machine, serial) else {
                return;
            };
            // The camera stays where the tween left it; focus reverts so the
            // same command can be issued again.
            machine.focus = active.from.focus.clone();
            (active, machine.snapshot())
        };
        self.shared.subscribers.emit(&snapshot);
        (self.shared.hook)(&EngineEvent::TransitionInterrupted {
            command: active.command.clone(),
        });
        (active.responder)(Err(EngineError::TransitionInterrupted {
            command: active.command,
        }));
        self.pump();
    }
}

fn take_active(machine: &mut Machine, serial: u64) -> Option<Active> {
    if machine.active.as_ref().is_some_and(|active| active.serial == serial) {
        machine.active.take()
    } else {
        None
    }
}

/// Timeline callbacks for one started command.
struct ActiveTween {
    controller: Weak<Shared>,
    serial: u64,
}

impl ActiveTween {
    fn controller(&self) -> Option<CameraController> {
        self.controller
            .upgrade()
            .map(|shared| CameraController { shared })
    }
}

impl TweenEvents for ActiveTween {
    fn update(&self, camera: CameraState) {
        if let Some(controller) = self.controller() {
            controller.on_update(self.serial, camera);
        }
    }

    fn complete(&self) {
        if let Some(controller) = self.controller() {
            controller.on_complete(self.serial);
        }
    }

    fn interrupt(&self) {
        if let Some(controller) = self.controller() {
            controller.on_interrupt(self.serial);
        }
    }
}

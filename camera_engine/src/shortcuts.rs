// Keyboard navigation: Escape/Backspace zoom out a level, Enter drills in, arrows move between rows and tiles.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::camera::CameraController;
use crate::content::Row;
use crate::events::{EngineEvent, EventHook, SkipReason};
use crate::types::{CameraCommand, FocusState};

/// A `keydown` forwarded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyInput {
    pub key: String,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
    /// Focus is in an input, textarea, select or contenteditable.
    pub editable_target: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        KeyInput {
            key: key.into(),
            ..KeyInput::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavKey {
    Out,
    In,
    Up,
    Down,
    Left,
    Right,
}

impl NavKey {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "Escape" | "Backspace" => Some(NavKey::Out),
            "Enter" => Some(NavKey::In),
            "ArrowUp" => Some(NavKey::Up),
            "ArrowDown" => Some(NavKey::Down),
            "ArrowLeft" => Some(NavKey::Left),
            "ArrowRight" => Some(NavKey::Right),
            _ => None,
        }
    }
}

/// What happened to a key press.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOutcome {
    /// The host should call `preventDefault`.
    pub prevent_default: bool,
    /// The command issued, if any.
    pub command: Option<CameraCommand>,
    pub skipped: Option<SkipReason>,
}

impl KeyOutcome {
    fn ignored(reason: SkipReason) -> Self {
        KeyOutcome {
            prevent_default: false,
            command: None,
            skipped: Some(reason),
        }
    }
}

pub struct ShortcutPolicy {
    controller: CameraController,
    rows: Vec<Row>,
    hook: EventHook,
    last_issued: RefCell<Option<CameraCommand>>,
    last_row: RefCell<Option<String>>,
}

impl ShortcutPolicy {
    pub fn new(controller: CameraController, hook: EventHook) -> Self {
        let rows = controller.config().rows;
        let last_row = controller.focus().row_slug().map(str::to_string);
        ShortcutPolicy {
            controller,
            rows,
            hook,
            last_issued: RefCell::new(None),
            last_row: RefCell::new(last_row),
        }
    }

    pub fn handle(&self, input: &KeyInput) -> KeyOutcome {
        let Some(nav) = NavKey::parse(&input.key) else {
            return KeyOutcome::ignored(SkipReason::UnboundKey);
        };
        if input.editable_target {
            return self.suppress(input, SkipReason::EditableTarget, false);
        }
        if input.ctrl_key || input.alt_key || input.meta_key {
            return self.suppress(input, SkipReason::Modifier, false);
        }

        let focus = self.controller.focus();
        if let Some(row) = focus.row_slug() {
            *self.last_row.borrow_mut() = Some(row.to_string());
        }
        let Some(command) = self.command_for(nav, &focus) else {
            return KeyOutcome::ignored(SkipReason::NoTarget);
        };

        if command == CameraCommand::from_focus(&focus) {
            return self.suppress(input, SkipReason::AlreadyFocused, true);
        }
        let repeat = self.last_issued.borrow().as_ref() == Some(&command);
        if repeat && self.controller.is_busy() {
            return self.suppress(input, SkipReason::MotionInFlight, true);
        }

        *self.last_issued.borrow_mut() = Some(command.clone());
        self.controller.issue_with(command.clone(), |_| {});
        KeyOutcome {
            prevent_default: true,
            command: Some(command),
            skipped: None,
        }
    }

    fn suppress(&self, input: &KeyInput, reason: SkipReason, prevent_default: bool) -> KeyOutcome {
        (self.hook)(&EngineEvent::ShortcutSuppressed {
            key: input.key.clone(),
            reason,
        });
        KeyOutcome {
            prevent_default,
            command: None,
            skipped: Some(reason),
        }
    }

    fn command_for(&self, nav: NavKey, focus: &FocusState) -> Option<CameraCommand> {
        match (nav, focus) {
            (NavKey::Out, FocusState::Grid) => None,
            (NavKey::Out, FocusState::Row { .. }) => Some(CameraCommand::ZoomOutToGrid),
            (
                NavKey::Out,
                FocusState::Tile {
                    row_slug,
                    tile_index,
                    ..
                },
            ) => Some(CameraCommand::focus_row(row_slug.clone(), *tile_index)),

            (NavKey::In, FocusState::Grid) => {
                let remembered = self.last_row.borrow().clone();
                remembered
                    .filter(|slug| self.position(slug).is_some())
                    .or_else(|| self.rows.first().map(|row| row.slug.clone()))
                    .map(|slug| CameraCommand::focus_row(slug, None))
            }
            (
                NavKey::In,
                FocusState::Row {
                    row_slug,
                    tile_index,
                },
            ) => {
                let row = &self.rows[self.position(row_slug)?];
                let index = tile_index.unwrap_or(0);
                let item = row.gallery_items().get(index)?;
                Some(CameraCommand::focus_tile(
                    row_slug.clone(),
                    item.slug.clone(),
                    Some(index),
                ))
            }
            (NavKey::In, FocusState::Tile { .. }) => None,

            (_, FocusState::Grid) => None,
            (NavKey::Up, current) => self.adjacent_row(current, -1),
            (NavKey::Down, current) => self.adjacent_row(current, 1),
            (
                NavKey::Left | NavKey::Right,
                FocusState::Tile {
                    row_slug,
                    tile_slug,
                    tile_index,
                },
            ) => {
                let step = if nav == NavKey::Left { -1 } else { 1 };
                let row = &self.rows[self.position(row_slug)?];
                let items = row.gallery_items();
                let current = tile_index
                    .or_else(|| row.tile_index(tile_slug).ok())
                    .unwrap_or(0);
                match current.checked_add_signed(step) {
                    Some(next) if next < items.len() => Some(CameraCommand::focus_tile(
                        row_slug.clone(),
                        items[next].slug.clone(),
                        Some(next),
                    )),
                    _ => self.adjacent_row(focus, step),
                }
            }
            (NavKey::Left, current) => self.adjacent_row(current, -1),
            (NavKey::Right, current) => self.adjacent_row(current, 1),
        }
    }

    fn position(&self, slug: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.slug == slug)
    }

    /// The row `step` away from the focused row; no wrap.
    fn adjacent_row(&self, focus: &FocusState, step: isize) -> Option<CameraCommand> {
        let current = self.position(focus.row_slug()?)?;
        let next = current.checked_add_signed(step)?;
        let row = self.rows.get(next)?;
        Some(CameraCommand::focus_row(row.slug.clone(), None))
    }
}

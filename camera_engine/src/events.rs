// Structured observability: the core reports key transitions to an injected hook.
// The host decides whether to log; `log_hook` forwards everything to the `log` facade.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::types::{CameraCommand, FocusKind};

/// Why an input or command was deliberately dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Command equals the current focus.
    AlreadyFocused,
    /// Command equals the tail of the queue.
    DuplicateQueued,
    /// A toggle transition is still resolving.
    TransitionPending,
    /// Restore requested while a zoom-out is still resolving.
    AwaitingZoomOut,
    /// Restore requested inside the post-zoom-out cooldown.
    Cooldown,
    /// Nothing to restore.
    NoBookmark,
    AlreadyGrid,
    NotGrid,
    NotDesktopPointer,
    DefaultPrevented,
    Modifier,
    HorizontalDominant,
    BelowThreshold,
    ScrollableAncestor,
    EditableTarget,
    UnboundKey,
    NoTarget,
    MotionInFlight,
}

/// Something the core did that a host may want to observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    CommandSkipped {
        command: CameraCommand,
        reason: SkipReason,
    },
    CommandQueued {
        command: CameraCommand,
        depth: usize,
    },
    TransitionStarted {
        command: CameraCommand,
        from: FocusKind,
        to: FocusKind,
        duration: f64,
    },
    TransitionCompleted {
        command: CameraCommand,
    },
    TransitionInterrupted {
        command: CameraCommand,
    },
    LookupFallback {
        command: CameraCommand,
        detail: String,
    },
    QueueReset {
        dropped: usize,
    },
    ToggleIssued {
        action: ToggleAction,
    },
    ToggleIgnored {
        action: ToggleAction,
        reason: SkipReason,
    },
    ToggleSettled {
        action: ToggleAction,
        ok: bool,
    },
    WheelIgnored {
        reason: SkipReason,
    },
    ShortcutSuppressed {
        key: String,
        reason: SkipReason,
    },
}

/// Zoom toggle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleAction {
    ZoomOut,
    Restore,
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleAction::ZoomOut => f.write_str("zoomOut"),
            ToggleAction::Restore => f.write_str("restore"),
        }
    }
}

/// Shared observability callback.
pub type EventHook = Rc<dyn Fn(&EngineEvent)>;

/// Drops every event.
pub fn silent_hook() -> EventHook {
    Rc::new(|_| {})
}

/// Forwards events to `log`: interruptions and fallbacks at warn, the rest at debug.
pub fn log_hook() -> EventHook {
    Rc::new(|event| match event {
        EngineEvent::TransitionInterrupted { command } => {
            log::warn!("camera transition interrupted: {command:?}");
        }
        EngineEvent::LookupFallback { command, detail } => {
            log::warn!("camera lookup fallback for {command:?}: {detail}");
        }
        other => log::debug!("{other:?}"),
    })
}

// Strong typing over strings. Focus, commands and intents are enums, never tag strings.
// Every config section deserializes from `{}` so JS can send only what it overrides.

use serde::{Deserialize, Serialize};

use crate::content::{validate_rows, GridShape, Row, RowKind};
use crate::error::EngineError;

/// Logical pixel size of the visible surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub vw: f64,
    pub vh: f64,
}

impl Viewport {
    /// Used whenever no live display surface exists (pre-render, tests).
    pub const FALLBACK: Viewport = Viewport {
        vw: 1440.0,
        vh: 900.0,
    };

    pub fn new(vw: f64, vh: f64) -> Self {
        Viewport { vw, vh }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::FALLBACK
    }
}

/// A point in world or screen pixels, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// World-space top-left of the visible viewport plus zoom factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl CameraState {
    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        CameraState { x, y, scale }
    }

    /// Component-wise interpolation; `t` is already eased.
    pub fn lerp(&self, to: &CameraState, t: f64) -> CameraState {
        CameraState {
            x: lerp(self.x, to.x, t),
            y: lerp(self.y, to.y, t),
            scale: lerp(self.scale, to.scale, t),
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        CameraState {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// What the camera is looking at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FocusState {
    /// Zoomed out over the whole tile grid.
    Grid,
    /// One content row, full-bleed.
    Row {
        #[serde(rename = "rowSlug")]
        row_slug: String,
        #[serde(
            rename = "tileIndex",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        tile_index: Option<usize>,
    },
    /// One gallery tile within a row.
    Tile {
        #[serde(rename = "rowSlug")]
        row_slug: String,
        #[serde(rename = "tileSlug")]
        tile_slug: String,
        #[serde(
            rename = "tileIndex",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        tile_index: Option<usize>,
    },
}

impl FocusState {
    pub fn row(row_slug: impl Into<String>, tile_index: Option<usize>) -> Self {
        FocusState::Row {
            row_slug: row_slug.into(),
            tile_index,
        }
    }

    pub fn tile(
        row_slug: impl Into<String>,
        tile_slug: impl Into<String>,
        tile_index: Option<usize>,
    ) -> Self {
        FocusState::Tile {
            row_slug: row_slug.into(),
            tile_slug: tile_slug.into(),
            tile_index,
        }
    }

    pub fn is_grid(&self) -> bool {
        matches!(self, FocusState::Grid)
    }

    pub fn row_slug(&self) -> Option<&str> {
        match self {
            FocusState::Grid => None,
            FocusState::Row { row_slug, .. } | FocusState::Tile { row_slug, .. } => Some(row_slug),
        }
    }

    pub fn tile_index(&self) -> Option<usize> {
        match self {
            FocusState::Grid => None,
            FocusState::Row { tile_index, .. } | FocusState::Tile { tile_index, .. } => *tile_index,
        }
    }

    pub fn kind(&self) -> FocusKind {
        match self {
            FocusState::Grid => FocusKind::Grid,
            FocusState::Row { .. } => FocusKind::Row,
            FocusState::Tile { .. } => FocusKind::Tile,
        }
    }
}

impl Default for FocusState {
    fn default() -> Self {
        FocusState::Grid
    }
}

/// Payload-free discriminant of [`FocusState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusKind {
    Grid,
    Row,
    Tile,
}

/// A navigation intent. Resolving it against a config is a pure function.
///
/// Equality treats a missing tile index as index 0, so `focusRow(hero)` and
/// `focusRow(hero, 0)` are the same command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CameraCommand {
    ZoomOutToGrid,
    FocusRow {
        #[serde(rename = "rowSlug")]
        row_slug: String,
        #[serde(
            rename = "tileIndex",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        tile_index: Option<usize>,
    },
    FocusTile {
        #[serde(rename = "rowSlug")]
        row_slug: String,
        #[serde(rename = "tileSlug")]
        tile_slug: String,
        #[serde(
            rename = "tileIndex",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        tile_index: Option<usize>,
    },
}

impl CameraCommand {
    pub fn focus_row(row_slug: impl Into<String>, tile_index: Option<usize>) -> Self {
        CameraCommand::FocusRow {
            row_slug: row_slug.into(),
            tile_index,
        }
    }

    pub fn focus_tile(
        row_slug: impl Into<String>,
        tile_slug: impl Into<String>,
        tile_index: Option<usize>,
    ) -> Self {
        CameraCommand::FocusTile {
            row_slug: row_slug.into(),
            tile_slug: tile_slug.into(),
            tile_index,
        }
    }

    /// The command that would land on `focus`.
    pub fn from_focus(focus: &FocusState) -> Self {
        match focus {
            FocusState::Grid => CameraCommand::ZoomOutToGrid,
            FocusState::Row {
                row_slug,
                tile_index,
            } => CameraCommand::FocusRow {
                row_slug: row_slug.clone(),
                tile_index: *tile_index,
            },
            FocusState::Tile {
                row_slug,
                tile_slug,
                tile_index,
            } => CameraCommand::FocusTile {
                row_slug: row_slug.clone(),
                tile_slug: tile_slug.clone(),
                tile_index: *tile_index,
            },
        }
    }
}

impl PartialEq for CameraCommand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CameraCommand::ZoomOutToGrid, CameraCommand::ZoomOutToGrid) => true,
            (
                CameraCommand::FocusRow {
                    row_slug: a_row,
                    tile_index: a_index,
                },
                CameraCommand::FocusRow {
                    row_slug: b_row,
                    tile_index: b_index,
                },
            ) => a_row == b_row && a_index.unwrap_or(0) == b_index.unwrap_or(0),
            (
                CameraCommand::FocusTile {
                    row_slug: a_row,
                    tile_slug: a_tile,
                    tile_index: a_index,
                },
                CameraCommand::FocusTile {
                    row_slug: b_row,
                    tile_slug: b_tile,
                    tile_index: b_index,
                },
            ) => {
                a_row == b_row
                    && a_tile == b_tile
                    && a_index.unwrap_or(0) == b_index.unwrap_or(0)
            }
            _ => false,
        }
    }
}

impl Eq for CameraCommand {}

/// Snapshot of everything the controller owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub focus: FocusState,
    pub camera: CameraState,
    pub queue: Vec<CameraCommand>,
}

/// A completed move from one controller state to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ControllerState,
    pub to: ControllerState,
    pub command: CameraCommand,
}

/// Easing function for camera transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EasingType {
    Linear,
    EaseOut,
    EaseInOut,
    Spring,
}

/// `min..max` interpolated as viewport width moves across `min_viewport..max_viewport`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClampConfig {
    pub min: f64,
    pub max: f64,
    pub min_viewport: f64,
    pub max_viewport: f64,
}

impl ClampConfig {
    pub const fn new(min: f64, max: f64, min_viewport: f64, max_viewport: f64) -> Self {
        ClampConfig {
            min,
            max,
            min_viewport,
            max_viewport,
        }
    }
}

/// Responsive layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeometryConfig {
    pub gutter_x: ClampConfig,
    pub gutter_y: ClampConfig,
    pub grid_scale: ClampConfig,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig {
            gutter_x: ClampConfig::new(24.0, 96.0, 360.0, 1440.0),
            gutter_y: ClampConfig::new(24.0, 72.0, 360.0, 1440.0),
            grid_scale: ClampConfig::new(0.28, 0.42, 360.0, 1440.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapConfig {
    pub max_move_px: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeConfig {
    pub min_travel_px: f64,
    pub min_velocity_px_ms: f64,
    pub axis_lock_px: f64,
    pub dominance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinchConfig {
    pub commit_delta: f64,
}

/// Gesture classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub tap: TapConfig,
    pub swipe: SwipeConfig,
    pub pinch: PinchConfig,
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            tap: TapConfig {
                max_move_px: 8.0,
                max_ms: 220.0,
            },
            swipe: SwipeConfig {
                min_travel_px: 48.0,
                min_velocity_px_ms: 0.2,
                axis_lock_px: 12.0,
                dominance: 1.5,
            },
            pinch: PinchConfig {
                commit_delta: 0.08,
            },
        }
    }
}

/// Duration (seconds) and easing for a single-segment move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub duration: f64,
    pub ease: EasingType,
}

/// Zoom out, pan, zoom back in; segments overlap by `overlap` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedTiming {
    pub zoom_out: f64,
    pub pan: f64,
    pub zoom_in: f64,
    pub overlap: f64,
    pub ease: EasingType,
}

impl StagedTiming {
    pub fn total(&self) -> f64 {
        (self.zoom_out + self.pan + self.zoom_in - 2.0 * self.overlap).max(0.0)
    }
}

/// Timing buckets keyed by transition shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MotionConfig {
    pub zoom_in: Timing,
    pub zoom_out: Timing,
    pub vertical_change: StagedTiming,
    pub horizontal_change: Timing,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            zoom_in: Timing {
                duration: 0.42,
                ease: EasingType::EaseInOut,
            },
            zoom_out: Timing {
                duration: 0.32,
                ease: EasingType::EaseInOut,
            },
            vertical_change: StagedTiming {
                zoom_out: 0.26,
                pan: 0.36,
                zoom_in: 0.26,
                overlap: 0.06,
                ease: EasingType::EaseInOut,
            },
            horizontal_change: Timing {
                duration: 0.38,
                ease: EasingType::EaseOut,
            },
        }
    }
}

/// Zoom toggle gating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: f64,
}

fn default_cooldown_ms() -> f64 {
    250.0
}

impl Default for ToggleConfig {
    fn default() -> Self {
        ToggleConfig {
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Wheel policy thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollConfig {
    /// Vertical deltas below this magnitude are treated as noise.
    #[serde(default = "default_min_delta_y")]
    pub min_delta_y: f64,
}

fn default_min_delta_y() -> f64 {
    4.0
}

impl Default for ScrollConfig {
    fn default() -> Self {
        ScrollConfig {
            min_delta_y: default_min_delta_y(),
        }
    }
}

/// Engine configuration passed from JS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub rows: Vec<Row>,
    pub grid: Option<GridShape>,
    pub viewport: Option<Viewport>,
    pub geometry: GeometryConfig,
    pub gestures: GestureConfig,
    pub motion: MotionConfig,
    pub toggle: ToggleConfig,
    pub scroll: ScrollConfig,
    pub immediate: bool,
    pub initial_focus: Option<FocusState>,
}

impl EngineConfig {
    /// Explicit grid, or four columns and enough rows for every content row.
    pub fn grid_shape(&self) -> GridShape {
        self.grid
            .unwrap_or_else(|| GridShape::for_rows(self.rows.len()))
    }

    /// Explicit initial focus, else the first hero row, else the first row, else the grid.
    pub fn start_focus(&self) -> FocusState {
        if let Some(focus) = &self.initial_focus {
            return focus.clone();
        }
        self.rows
            .iter()
            .find(|row| row.kind == RowKind::Hero)
            .or_else(|| self.rows.first())
            .map(|row| FocusState::row(row.slug.clone(), None))
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_rows(&self.rows)?;
        if let Some(grid) = self.grid {
            if grid.columns == 0 || grid.rows == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "grid must have at least one column and row, got {}x{}",
                    grid.columns, grid.rows
                )));
            }
        }
        let clamps = [
            ("gutterX", &self.geometry.gutter_x),
            ("gutterY", &self.geometry.gutter_y),
            ("gridScale", &self.geometry.grid_scale),
        ];
        for (name, clamp) in clamps {
            if clamp.max_viewport <= clamp.min_viewport {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}: maxViewport must exceed minViewport"
                )));
            }
        }
        if self.geometry.grid_scale.min <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "gridScale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

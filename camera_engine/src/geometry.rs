// Responsive world geometry: every tile is one viewport plus a gutter.
// Pure functions of (config, viewport); `Geometry` adds a live viewport and a gutter memo.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::content::GridShape;
use crate::types::*;

/// Horizontal and vertical gutter between tiles, in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gutters {
    pub gx: f64,
    pub gy: f64,
}

/// Width/height pair in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Fluid value: `min` below `min_viewport`, `max` above `max_viewport`, linear between.
pub fn responsive_clamp(config: &ClampConfig, viewport: Viewport) -> f64 {
    let span = config.max_viewport - config.min_viewport;
    if span <= 0.0 {
        return if viewport.vw >= config.max_viewport {
            config.max
        } else {
            config.min
        };
    }
    let t = ((viewport.vw - config.min_viewport) / span).clamp(0.0, 1.0);
    config.min + (config.max - config.min) * t
}

pub fn gutters(config: &GeometryConfig, viewport: Viewport) -> Gutters {
    Gutters {
        gx: responsive_clamp(&config.gutter_x, viewport),
        gy: responsive_clamp(&config.gutter_y, viewport),
    }
}

pub fn tile_size(viewport: Viewport) -> Size {
    Size {
        width: viewport.vw,
        height: viewport.vh,
    }
}

/// Distance between the origins of neighbouring tiles.
pub fn tile_spacing(config: &GeometryConfig, viewport: Viewport) -> Point {
    let g = gutters(config, viewport);
    Point::new(viewport.vw + g.gx, viewport.vh + g.gy)
}

pub fn tile_origin(config: &GeometryConfig, viewport: Viewport, col: usize, row: usize) -> Point {
    let spacing = tile_spacing(config, viewport);
    Point::new(col as f64 * spacing.x, row as f64 * spacing.y)
}

pub fn tile_center(config: &GeometryConfig, viewport: Viewport, col: usize, row: usize) -> Point {
    let origin = tile_origin(config, viewport, col, row);
    Point::new(origin.x + viewport.vw / 2.0, origin.y + viewport.vh / 2.0)
}

/// Zoom factor of the zoomed-out grid view.
pub fn grid_scale(config: &GeometryConfig, viewport: Viewport) -> f64 {
    responsive_clamp(&config.grid_scale, viewport)
}

/// Full grid footprint, gutters between tiles only.
pub fn grid_size(config: &GeometryConfig, shape: GridShape, viewport: Viewport) -> Size {
    let g = gutters(config, viewport);
    let columns = f64::from(shape.columns.max(1));
    let rows = f64::from(shape.rows.max(1));
    Size {
        width: columns * viewport.vw + (columns - 1.0) * g.gx,
        height: rows * viewport.vh + (rows - 1.0) * g.gy,
    }
}

/// Camera placing the tile's center at the viewport center, at scale 1.
pub fn center_tile(config: &GeometryConfig, viewport: Viewport, col: usize, row: usize) -> CameraState {
    let center = tile_center(config, viewport, col, row);
    CameraState::new(
        center.x - viewport.vw / 2.0,
        center.y - viewport.vh / 2.0,
        1.0,
    )
}

pub fn center_row(
    config: &GeometryConfig,
    viewport: Viewport,
    row_index: usize,
    tile_index: Option<usize>,
) -> CameraState {
    center_tile(config, viewport, tile_index.unwrap_or(0), row_index)
}

/// Frames the grid at `grid_scale`.
///
/// Without an anchor the grid is centred on both axes. With an anchor (world
/// pixels, usually a tile center) each axis keeps the anchor as close to
/// centred as the grid edges allow; an axis where the scaled grid is smaller
/// than the viewport ignores the anchor and centres the grid instead.
pub fn center_grid(
    config: &GeometryConfig,
    shape: GridShape,
    viewport: Viewport,
    anchor: Option<Point>,
) -> CameraState {
    let scale = grid_scale(config, viewport);
    let size = grid_size(config, shape, viewport);
    let (x, y) = match anchor {
        None => (
            centered_axis(viewport.vw, size.width, scale),
            centered_axis(viewport.vh, size.height, scale),
        ),
        Some(anchor) => (
            anchored_axis(anchor.x, viewport.vw, size.width, scale),
            anchored_axis(anchor.y, viewport.vh, size.height, scale),
        ),
    };
    CameraState::new(x, y, scale)
}

fn centered_axis(viewport_len: f64, content_len: f64, scale: f64) -> f64 {
    -(viewport_len - content_len * scale) / 2.0
}

fn anchored_axis(anchor: f64, viewport_len: f64, content_len: f64, scale: f64) -> f64 {
    if content_len * scale < viewport_len {
        return centered_axis(viewport_len, content_len, scale);
    }
    let visible = viewport_len / scale;
    let max = (content_len - visible).max(0.0);
    (anchor - visible / 2.0).clamp(0.0, max)
}

/// Source of the current viewport size.
pub trait ViewportProvider {
    fn viewport(&self) -> Viewport;
}

/// A viewport the host updates on resize. Starts at the fallback size.
#[derive(Debug, Default)]
pub struct FixedViewport {
    current: Cell<Option<Viewport>>,
}

impl FixedViewport {
    pub fn new(initial: Option<Viewport>) -> Self {
        FixedViewport {
            current: Cell::new(initial),
        }
    }

    pub fn set(&self, viewport: Viewport) {
        self.current.set(Some(viewport));
    }
}

impl ViewportProvider for FixedViewport {
    fn viewport(&self) -> Viewport {
        self.current.get().unwrap_or(Viewport::FALLBACK)
    }
}

/// Live geometry over a viewport provider, memoizing gutters per viewport size.
pub struct Geometry<P: ViewportProvider> {
    config: GeometryConfig,
    provider: P,
    gutter_cache: Cell<Option<(ViewportKey, Gutters)>>,
}

type ViewportKey = (u64, u64);

fn viewport_key(viewport: Viewport) -> ViewportKey {
    (viewport.vw.to_bits(), viewport.vh.to_bits())
}

impl<P: ViewportProvider> Geometry<P> {
    pub fn new(config: GeometryConfig, provider: P) -> Self {
        Geometry {
            config,
            provider,
            gutter_cache: Cell::new(None),
        }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn viewport(&self) -> Viewport {
        self.provider.viewport()
    }

    /// Gutters for `viewport`, or for the live viewport (memoized) when `None`.
    pub fn gutters(&self, viewport: Option<Viewport>) -> Gutters {
        if let Some(viewport) = viewport {
            return gutters(&self.config, viewport);
        }
        let viewport = self.viewport();
        let key = viewport_key(viewport);
        if let Some((cached_key, cached)) = self.gutter_cache.get() {
            if cached_key == key {
                return cached;
            }
        }
        let computed = gutters(&self.config, viewport);
        self.gutter_cache.set(Some((key, computed)));
        computed
    }

    pub fn is_memoized(&self) -> bool {
        matches!(self.gutter_cache.get(), Some((key, _)) if key == viewport_key(self.viewport()))
    }

    pub fn grid_scale(&self) -> f64 {
        grid_scale(&self.config, self.viewport())
    }

    pub fn grid_size(&self, shape: GridShape) -> Size {
        grid_size(&self.config, shape, self.viewport())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: Viewport = Viewport { vw: 375.0, vh: 667.0 };
    const MID: Viewport = Viewport { vw: 1200.0, vh: 800.0 };
    const LARGE: Viewport = Viewport { vw: 1600.0, vh: 900.0 };

    fn config() -> GeometryConfig {
        GeometryConfig::default()
    }

    #[test]
    fn clamp_hits_breakpoints() {
        let clamp = ClampConfig::new(12.0, 48.0, 360.0, 1440.0);
        let small = responsive_clamp(&clamp, SMALL);
        assert!((12.0..14.0).contains(&small));
        assert!((responsive_clamp(&clamp, LARGE) - 48.0).abs() < 1e-9);
        assert_eq!(responsive_clamp(&clamp, Viewport::new(100.0, 100.0)), 12.0);
    }

    #[test]
    fn gutters_scale_with_width() {
        let small = gutters(&config(), SMALL);
        let large = gutters(&config(), LARGE);
        assert!(small.gx < large.gx);
        assert!(small.gy < large.gy);
    }

    #[test]
    fn grid_scale_is_bounded() {
        let narrow = grid_scale(&config(), SMALL);
        assert!((0.28..0.29).contains(&narrow));
        assert!((grid_scale(&config(), LARGE) - 0.42).abs() < 1e-3);
    }

    #[test]
    fn tile_origins_use_spacing() {
        let spacing = tile_spacing(&config(), MID);
        let origin = tile_origin(&config(), MID, 2, 1);
        assert!(spacing.x > MID.vw);
        assert!(spacing.y > MID.vh);
        assert!((origin.x - spacing.x * 2.0).abs() < 1e-9);
        assert!((origin.y - spacing.y).abs() < 1e-9);
    }

    #[test]
    fn center_tile_is_unit_scale_at_origin() {
        let camera = center_tile(&config(), MID, 1, 1);
        let spacing = tile_spacing(&config(), MID);
        assert_eq!(camera.scale, 1.0);
        assert!((camera.x - spacing.x).abs() < 1e-9);
        assert!((camera.y - spacing.y).abs() < 1e-9);
    }

    #[test]
    fn center_row_defaults_to_first_tile() {
        assert_eq!(
            center_row(&config(), MID, 2, None),
            center_tile(&config(), MID, 0, 2)
        );
    }

    #[test]
    fn grid_footprint_and_centering() {
        let shape = GridShape::new(3, 2);
        let size = grid_size(&config(), shape, MID);
        let camera = center_grid(&config(), shape, MID, None);
        assert!(size.width > MID.vw);
        assert!(size.height > MID.vh);
        assert!((camera.scale - grid_scale(&config(), MID)).abs() < 1e-9);
        assert!(camera.x < size.width);
        assert!(camera.y < size.height);
    }

    #[test]
    fn anchored_grid_clamps_to_edges() {
        let shape = GridShape::new(3, 2);
        let spacing = tile_spacing(&config(), MID);
        let anchor = Point::new(spacing.x * 2.0 + MID.vw / 2.0, spacing.y + MID.vh / 2.0);
        let camera = center_grid(&config(), shape, MID, Some(anchor));
        let scale = grid_scale(&config(), MID);
        let size = grid_size(&config(), shape, MID);
        let max_x = (size.width - MID.vw / scale).max(0.0);
        let expected_x = (anchor.x - MID.vw / (scale * 2.0)).clamp(0.0, max_x);
        assert!((camera.scale - scale).abs() < 1e-9);
        assert!((camera.x - expected_x).abs() < 1e-9);
    }

    #[test]
    fn narrow_axis_ignores_anchor() {
        let shape = GridShape::new(3, 1);
        let viewport = Viewport::FALLBACK;
        let scale = grid_scale(&config(), viewport);
        let size = grid_size(&config(), shape, viewport);
        let scaled_height = size.height * scale;
        assert!(scaled_height < viewport.vh);
        for anchor_y in [0.0, 450.0, 5000.0] {
            let camera = center_grid(&config(), shape, viewport, Some(Point::new(0.0, anchor_y)));
            assert!((camera.y - (-(viewport.vh - scaled_height) / 2.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn narrow_columns_ignore_anchor_x() {
        let shape = GridShape::new(1, 3);
        let viewport = Viewport::FALLBACK;
        let scale = grid_scale(&config(), viewport);
        let size = grid_size(&config(), shape, viewport);
        let scaled_width = size.width * scale;
        assert!(scaled_width < viewport.vw);
        assert!(size.height * scale > viewport.vh);
        for anchor_x in [0.0, 720.0, 9000.0] {
            let camera = center_grid(&config(), shape, viewport, Some(Point::new(anchor_x, 1200.0)));
            assert!((camera.x - (-(viewport.vw - scaled_width) / 2.0)).abs() < 1e-9);
            assert!(camera.y >= 0.0);
        }
    }

    #[test]
    fn geometry_memoizes_per_viewport() {
        let geometry = Geometry::new(config(), FixedViewport::new(None));
        assert!(!geometry.is_memoized());
        let first = geometry.gutters(None);
        assert!(geometry.is_memoized());
        assert_eq!(first, geometry.gutters(None));
        assert_eq!(first, gutters(&config(), Viewport::FALLBACK));

        geometry.provider().set(SMALL);
        assert!(!geometry.is_memoized());
        assert_eq!(geometry.gutters(None), gutters(&config(), SMALL));
    }

    #[test]
    fn explicit_viewport_bypasses_memo() {
        let geometry = Geometry::new(config(), FixedViewport::new(None));
        assert_eq!(geometry.gutters(Some(LARGE)), gutters(&config(), LARGE));
        assert!(!geometry.is_memoized());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Gutters sit at `min` below the clamp range, `max` above it,
            /// and strictly increase inside it.
            #[test]
            fn gutters_are_monotonic(a in 1.0f64..3000.0, b in 1.0f64..3000.0) {
                let config = GeometryConfig::default();
                let clamp = config.gutter_x;
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let g_lo = gutters(&config, Viewport::new(lo, 800.0)).gx;
                let g_hi = gutters(&config, Viewport::new(hi, 800.0)).gx;

                if lo <= clamp.min_viewport {
                    prop_assert_eq!(g_lo, clamp.min);
                }
                if hi >= clamp.max_viewport {
                    prop_assert_eq!(g_hi, clamp.max);
                }
                prop_assert!(g_lo <= g_hi);
                if hi - lo > 1e-3 && hi > clamp.min_viewport && lo < clamp.max_viewport {
                    prop_assert!(g_lo < g_hi);
                }
            }

            /// Anchored grid cameras never scroll past the grid edges on wide axes.
            #[test]
            fn anchored_camera_stays_in_bounds(
                ax in -5000.0f64..20000.0,
                ay in -5000.0f64..20000.0,
                columns in 1u32..6,
                rows in 1u32..6,
                vw in 320.0f64..2560.0,
            ) {
                let config = GeometryConfig::default();
                let viewport = Viewport::new(vw, vw * 0.6);
                let shape = GridShape::new(columns, rows);
                let camera = center_grid(&config, shape, viewport, Some(Point::new(ax, ay)));
                let size = grid_size(&config, shape, viewport);
                if size.width * camera.scale >= viewport.vw {
                    prop_assert!(camera.x >= 0.0);
                    prop_assert!(camera.x <= size.width - viewport.vw / camera.scale + 1e-9);
                }
                if size.height * camera.scale >= viewport.vh {
                    prop_assert!(camera.y >= 0.0);
                    prop_assert!(camera.y <= size.height - viewport.vh / camera.scale + 1e-9);
                }
            }
        }
    }
}

//! Viewport (camera window) and the pan/zoom controller.

use crate::transform::TransformSnapshot;
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Factors closer to 1 than this are treated as "no zoom change".
const ZOOM_EPSILON: f64 = 1e-4;

/// The visible world-space rectangle, i.e. an SVG view box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1000.0, 1000.0)
    }
}

impl Viewport {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A window of the given size centred on the world origin.
    pub fn centered(size: Size) -> Self {
        Self::new(-size.width / 2.0, -size.height / 2.0, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_origin_size(self.origin(), self.size())
    }

    /// Same size, different origin.
    pub fn with_origin(&self, origin: Point) -> Self {
        Self::new(origin.x, origin.y, self.width, self.height)
    }

    /// Positive, finite size.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// Direction of a discrete zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirection {
    In,
    Out,
}

/// Owns the camera window.
///
/// Keeps two tiers: `committed` is the authoritative viewport the declarative
/// render path reads; `transient` follows the pointer during a pan and is
/// folded into `committed` by [`ViewportController::commit`].
#[derive(Debug, Clone)]
pub struct ViewportController {
    committed: Viewport,
    transient: Viewport,
    /// Window restored by [`ViewportController::reset`].
    initial: Viewport,
    zoom: f64,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(Viewport::default(), 0.1, 5.0, 0.2)
    }
}

impl ViewportController {
    /// Create a controller showing `initial` at zoom 1.
    pub fn new(initial: Viewport, min_zoom: f64, max_zoom: f64, zoom_step: f64) -> Self {
        Self {
            committed: initial,
            transient: initial,
            initial,
            zoom: 1.0,
            min_zoom,
            max_zoom,
            zoom_step,
        }
    }

    /// Authoritative viewport.
    pub fn committed(&self) -> Viewport {
        self.committed
    }

    /// Viewport including any in-progress pan.
    pub fn transient(&self) -> Viewport {
        self.transient
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn zoom_limits(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    /// Whether the transient tier has diverged from the committed one.
    pub fn has_pending_pan(&self) -> bool {
        self.transient != self.committed
    }

    /// Move the transient window so that `world_delta` (pointer displacement
    /// since the pan started) is cancelled out.
    ///
    /// The origin moves opposite to the pointer, so the world point grabbed at
    /// pointer-down stays under the pointer.
    pub fn pan_to(&mut self, origin_at_start: Point, world_delta: Vec2) -> Viewport {
        self.transient = self.committed.with_origin(origin_at_start - world_delta);
        self.transient
    }

    /// [`ViewportController::pan_to`] with a screen-space delta converted
    /// through the session's snapshot.
    pub fn pan_by_screen(
        &mut self,
        origin_at_start: Point,
        screen_delta: Vec2,
        snapshot: &TransformSnapshot,
    ) -> Viewport {
        self.pan_to(origin_at_start, snapshot.delta_to_world(screen_delta))
    }

    /// Fold the transient window into the committed one.
    pub fn commit(&mut self) -> Viewport {
        self.committed = self.transient;
        self.committed
    }

    /// Drop the transient window.
    pub fn discard(&mut self) {
        self.transient = self.committed;
    }

    /// Zoom one step in or out around the centre of the window.
    ///
    /// Returns `true` when the viewport changed.
    pub fn zoom_step(&mut self, direction: ZoomDirection) -> bool {
        let factor = match direction {
            ZoomDirection::In => 1.0 + self.zoom_step,
            ZoomDirection::Out => 1.0 - self.zoom_step,
        };
        let center = self.committed.center();
        self.apply_zoom(factor, center)
    }

    /// Zoom by `factor`, keeping `anchor` (world space) at the same relative
    /// position inside the window.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) -> bool {
        self.apply_zoom(factor, anchor)
    }

    fn apply_zoom(&mut self, factor: f64, anchor: Point) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        let actual = new_zoom / self.zoom;
        if (actual - 1.0).abs() < ZOOM_EPSILON {
            return false;
        }

        let Viewport { x, y, width, height } = self.committed;
        let next = Viewport::new(
            anchor.x - (anchor.x - x) / actual,
            anchor.y - (anchor.y - y) / actual,
            width / actual,
            height / actual,
        );

        log::debug!("zoom {:.3} -> {:.3}", self.zoom, new_zoom);
        self.committed = next;
        self.transient = next;
        self.zoom = new_zoom;
        true
    }

    /// Restore the initial window at zoom 1.
    pub fn reset(&mut self) {
        self.committed = self.initial;
        self.transient = self.initial;
        self.zoom = 1.0;
    }

    /// Centre a background of the given natural size on the world origin and
    /// make that window the reset target.
    pub fn fit_background(&mut self, size: Size) -> bool {
        let viewport = Viewport::centered(size);
        if !viewport.is_valid() {
            return false;
        }
        self.initial = viewport;
        self.committed = viewport;
        self.transient = viewport;
        true
    }
}

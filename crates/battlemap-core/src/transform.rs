//! Screen-to-world coordinate conversion.
//!
//! A [`TransformSnapshot`] is captured once when a gesture starts and reused
//! for every pointer event of that gesture, so the gesture's math stays
//! stable even while the gesture itself moves the viewport.

use crate::viewport::Viewport;
use kurbo::{Affine, Point, Rect, Vec2};

/// Screen-to-world mapping for one surface layout and one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSnapshot {
    screen_to_world: Affine,
}

impl TransformSnapshot {
    /// Capture the mapping for `viewport` rendered into the screen rectangle
    /// `surface`.
    ///
    /// The view box is scaled uniformly to fit and centred on both axes
    /// (`xMidYMid meet`). Returns `None` if either rectangle is empty.
    pub fn capture(viewport: &Viewport, surface: Rect) -> Option<Self> {
        if !viewport.is_valid() || surface.width() <= 0.0 || surface.height() <= 0.0 {
            return None;
        }

        let scale = (surface.width() / viewport.width).min(surface.height() / viewport.height);
        let tx = surface.x0 + (surface.width() - viewport.width * scale) / 2.0 - viewport.x * scale;
        let ty = surface.y0 + (surface.height() - viewport.height * scale) / 2.0 - viewport.y * scale;
        let world_to_screen = Affine::translate(Vec2::new(tx, ty)) * Affine::scale(scale);

        Some(Self {
            screen_to_world: world_to_screen.inverse(),
        })
    }

    /// The screen-to-world affine.
    pub fn affine(&self) -> Affine {
        self.screen_to_world
    }

    /// Convert a screen point to world coordinates.
    pub fn to_world(&self, screen: Point) -> Point {
        self.screen_to_world * screen
    }

    /// Convert a screen-space displacement to a world-space displacement.
    pub fn delta_to_world(&self, delta: Vec2) -> Vec2 {
        self.to_world(delta.to_point()) - self.to_world(Point::ZERO)
    }
}

/// Convert a pointer position to world space.
///
/// Without a snapshot this returns the origin: callers outside an active
/// gesture have broken the contract, and the canvas never surfaces that as
/// an error.
pub fn to_world(screen: Point, snapshot: Option<&TransformSnapshot>) -> Point {
    match snapshot {
        Some(snapshot) => snapshot.to_world(screen),
        None => {
            log::debug!("to_world called without a transform snapshot");
            Point::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
    }

    #[test]
    fn test_identity_when_sizes_match() {
        let snap = TransformSnapshot::capture(&Viewport::default(), Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap();
        assert!(close(snap.to_world(Point::new(123.0, 456.0)), Point::new(123.0, 456.0)));
    }

    #[test]
    fn test_surface_offset_and_scale() {
        // Surface at (100, 50), twice the size of the view box.
        let viewport = Viewport::new(-250.0, -250.0, 500.0, 500.0);
        let snap = TransformSnapshot::capture(&viewport, Rect::new(100.0, 50.0, 1100.0, 1050.0)).unwrap();

        assert!(close(snap.to_world(Point::new(100.0, 50.0)), Point::new(-250.0, -250.0)));
        assert!(close(snap.to_world(Point::new(600.0, 550.0)), Point::ZERO));
        assert!(close(snap.to_world(Point::new(1100.0, 1050.0)), Point::new(250.0, 250.0)));
    }

    #[test]
    fn test_letterboxing_centres_view_box() {
        // Wide surface: view box is pillarboxed horizontally.
        let snap = TransformSnapshot::capture(&Viewport::default(), Rect::new(0.0, 0.0, 2000.0, 1000.0)).unwrap();
        assert!(close(snap.to_world(Point::new(500.0, 0.0)), Point::ZERO));
        assert!(close(snap.to_world(Point::new(1000.0, 500.0)), Point::new(500.0, 500.0)));
    }

    #[test]
    fn test_roundtrip() {
        let viewport = Viewport::new(33.0, -71.0, 640.0, 480.0);
        let snap = TransformSnapshot::capture(&viewport, Rect::new(12.0, 40.0, 812.0, 640.0)).unwrap();
        let screen = Point::new(300.0, 222.0);
        assert!(close(snap.affine().inverse() * snap.to_world(screen), screen));
    }

    #[test]
    fn test_delta_ignores_translation() {
        let viewport = Viewport::new(5000.0, 5000.0, 500.0, 500.0);
        let snap = TransformSnapshot::capture(&viewport, Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap();
        let delta = snap.delta_to_world(Vec2::new(40.0, -20.0));
        assert!((delta.x - 20.0).abs() < EPS);
        assert!((delta.y + 10.0).abs() < EPS);
    }

    #[test]
    fn test_empty_surface_has_no_snapshot() {
        assert!(TransformSnapshot::capture(&Viewport::default(), Rect::ZERO).is_none());
        assert!(TransformSnapshot::capture(&Viewport::new(0.0, 0.0, 0.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn test_missing_snapshot_returns_origin() {
        assert_eq!(to_world(Point::new(42.0, 17.0), None), Point::ZERO);
    }
}

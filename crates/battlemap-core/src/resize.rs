//! Corner-handle resizing of elements.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Corner handle positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    #[serde(rename = "nw")]
    TopLeft,
    #[serde(rename = "ne")]
    TopRight,
    #[serde(rename = "sw")]
    BottomLeft,
    #[serde(rename = "se")]
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Position of this corner on `rect`.
    pub fn position(self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
        }
    }

    /// Square handle of edge length `size` centred on the corner.
    pub fn handle_rect(self, rect: Rect, size: f64) -> Rect {
        Rect::from_center_size(self.position(rect), (size, size))
    }
}

/// Resize `start` by dragging `corner` by `delta`.
///
/// The opposite corner stays fixed and neither side drops below `min_size`.
pub fn resize_rect(start: Rect, corner: Corner, delta: Vec2, min_size: f64) -> Rect {
    let (w0, h0) = (start.width(), start.height());
    let grow_right = matches!(corner, Corner::TopRight | Corner::BottomRight);
    let grow_down = matches!(corner, Corner::BottomLeft | Corner::BottomRight);

    let width = if grow_right { w0 + delta.x } else { w0 - delta.x }.max(min_size);
    let height = if grow_down { h0 + delta.y } else { h0 - delta.y }.max(min_size);
    let x = if grow_right { start.x0 } else { start.x0 + (w0 - width) };
    let y = if grow_down { start.y0 } else { start.y0 + (h0 - height) };

    Rect::from_origin_size((x, y), (width, height))
}

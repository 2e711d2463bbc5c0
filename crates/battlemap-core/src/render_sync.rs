//! Transient rendering during gestures.
//!
//! While a gesture runs, the engine writes straight to the render surface
//! instead of going through the host's declarative render path, and pan
//! updates are coalesced to one surface write per animation frame. The
//! committed state is rendered declaratively once the host applies the
//! gesture's events.

use crate::board::{ElementId, TokenId};
use crate::mode::DrawStyle;
use crate::viewport::Viewport;
use kurbo::{Point, Rect};

/// Imperative operations on the rendered map.
///
/// Positions are absolute world coordinates; the surface works out the
/// translation from the committed position it last rendered.
pub trait RenderSurface {
    /// Screen rectangle the map occupies.
    fn bounds(&self) -> Rect;
    fn set_view_box(&mut self, viewport: Viewport);
    fn show_draw_preview(&mut self, rect: Rect, style: &DrawStyle);
    fn update_draw_preview(&mut self, rect: Rect);
    fn remove_draw_preview(&mut self);
    /// Move a token's group, selection ring included.
    fn translate_token(&mut self, id: TokenId, position: Point);
    fn translate_element(&mut self, id: ElementId, origin: Point);
    fn reshape_element(&mut self, id: ElementId, rect: Rect);
    fn translate_preview_element(&mut self, origin: Point);
}

/// Result of staging a view box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// The host should request an animation frame.
    Schedule,
    /// A frame is already pending; nothing to do.
    Pending,
}

/// Transient render tier.
#[derive(Debug, Clone, Default)]
pub struct RenderSync {
    staged_view_box: Option<Viewport>,
    frame_pending: bool,
    draw_rect: Option<Rect>,
    drag_position: Option<Point>,
}

impl RenderSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a view box for the next frame, replacing any staged one.
    pub fn stage_view_box(&mut self, viewport: Viewport) -> FrameRequest {
        self.staged_view_box = Some(viewport);
        if self.frame_pending {
            FrameRequest::Pending
        } else {
            self.frame_pending = true;
            FrameRequest::Schedule
        }
    }

    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn staged_view_box(&self) -> Option<Viewport> {
        self.staged_view_box
    }

    /// Animation frame callback: write the latest staged view box.
    pub fn flush_frame<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> Option<Viewport> {
        self.frame_pending = false;
        let viewport = self.staged_view_box.take()?;
        surface.set_view_box(viewport);
        Some(viewport)
    }

    pub fn show_draw_preview<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, rect: Rect, style: &DrawStyle) {
        self.draw_rect = Some(rect);
        surface.show_draw_preview(rect, style);
    }

    pub fn update_draw_preview<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, rect: Rect) {
        if self.draw_rect.is_some() {
            self.draw_rect = Some(rect);
            surface.update_draw_preview(rect);
        }
    }

    pub fn remove_draw_preview<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.draw_rect.take().is_some() {
            surface.remove_draw_preview();
        }
    }

    pub fn draw_rect(&self) -> Option<Rect> {
        self.draw_rect
    }

    pub fn move_token<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, id: TokenId, position: Point) {
        self.drag_position = Some(position);
        surface.translate_token(id, position);
    }

    pub fn move_element<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, id: ElementId, origin: Point) {
        self.drag_position = Some(origin);
        surface.translate_element(id, origin);
    }

    pub fn move_preview<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, origin: Point) {
        self.drag_position = Some(origin);
        surface.translate_preview_element(origin);
    }

    pub fn reshape_element<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, id: ElementId, rect: Rect) {
        self.drag_position = Some(rect.origin());
        surface.reshape_element(id, rect);
    }

    /// Last position written by a drag.
    pub fn drag_position(&self) -> Option<Point> {
        self.drag_position
    }

    /// Drop all pending transient work.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}


#[cfg(test)]
mod tests {
    use super::recording::{RecordingSurface, SurfaceOp};
    use super::*;

    #[test]
    fn test_one_frame_per_burst() {
        let mut sync = RenderSync::new();
        let mut surface = RecordingSurface::default();

        assert_eq!(sync.stage_view_box(Viewport::new(1.0, 0.0, 10.0, 10.0)), FrameRequest::Schedule);
        for i in 2..20 {
            assert_eq!(sync.stage_view_box(Viewport::new(i as f64, 0.0, 10.0, 10.0)), FrameRequest::Pending);
        }

        assert_eq!(sync.flush_frame(&mut surface), Some(Viewport::new(19.0, 0.0, 10.0, 10.0)));
        assert_eq!(surface.view_box_writes(), 1);
        assert_eq!(sync.stage_view_box(Viewport::default()), FrameRequest::Schedule);
    }

    #[test]
    fn test_flush_without_staged_view_box() {
        let mut sync = RenderSync::new();
        let mut surface = RecordingSurface::default();
        assert_eq!(sync.flush_frame(&mut surface), None);
        assert!(surface.ops.is_empty());
    }

    #[test]
    fn test_clear_drops_pending_frame() {
        let mut sync = RenderSync::new();
        let mut surface = RecordingSurface::default();
        sync.stage_view_box(Viewport::default());
        sync.clear();
        assert!(!sync.frame_pending());
        assert_eq!(sync.flush_frame(&mut surface), None);
        assert_eq!(surface.view_box_writes(), 0);
    }

    #[test]
    fn test_draw_preview_lifecycle() {
        let mut sync = RenderSync::new();
        let mut surface = RecordingSurface::default();
        let style = DrawStyle::default();

        // Updates before show are ignored.
        sync.update_draw_preview(&mut surface, Rect::new(0.0, 0.0, 1.0, 1.0));
        sync.show_draw_preview(&mut surface, Rect::new(5.0, 5.0, 5.0, 5.0), &style);
        sync.update_draw_preview(&mut surface, Rect::new(5.0, 5.0, 30.0, 40.0));
        sync.remove_draw_preview(&mut surface);
        sync.remove_draw_preview(&mut surface);

        assert_eq!(
            surface.ops,
            vec![
                SurfaceOp::ShowDraw(Rect::new(5.0, 5.0, 5.0, 5.0)),
                SurfaceOp::UpdateDraw(Rect::new(5.0, 5.0, 30.0, 40.0)),
                SurfaceOp::RemoveDraw,
            ]
        );
        assert!(sync.draw_rect().is_none());
    }

    #[test]
    fn test_drag_position_tracks_last_write() {
        let mut sync = RenderSync::new();
        let mut surface = RecordingSurface::default();
        sync.move_token(&mut surface, 1, Point::new(10.0, 10.0));
        sync.move_token(&mut surface, 1, Point::new(20.0, 15.0));
        assert_eq!(sync.drag_position(), Some(Point::new(20.0, 15.0)));
        assert_eq!(surface.ops.last(), Some(&SurfaceOp::Token(1, Point::new(20.0, 15.0))));
    }
}

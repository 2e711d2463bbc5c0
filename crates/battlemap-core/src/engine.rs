//! The battle map engine.
//!
//! [`BattleMap`] ties the viewport, modes, gestures and the transient render
//! tier together. Hosts feed it pointer, keyboard and toolbar input and apply
//! the returned [`MapEvent`]s to their own data, which they then hand back
//! through the setters.

use crate::board::{Background, Board, Element, ElementDraft, ElementId, Entity, HitTarget, Token, TokenId};
use crate::config::MapConfig;
use crate::gesture::{Gesture, GestureError, GestureMachine, GestureResult, ListenerRegistry, normalize_rect};
use crate::input::{InputState, KeyEvent, Modifiers, MouseButton, PointerEvent};
use crate::mode::{DrawStyle, Mode};
use crate::render_sync::{FrameRequest, RenderSurface, RenderSync};
use crate::resize::resize_rect;
use crate::transform::TransformSnapshot;
use crate::viewport::{Viewport, ViewportController, ZoomDirection};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Changes proposed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MapEvent {
    ElementDrawn(ElementDraft),
    TokenMoved(Token),
    ElementMoved(Element),
    PreviewMoved(ElementDraft),
    TokenSelected(Option<Token>),
    ElementClicked(ElementId),
    ViewportChanged(Viewport),
    ToggleAside,
    /// Call [`BattleMap::animation_frame`] on the next frame.
    FrameRequested,
}

/// Interactive battle map.
pub struct BattleMap<S: RenderSurface, L: ListenerRegistry> {
    config: MapConfig,
    board: Board,
    viewport: ViewportController,
    mode: Mode,
    draw_style: DrawStyle,
    selected_token: Option<TokenId>,
    resize_selected: Option<ElementId>,
    /// Resized element shown until the host's element list catches up.
    pending_resize: Option<Element>,
    gestures: GestureMachine<L>,
    sync: RenderSync,
    input: InputState,
    surface: Option<S>,
}

impl<S: RenderSurface, L: ListenerRegistry> BattleMap<S, L> {
    pub fn new(config: MapConfig, registry: L) -> Self {
        let viewport = ViewportController::new(
            config.default_viewport,
            config.min_zoom,
            config.max_zoom,
            config.zoom_step,
        );
        Self {
            config,
            board: Board::new(),
            viewport,
            mode: Mode::default(),
            draw_style: DrawStyle::default(),
            selected_token: None,
            resize_selected: None,
            pending_resize: None,
            gestures: GestureMachine::new(registry),
            sync: RenderSync::new(),
            input: InputState::new(),
            surface: None,
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn draw_style(&self) -> &DrawStyle {
        &self.draw_style
    }

    pub fn selected_token(&self) -> Option<&Token> {
        self.selected_token.and_then(|id| self.board.token(id))
    }

    pub fn resize_selected(&self) -> Option<ElementId> {
        self.resize_selected
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        self.gestures.session().map(|s| &s.gesture)
    }

    pub fn listeners(&self) -> &L {
        self.gestures.registry()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// The surface alongside the board, for hosts re-rendering committed
    /// state onto the mounted surface.
    pub fn surface_and_board(&mut self) -> (Option<&mut S>, &Board) {
        (self.surface.as_mut(), &self.board)
    }

    /// Element as it should be drawn, including an unconfirmed resize.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        match &self.pending_resize {
            Some(pending) if pending.id == id => Some(pending),
            _ => self.board.element(id),
        }
    }

    /// All elements as they should be drawn.
    pub fn elements(&self) -> Vec<Element> {
        self.board
            .elements
            .iter()
            .map(|e| self.element(e.id).unwrap_or(e).clone())
            .collect()
    }

    /// Hit test a screen position against the committed view.
    pub fn hit_test(&self, position: Point) -> HitTarget {
        match self.committed_snapshot() {
            Some(snapshot) => self.board.hit_test(
                snapshot.to_world(position),
                self.config.token_size,
                self.config.handle_size,
                self.resize_selected.and_then(|id| self.element(id)),
            ),
            None => HitTarget::Empty,
        }
    }

    fn committed_snapshot(&self) -> Option<TransformSnapshot> {
        let bounds = self.surface.as_ref()?.bounds();
        TransformSnapshot::capture(&self.viewport.committed(), bounds)
    }

    // --- Host inputs ---

    /// Attach the render surface and show the committed view box on it.
    pub fn mount(&mut self, mut surface: S) {
        surface.set_view_box(self.viewport.committed());
        self.surface = Some(surface);
    }

    /// Cancel any gesture and detach the surface.
    pub fn unmount(&mut self) -> Option<S> {
        self.cancel_gesture();
        self.surface.take()
    }

    pub fn set_elements(&mut self, elements: Vec<Element>) -> Vec<MapEvent> {
        self.board.set_elements(elements);

        let confirmed = self.pending_resize.as_ref().is_some_and(|pending| {
            self.board
                .element(pending.id)
                .is_none_or(|current| current.matches_rect(pending.rect()))
        });
        if confirmed {
            self.pending_resize = None;
        }
        if self.resize_selected.is_some_and(|id| self.board.element(id).is_none()) {
            self.resize_selected = None;
        }
        self.drop_unavailable_selection()
    }

    pub fn set_tokens(&mut self, tokens: Vec<Token>) -> Vec<MapEvent> {
        self.board.set_tokens(tokens);
        self.drop_unavailable_selection()
    }

    pub fn set_entities(&mut self, entities: Vec<Entity>) {
        self.board.set_entities(entities);
    }

    /// Host-driven selection; emits nothing.
    pub fn set_selected_token(&mut self, id: Option<TokenId>) {
        self.selected_token = id;
    }

    pub fn set_preview_element(&mut self, preview: Option<ElementDraft>) {
        self.board.preview = preview;
    }

    /// Replace the background. A new background re-fits the viewport so the
    /// image is centred on the world origin.
    pub fn set_background(&mut self, background: Option<Background>) -> Vec<MapEvent> {
        let size = background.as_ref().map(|b| b.size);
        self.board.background = background;

        let Some(size) = size else {
            return Vec::new();
        };
        if matches!(self.gesture(), Some(Gesture::Panning { .. })) {
            self.cancel_gesture();
        }
        if !self.viewport.fit_background(size) {
            log::debug!("background with empty size {:?} not fitted", size);
            return Vec::new();
        }
        self.show_committed_view_box()
    }

    pub fn set_draw_style(&mut self, style: DrawStyle) {
        self.draw_style = style;
    }

    // --- Pointer ---

    pub fn handle_pointer_event(&mut self, event: &PointerEvent) -> Vec<MapEvent> {
        match event {
            PointerEvent::Down {
                position,
                button,
                target,
            } => self.pointer_down(*position, *button, *target),
            PointerEvent::Move { position } => self.pointer_move(*position),
            PointerEvent::Up { position, .. } => self.pointer_up(*position),
            PointerEvent::Wheel {
                position,
                delta,
                modifiers,
            } => self.wheel(*position, *delta, *modifiers),
        }
    }

    pub fn pointer_down(&mut self, position: Point, button: MouseButton, target: HitTarget) -> Vec<MapEvent> {
        if button != MouseButton::Left {
            return Vec::new();
        }
        if self.gestures.is_active() {
            log::debug!("pointer down on {:?} ignored: {}", target, GestureError::AlreadyActive);
            return Vec::new();
        }
        if !target.is_element() {
            self.resize_selected = None;
        }
        if let Err(err) = self.start_gesture(position, target) {
            log::debug!("pointer down on {:?} ignored: {}", target, err);
        }
        Vec::new()
    }

    fn start_gesture(&mut self, position: Point, target: HitTarget) -> GestureResult<()> {
        if self.gestures.is_active() {
            return Err(GestureError::AlreadyActive);
        }
        let bounds = self.surface.as_ref().map(|s| s.bounds()).ok_or(GestureError::NoSurface)?;
        let snapshot =
            TransformSnapshot::capture(&self.viewport.committed(), bounds).ok_or(GestureError::EmptySurface)?;
        let world = snapshot.to_world(position);

        let gesture = match (self.mode, target) {
            (Mode::Pan, _) => Gesture::Panning {
                start_world: world,
                origin_at_start: self.viewport.committed().origin(),
            },
            (Mode::Draw, _) => Gesture::Drawing {
                start: world,
                current: world,
            },
            (Mode::Select, HitTarget::Token(id)) => {
                let token = self.board.token(id).cloned().ok_or(GestureError::UnknownToken(id))?;
                Gesture::DraggingToken {
                    anchor: world - token.coordinates,
                    position: token.coordinates,
                    token,
                }
            }
            (Mode::Select, HitTarget::Element(id)) => {
                let element = self.element(id).cloned().ok_or(GestureError::UnknownElement(id))?;
                Gesture::DraggingElement {
                    anchor: world - element.origin(),
                    position: element.origin(),
                    element,
                }
            }
            (Mode::Select, HitTarget::ResizeHandle(id, corner)) => {
                if self.resize_selected != Some(id) {
                    return Err(GestureError::NotResizable(id));
                }
                let element = self.element(id).cloned().ok_or(GestureError::UnknownElement(id))?;
                Gesture::Resizing {
                    rect: element.rect(),
                    element,
                    corner,
                    start_world: world,
                }
            }
            (Mode::Select, HitTarget::PreviewElement) => {
                let draft = self.board.preview.clone().ok_or(GestureError::NoPreviewElement)?;
                Gesture::DraggingPreview {
                    anchor: world - draft.origin(),
                    position: draft.origin(),
                    draft,
                }
            }
            (Mode::Select, HitTarget::Empty) => return Ok(()),
        };

        let session = self.gestures.begin(gesture, snapshot)?;
        if let (Gesture::Drawing { start, .. }, Some(surface)) = (&session.gesture, self.surface.as_mut()) {
            let rect = Rect::from_origin_size(*start, Size::ZERO);
            self.sync.show_draw_preview(surface, rect, &self.draw_style);
        }
        Ok(())
    }

    pub fn pointer_move(&mut self, position: Point) -> Vec<MapEvent> {
        let mut events = Vec::new();
        let Some(session) = self.gestures.session_mut() else {
            return events;
        };
        session.moved = true;
        let world = session.to_world(position);
        let Some(surface) = self.surface.as_mut() else {
            return events;
        };

        match &mut session.gesture {
            Gesture::Panning {
                start_world,
                origin_at_start,
            } => {
                let viewport = self.viewport.pan_to(*origin_at_start, world - *start_world);
                if self.sync.stage_view_box(viewport) == FrameRequest::Schedule {
                    events.push(MapEvent::FrameRequested);
                }
            }
            Gesture::Drawing { start, current } => {
                *current = world;
                self.sync.update_draw_preview(surface, normalize_rect(*start, world));
            }
            Gesture::DraggingToken {
                token,
                anchor,
                position,
            } => {
                *position = world - *anchor;
                self.sync.move_token(surface, token.id, *position);
            }
            Gesture::DraggingElement {
                element,
                anchor,
                position,
            } => {
                *position = world - *anchor;
                self.sync.move_element(surface, element.id, *position);
            }
            Gesture::DraggingPreview { anchor, position, .. } => {
                *position = world - *anchor;
                self.sync.move_preview(surface, *position);
            }
            Gesture::Resizing {
                element,
                corner,
                start_world,
                rect,
            } => {
                *rect = resize_rect(element.rect(), *corner, world - *start_world, self.config.resize_min_size);
                self.sync.reshape_element(surface, element.id, *rect);
            }
        }
        events
    }

    /// Finish the active gesture and commit its result.
    pub fn pointer_up(&mut self, position: Point) -> Vec<MapEvent> {
        let Some(session) = self.gestures.end() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        let moved = session.moved;

        match session.gesture {
            Gesture::Panning { .. } => {
                self.sync.clear();
                let viewport = self.viewport.commit();
                if let Some(surface) = self.surface.as_mut() {
                    surface.set_view_box(viewport);
                }
                log::info!("pan committed at ({:.1}, {:.1})", viewport.x, viewport.y);
                events.push(MapEvent::ViewportChanged(viewport));
            }
            Gesture::Drawing { start, .. } => {
                if let Some(surface) = self.surface.as_mut() {
                    self.sync.remove_draw_preview(surface);
                }
                self.mode = self.mode.finish_draw();

                let rect = normalize_rect(start, session.snapshot.to_world(position));
                let threshold = self.config.draw_threshold;
                if rect.width() > threshold && rect.height() > threshold {
                    let draft = ElementDraft {
                        x: rect.x0.round(),
                        y: rect.y0.round(),
                        width: rect.width().round(),
                        height: rect.height().round(),
                        color: self.draw_style.color.clone(),
                        icon: self.draw_style.icon.clone(),
                        name: self.draw_style.title.clone(),
                    };
                    log::info!("element drawn at ({}, {}) {}x{}", draft.x, draft.y, draft.width, draft.height);
                    events.push(MapEvent::ElementDrawn(draft));
                } else {
                    log::debug!("draw of {}x{} below threshold discarded", rect.width(), rect.height());
                }
            }
            Gesture::DraggingToken { token, position, .. } => {
                log::info!("token {} moved to ({:.1}, {:.1})", token.id, position.x, position.y);
                events.push(MapEvent::TokenMoved(token.with_coordinates(position)));
                if !moved {
                    events.extend(self.toggle_selection(token.id));
                }
            }
            Gesture::DraggingElement { element, position, .. } => {
                log::info!("element {} moved to ({:.1}, {:.1})", element.id, position.x, position.y);
                events.push(MapEvent::ElementMoved(element.with_origin(position)));
                if !moved {
                    self.resize_selected = Some(element.id);
                    events.push(MapEvent::ElementClicked(element.id));
                }
            }
            Gesture::DraggingPreview { draft, position, .. } => {
                if moved {
                    events.push(MapEvent::PreviewMoved(draft.with_origin(position)));
                }
            }
            Gesture::Resizing { element, rect, .. } => {
                if moved {
                    let resized = element.with_rect(rect);
                    log::info!("element {} resized to {}x{}", resized.id, resized.width, resized.height);
                    self.pending_resize = Some(resized.clone());
                    events.push(MapEvent::ElementMoved(resized));
                }
            }
        }

        self.sync.clear();
        events
    }

    /// Tear down the active gesture without committing it.
    ///
    /// Returns `true` if a gesture was cancelled.
    pub fn cancel_gesture(&mut self) -> bool {
        let Some(session) = self.gestures.end() else {
            return false;
        };
        self.viewport.discard();

        if let Some(surface) = self.surface.as_mut() {
            self.sync.remove_draw_preview(surface);
            match session.gesture {
                Gesture::Panning { .. } => surface.set_view_box(self.viewport.committed()),
                Gesture::Drawing { .. } => {}
                Gesture::DraggingToken { token, .. } => surface.translate_token(token.id, token.coordinates),
                Gesture::DraggingElement { element, .. } => surface.translate_element(element.id, element.origin()),
                Gesture::DraggingPreview { draft, .. } => surface.translate_preview_element(draft.origin()),
                Gesture::Resizing { element, .. } => surface.reshape_element(element.id, element.rect()),
            }
        }
        self.sync.clear();
        log::debug!("gesture {} cancelled", session.id);
        true
    }

    /// Animation frame callback.
    pub fn animation_frame(&mut self) -> Option<Viewport> {
        match self.surface.as_mut() {
            Some(surface) => self.sync.flush_frame(surface),
            None => {
                self.sync.clear();
                None
            }
        }
    }

    /// Ctrl/Cmd + wheel zooms around the pointer; plain wheel is ignored.
    pub fn wheel(&mut self, position: Point, delta: Vec2, modifiers: Modifiers) -> Vec<MapEvent> {
        if !modifiers.command() || self.zoom_blocked() {
            return Vec::new();
        }
        let Some(snapshot) = self.committed_snapshot() else {
            return Vec::new();
        };
        let factor = self.config.wheel_base.powf(-delta.y);
        if self.viewport.zoom_at(snapshot.to_world(position), factor) {
            self.show_committed_view_box()
        } else {
            Vec::new()
        }
    }

    // --- Keyboard ---

    pub fn handle_key_event(&mut self, event: &KeyEvent) -> Vec<MapEvent> {
        let fresh = self.input.handle_key_event(event);
        match event {
            KeyEvent::Pressed { code, key, modifiers } => {
                if modifiers.command() {
                    return self.shortcut(key, fresh);
                }
                if code == "Space" && fresh {
                    self.mode = self.mode.hold_pan();
                }
                if key == "Escape" {
                    return self.clear_selection();
                }
                Vec::new()
            }
            KeyEvent::Released { code } => {
                if code == "Space" {
                    self.mode = self.mode.release_pan();
                }
                Vec::new()
            }
        }
    }

    fn shortcut(&mut self, key: &str, fresh: bool) -> Vec<MapEvent> {
        match key.to_lowercase().as_str() {
            "+" | "=" => self.zoom_in(),
            "-" | "_" => self.zoom_out(),
            "d" if fresh => {
                self.toggle_draw();
                Vec::new()
            }
            "s" if fresh => vec![MapEvent::ToggleAside],
            _ => Vec::new(),
        }
    }

    /// Window lost focus: held keys are gone, so is a held pan.
    pub fn blur(&mut self) {
        self.input.release_all();
        self.mode = self.mode.clear_pan();
    }

    // --- Toolbar ---

    pub fn toggle_draw(&mut self) -> Mode {
        self.mode = self.mode.toggle_draw();
        self.mode
    }

    pub fn zoom_in(&mut self) -> Vec<MapEvent> {
        self.zoom(ZoomDirection::In)
    }

    pub fn zoom_out(&mut self) -> Vec<MapEvent> {
        self.zoom(ZoomDirection::Out)
    }

    fn zoom(&mut self, direction: ZoomDirection) -> Vec<MapEvent> {
        self.mode = self.mode.clear_pan();
        if self.zoom_blocked() || !self.viewport.zoom_step(direction) {
            return Vec::new();
        }
        self.show_committed_view_box()
    }

    pub fn reset_zoom(&mut self) -> Vec<MapEvent> {
        if self.zoom_blocked() {
            return Vec::new();
        }
        self.viewport.reset();
        self.show_committed_view_box()
    }

    /// Show or hide a token. Hiding the selected token deselects it.
    pub fn toggle_token_visibility(&mut self, id: TokenId) -> Vec<MapEvent> {
        let visible = self.board.toggle_token_visibility(id);
        if !visible && self.selected_token == Some(id) {
            self.selected_token = None;
            return vec![MapEvent::TokenSelected(None)];
        }
        Vec::new()
    }

    pub fn clear_selection(&mut self) -> Vec<MapEvent> {
        match self.selected_token.take() {
            Some(_) => vec![MapEvent::TokenSelected(None)],
            None => Vec::new(),
        }
    }

    // --- Helpers ---

    /// A pan owns the transient viewport until it ends.
    fn zoom_blocked(&self) -> bool {
        let blocked = matches!(self.gesture(), Some(Gesture::Panning { .. }));
        if blocked {
            log::debug!("zoom ignored during pan");
        }
        blocked
    }

    fn show_committed_view_box(&mut self) -> Vec<MapEvent> {
        let viewport = self.viewport.committed();
        if let Some(surface) = self.surface.as_mut() {
            surface.set_view_box(viewport);
        }
        vec![MapEvent::ViewportChanged(viewport)]
    }

    fn toggle_selection(&mut self, id: TokenId) -> Vec<MapEvent> {
        if self.selected_token == Some(id) {
            self.selected_token = None;
            return vec![MapEvent::TokenSelected(None)];
        }
        self.selected_token = Some(id);
        vec![MapEvent::TokenSelected(self.board.token(id).cloned())]
    }

    fn drop_unavailable_selection(&mut self) -> Vec<MapEvent> {
        match self.selected_token {
            Some(id) if self.board.token(id).is_none() || !self.board.is_token_visible(id) => {
                self.selected_token = None;
                vec![MapEvent::TokenSelected(None)]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::EntityKind;
    use crate::board::fixtures::{element, token};
    use crate::gesture::ListenerKind;
    use crate::gesture::recording::RecordingRegistry;
    use crate::render_sync::recording::{RecordingSurface, SurfaceOp};
    use crate::resize::Corner;

    const EPS: f64 = 1e-9;

    type TestMap = BattleMap<RecordingSurface, RecordingRegistry>;

    /// Map whose screen and world coordinates coincide.
    fn mounted() -> (TestMap, RecordingRegistry) {
        let registry = RecordingRegistry::default();
        let mut map = BattleMap::new(MapConfig::default(), registry.clone());
        map.mount(RecordingSurface::default());
        (map, registry)
    }

    fn down(map: &mut TestMap, x: f64, y: f64, target: HitTarget) -> Vec<MapEvent> {
        map.pointer_down(Point::new(x, y), MouseButton::Left, target)
    }

    fn ops(map: &TestMap) -> &[SurfaceOp] {
        &map.surface().unwrap().ops
    }

    fn press(code: &str, key: &str, command: bool) -> KeyEvent {
        KeyEvent::Pressed {
            code: code.into(),
            key: key.into(),
            modifiers: Modifiers {
                ctrl: command,
                ..Default::default()
            },
        }
    }

    fn assert_point_eq(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS, "{a:?} != {b:?}");
    }

    #[test]
    fn test_pan_scenario() {
        let (mut map, registry) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        assert_eq!(map.mode(), Mode::Pan);

        down(&mut map, 100.0, 100.0, HitTarget::Empty);
        assert_eq!(map.pointer_move(Point::new(140.0, 80.0)), vec![MapEvent::FrameRequested]);

        assert_point_eq(map.viewport().transient().origin(), Point::new(-40.0, 20.0));
        assert_eq!(map.viewport().committed().origin(), Point::ZERO);

        let events = map.pointer_up(Point::new(140.0, 80.0));
        assert_eq!(events, vec![MapEvent::ViewportChanged(Viewport::new(-40.0, 20.0, 1000.0, 1000.0))]);
        assert_eq!(map.viewport().committed().origin(), Point::new(-40.0, 20.0));
        assert!(registry.balanced());
    }

    #[test]
    fn test_pan_uses_snapshot_from_pointer_down() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        down(&mut map, 100.0, 100.0, HitTarget::Empty);

        // The snapshot does not follow the transient viewport, so repeated
        // moves to the same point give the same origin.
        map.pointer_move(Point::new(150.0, 100.0));
        map.pointer_move(Point::new(150.0, 100.0));
        assert_point_eq(map.viewport().transient().origin(), Point::new(-50.0, 0.0));
    }

    #[test]
    fn test_pan_requests_one_frame_per_flush() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        down(&mut map, 0.0, 0.0, HitTarget::Empty);

        let mut requested = 0;
        for i in 1..=10 {
            requested += map
                .pointer_move(Point::new(i as f64, 0.0))
                .iter()
                .filter(|e| **e == MapEvent::FrameRequested)
                .count();
        }
        assert_eq!(requested, 1);

        let flushed = map.animation_frame().unwrap();
        assert_point_eq(flushed.origin(), Point::new(-10.0, 0.0));

        let next = map.pointer_move(Point::new(11.0, 0.0));
        assert_eq!(next, vec![MapEvent::FrameRequested]);
    }

    #[test]
    fn test_pan_continues_after_space_release() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        down(&mut map, 0.0, 0.0, HitTarget::Empty);
        map.handle_key_event(&KeyEvent::Released { code: "Space".into() });

        assert_eq!(map.mode(), Mode::Select);
        assert!(matches!(map.gesture(), Some(Gesture::Panning { .. })));
        map.pointer_move(Point::new(10.0, 10.0));
        let events = map.pointer_up(Point::new(10.0, 10.0));
        assert!(matches!(events.as_slice(), [MapEvent::ViewportChanged(_)]));
    }

    #[test]
    fn test_pan_leases_key_up() {
        let (mut map, registry) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        down(&mut map, 0.0, 0.0, HitTarget::Empty);
        let kinds = map.gestures.session().unwrap().lease().unwrap().kinds().to_vec();
        assert!(kinds.contains(&ListenerKind::KeyUp));
        map.pointer_up(Point::ZERO);
        assert!(registry.balanced());
    }

    #[test]
    fn test_draw_scenario() {
        let (mut map, _) = mounted();
        map.toggle_draw();

        down(&mut map, 50.0, 50.0, HitTarget::Empty);
        map.pointer_move(Point::new(30.0, 30.0));
        let events = map.pointer_up(Point::new(10.0, 10.0));

        let [MapEvent::ElementDrawn(draft)] = events.as_slice() else {
            panic!("expected a drawn element, got {events:?}");
        };
        assert_eq!((draft.x, draft.y, draft.width, draft.height), (10.0, 10.0, 40.0, 40.0));
        assert_eq!(draft.color, "#3b82f6");
        assert_eq!(draft.icon, "📝");
        assert_eq!(map.mode(), Mode::Select);

        assert_eq!(
            ops(&map)[1..],
            [
                SurfaceOp::ShowDraw(Rect::new(50.0, 50.0, 50.0, 50.0)),
                SurfaceOp::UpdateDraw(Rect::new(30.0, 30.0, 50.0, 50.0)),
                SurfaceOp::RemoveDraw,
            ]
        );
    }

    #[test]
    fn test_draw_rounds_and_uses_style() {
        let (mut map, _) = mounted();
        map.set_draw_style(DrawStyle {
            color: "#ef4444".into(),
            icon: "⚔️".into(),
            title: Some("Ambush".into()),
        });
        map.toggle_draw();
        down(&mut map, 10.4, 10.6, HitTarget::Empty);
        let events = map.pointer_up(Point::new(30.2, 40.7));
        let [MapEvent::ElementDrawn(draft)] = events.as_slice() else {
            panic!("expected a drawn element, got {events:?}");
        };
        assert_eq!((draft.x, draft.y, draft.width, draft.height), (10.0, 11.0, 20.0, 30.0));
        assert_eq!(draft.name.as_deref(), Some("Ambush"));
    }

    #[test]
    fn test_draw_threshold() {
        for (end, kept) in [
            ((54.0, 100.0), false),
            ((100.0, 55.0), false),
            ((55.0, 55.0), false),
            ((55.5, 55.5), true),
            ((49.0, 49.0), false),
        ] {
            let (mut map, _) = mounted();
            map.toggle_draw();
            down(&mut map, 50.0, 50.0, HitTarget::Empty);
            let events = map.pointer_up(Point::new(end.0, end.1));
            let drawn = events.iter().any(|e| matches!(e, MapEvent::ElementDrawn(_)));
            assert_eq!(drawn, kept, "end {end:?}");
            assert_eq!(map.mode(), Mode::Select, "draw mode ends after any draw");
        }
    }

    #[test]
    fn test_draw_mode_draws_over_objects() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);
        map.set_elements(vec![element(2, 200.0, 200.0, 100.0, 100.0)]);

        map.toggle_draw();
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        assert!(matches!(map.gesture(), Some(Gesture::Drawing { .. })));
        map.pointer_move(Point::new(45.0, 45.0));
        let events = map.pointer_up(Point::new(45.0, 45.0));
        assert!(matches!(events.as_slice(), [MapEvent::ElementDrawn(_)]), "{events:?}");
        assert!(!events.iter().any(|e| matches!(e, MapEvent::TokenMoved(_))));
        assert_eq!(map.mode(), Mode::Select);

        map.toggle_draw();
        down(&mut map, 250.0, 250.0, HitTarget::Element(2));
        assert!(matches!(map.gesture(), Some(Gesture::Drawing { .. })));
        let events = map.pointer_up(Point::new(250.0, 250.0));
        assert!(events.is_empty(), "{events:?}");
        assert_eq!(map.resize_selected(), None);
        assert_eq!(map.mode(), Mode::Select);
    }

    #[test]
    fn test_refused_pointer_down_keeps_resize_selection() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);
        map.set_elements(vec![element(2, 200.0, 200.0, 100.0, 100.0)]);
        down(&mut map, 250.0, 250.0, HitTarget::Element(2));
        map.pointer_up(Point::new(250.0, 250.0));
        assert_eq!(map.resize_selected(), Some(2));

        down(&mut map, 250.0, 250.0, HitTarget::Element(2));
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        assert_eq!(map.resize_selected(), Some(2));
        assert!(matches!(map.gesture(), Some(Gesture::DraggingElement { .. })));
    }

    #[test]
    fn test_token_drag_scenario() {
        let (mut map, registry) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);

        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        map.pointer_move(Point::new(105.0, 105.0));
        assert_eq!(ops(&map).last(), Some(&SurfaceOp::Token(1, Point::new(100.0, 100.0))));

        let events = map.pointer_up(Point::new(105.0, 105.0));
        assert_eq!(events, vec![MapEvent::TokenMoved(token(1, 1, EntityKind::Player, 100.0, 100.0))]);
        assert!(map.selected_token().is_none(), "a real drag is not a click");
        assert!(registry.balanced());
    }

    #[test]
    fn test_drag_anchor_stability() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 200.0, 300.0)]);
        down(&mut map, 237.0, 311.0, HitTarget::Token(1));
        let anchor = Vec2::new(37.0, 11.0);

        for (x, y) in [(240.0, 320.0), (0.0, 0.0), (999.0, 3.5), (512.25, 700.75)] {
            map.pointer_move(Point::new(x, y));
            let Some(SurfaceOp::Token(1, position)) = ops(&map).last() else {
                panic!("token was not moved");
            };
            assert_point_eq(*position, Point::new(x, y) - anchor);
        }
    }

    #[test]
    fn test_drag_anchor_with_zoomed_viewport() {
        let registry = RecordingRegistry::default();
        let mut map: TestMap = BattleMap::new(MapConfig::default(), registry);
        map.mount(RecordingSurface {
            bounds: Rect::new(0.0, 0.0, 500.0, 500.0),
            ops: Vec::new(),
        });
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);

        // One screen pixel is two world units.
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        map.pointer_move(Point::new(55.0, 55.0));
        let events = map.pointer_up(Point::new(55.0, 55.0));
        assert_eq!(events, vec![MapEvent::TokenMoved(token(1, 1, EntityKind::Player, 100.0, 100.0))]);
    }

    #[test]
    fn test_token_click_toggles_selection() {
        let (mut map, _) = mounted();
        let t = token(1, 1, EntityKind::Player, 0.0, 0.0);
        map.set_tokens(vec![t.clone()]);

        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        let events = map.pointer_up(Point::new(5.0, 5.0));
        assert_eq!(events, vec![MapEvent::TokenMoved(t.clone()), MapEvent::TokenSelected(Some(t.clone()))]);
        assert_eq!(map.selected_token(), Some(&t));

        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        let events = map.pointer_up(Point::new(5.0, 5.0));
        assert_eq!(events, vec![MapEvent::TokenMoved(t), MapEvent::TokenSelected(None)]);
        assert!(map.selected_token().is_none());
    }

    #[test]
    fn test_element_drag_and_click() {
        let (mut map, _) = mounted();
        let e = element(7, 100.0, 100.0, 200.0, 100.0);
        map.set_elements(vec![e.clone()]);

        down(&mut map, 150.0, 120.0, HitTarget::Element(7));
        map.pointer_move(Point::new(160.0, 140.0));
        assert_eq!(ops(&map).last(), Some(&SurfaceOp::Element(7, Point::new(110.0, 120.0))));
        let events = map.pointer_up(Point::new(160.0, 140.0));
        assert_eq!(events, vec![MapEvent::ElementMoved(e.with_origin(Point::new(110.0, 120.0)))]);
        assert_eq!(map.resize_selected(), None);

        down(&mut map, 150.0, 120.0, HitTarget::Element(7));
        let events = map.pointer_up(Point::new(150.0, 120.0));
        assert_eq!(events, vec![MapEvent::ElementMoved(e), MapEvent::ElementClicked(7)]);
        assert_eq!(map.resize_selected(), Some(7));

        down(&mut map, 900.0, 900.0, HitTarget::Empty);
        assert_eq!(map.resize_selected(), None);
    }

    #[test]
    fn test_resize_gesture() {
        let (mut map, registry) = mounted();
        let e = element(3, 100.0, 100.0, 200.0, 100.0);
        map.set_elements(vec![e.clone()]);

        // Handles only respond once the element is selected.
        down(&mut map, 300.0, 200.0, HitTarget::ResizeHandle(3, Corner::BottomRight));
        assert!(map.gesture().is_none());
        assert_eq!(registry.attached(), 0);

        down(&mut map, 150.0, 150.0, HitTarget::Element(3));
        map.pointer_up(Point::new(150.0, 150.0));
        assert_eq!(map.resize_selected(), Some(3));

        down(&mut map, 300.0, 200.0, HitTarget::ResizeHandle(3, Corner::BottomRight));
        map.pointer_move(Point::new(320.0, 230.0));
        let events = map.pointer_up(Point::new(320.0, 230.0));
        let resized = e.with_rect(Rect::new(100.0, 100.0, 320.0, 230.0));
        assert_eq!(events, vec![MapEvent::ElementMoved(resized.clone())]);
        assert_eq!(map.element(3), Some(&resized));

        // Stale host data keeps the override; matching data clears it.
        map.set_elements(vec![e]);
        assert_eq!(map.element(3), Some(&resized));
        map.set_elements(vec![resized.clone()]);
        assert_eq!(map.element(3), Some(&resized));
        assert!(map.pending_resize.is_none());
        assert!(registry.balanced());
    }

    #[test]
    fn test_resize_respects_minimum() {
        let (mut map, _) = mounted();
        map.set_elements(vec![element(3, 100.0, 100.0, 200.0, 100.0)]);
        down(&mut map, 150.0, 150.0, HitTarget::Element(3));
        map.pointer_up(Point::new(150.0, 150.0));

        down(&mut map, 100.0, 100.0, HitTarget::ResizeHandle(3, Corner::TopLeft));
        map.pointer_move(Point::new(900.0, 900.0));
        let events = map.pointer_up(Point::new(900.0, 900.0));
        let [MapEvent::ElementMoved(resized)] = events.as_slice() else {
            panic!("expected a resize, got {events:?}");
        };
        assert_eq!(resized.rect(), Rect::new(250.0, 150.0, 300.0, 200.0));
    }

    #[test]
    fn test_preview_element_drag() {
        let (mut map, _) = mounted();
        let draft = ElementDraft {
            x: 10.0,
            y: 10.0,
            width: 50.0,
            height: 50.0,
            color: "#000".into(),
            icon: "📝".into(),
            name: None,
        };
        map.set_preview_element(Some(draft.clone()));

        down(&mut map, 20.0, 20.0, HitTarget::PreviewElement);
        assert!(map.pointer_up(Point::new(20.0, 20.0)).is_empty());

        down(&mut map, 20.0, 20.0, HitTarget::PreviewElement);
        map.pointer_move(Point::new(70.0, 30.0));
        let events = map.pointer_up(Point::new(70.0, 30.0));
        assert_eq!(events, vec![MapEvent::PreviewMoved(draft.with_origin(Point::new(60.0, 20.0)))]);
    }

    #[test]
    fn test_only_one_gesture_at_a_time() {
        let (mut map, registry) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);
        map.set_elements(vec![element(2, 500.0, 500.0, 100.0, 100.0)]);

        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        down(&mut map, 550.0, 550.0, HitTarget::Element(2));
        assert!(matches!(map.gesture(), Some(Gesture::DraggingToken { .. })));
        assert_eq!(registry.attached(), 1);
    }

    #[test]
    fn test_aborted_gestures_attach_nothing() {
        let registry = RecordingRegistry::default();
        let mut map: TestMap = BattleMap::new(MapConfig::default(), registry.clone());
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);

        // No surface.
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        // Zero-sized surface.
        map.mount(RecordingSurface {
            bounds: Rect::ZERO,
            ops: Vec::new(),
        });
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        map.unmount();
        map.mount(RecordingSurface::default());
        // Unknown ids and missing preview.
        down(&mut map, 5.0, 5.0, HitTarget::Token(99));
        down(&mut map, 5.0, 5.0, HitTarget::Element(99));
        down(&mut map, 5.0, 5.0, HitTarget::PreviewElement);
        // Secondary button.
        map.pointer_down(Point::new(5.0, 5.0), MouseButton::Right, HitTarget::Token(1));

        assert!(map.gesture().is_none());
        assert_eq!(registry.attached(), 0);
        assert_eq!(registry.detached(), 0);
        assert!(map.pointer_move(Point::new(10.0, 10.0)).is_empty());
        assert!(map.pointer_up(Point::new(10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_cancel_restores_surface() {
        let (mut map, registry) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);

        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        map.pointer_move(Point::new(55.0, 55.0));
        assert!(map.cancel_gesture());
        assert_eq!(ops(&map).last(), Some(&SurfaceOp::Token(1, Point::ZERO)));
        assert!(map.pointer_up(Point::new(55.0, 55.0)).is_empty());
        assert!(!map.cancel_gesture());
        assert!(registry.balanced());
    }

    #[test]
    fn test_cancel_discards_pan() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        down(&mut map, 0.0, 0.0, HitTarget::Empty);
        map.pointer_move(Point::new(100.0, 0.0));
        map.cancel_gesture();

        assert_eq!(map.viewport().transient(), map.viewport().committed());
        assert_eq!(map.viewport().committed().origin(), Point::ZERO);
        assert!(map.animation_frame().is_none());
    }

    #[test]
    fn test_unmount_and_drop_release_listeners() {
        let (mut map, registry) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        assert!(map.unmount().is_some());
        assert_eq!(registry.detached(), 1);

        map.mount(RecordingSurface::default());
        down(&mut map, 5.0, 5.0, HitTarget::Token(1));
        drop(map);
        assert_eq!(registry.attached(), 2);
        assert!(registry.balanced());
    }

    #[test]
    fn test_zoom_buttons_clear_pan_and_emit_viewport() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        let events = map.zoom_in();
        assert_eq!(map.mode(), Mode::Select);
        let [MapEvent::ViewportChanged(viewport)] = events.as_slice() else {
            panic!("expected a viewport change, got {events:?}");
        };
        assert_point_eq(viewport.center(), Point::new(500.0, 500.0));
        assert_eq!(ops(&map).last(), Some(&SurfaceOp::SetViewBox(*viewport)));

        map.zoom_out();
        map.reset_zoom();
        assert_eq!(map.viewport().committed(), Viewport::default());
    }

    #[test]
    fn test_zoom_ignored_during_pan() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        down(&mut map, 0.0, 0.0, HitTarget::Empty);
        map.pointer_move(Point::new(10.0, 0.0));

        assert!(map.zoom_in().is_empty());
        assert!(map.reset_zoom().is_empty());
        assert!((map.viewport().zoom() - 1.0).abs() < EPS);

        map.pointer_up(Point::new(10.0, 0.0));
        assert!(!map.zoom_in().is_empty());
    }

    #[test]
    fn test_wheel_zoom_keeps_anchor() {
        let (mut map, _) = mounted();
        let command = Modifiers {
            meta: true,
            ..Default::default()
        };

        assert!(map.wheel(Point::new(250.0, 250.0), Vec2::new(0.0, -100.0), Modifiers::default()).is_empty());

        let events = map.wheel(Point::new(250.0, 250.0), Vec2::new(0.0, -100.0), command);
        assert_eq!(events.len(), 1);
        let expected_zoom = 1.005f64.powf(100.0);
        assert!((map.viewport().zoom() - expected_zoom).abs() < 1e-6);

        // The world point under the pointer stays under the pointer.
        let snapshot = map.committed_snapshot().unwrap();
        assert_point_eq(snapshot.to_world(Point::new(250.0, 250.0)), Point::new(250.0, 250.0));
    }

    #[test]
    fn test_keyboard_shortcuts() {
        let (mut map, _) = mounted();

        map.handle_key_event(&press("KeyD", "d", true));
        assert_eq!(map.mode(), Mode::Draw);
        // Auto-repeat does not toggle back.
        map.handle_key_event(&press("KeyD", "d", true));
        assert_eq!(map.mode(), Mode::Draw);
        map.handle_key_event(&KeyEvent::Released { code: "KeyD".into() });
        map.handle_key_event(&press("KeyD", "D", true));
        assert_eq!(map.mode(), Mode::Select);

        assert_eq!(map.handle_key_event(&press("KeyS", "s", true)), vec![MapEvent::ToggleAside]);
        assert_eq!(map.handle_key_event(&press("Equal", "=", true)).len(), 1);
        assert!((map.viewport().zoom() - 1.2).abs() < EPS);
        map.handle_key_event(&press("Minus", "-", true));
        assert!((map.viewport().zoom() - 0.96).abs() < EPS);
    }

    #[test]
    fn test_space_toggles_pan_and_draw_turns_it_off() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        assert_eq!(map.mode(), Mode::Pan);
        map.toggle_draw();
        assert_eq!(map.mode(), Mode::Draw);
        map.handle_key_event(&KeyEvent::Released { code: "Space".into() });
        assert_eq!(map.mode(), Mode::Draw);
        map.handle_key_event(&press("Space", " ", false));
        assert_eq!(map.mode(), Mode::Pan);
    }

    #[test]
    fn test_blur_clears_pan() {
        let (mut map, _) = mounted();
        map.handle_key_event(&press("Space", " ", false));
        map.blur();
        assert_eq!(map.mode(), Mode::Select);
        // Space is no longer held, so the next press is fresh.
        map.handle_key_event(&press("Space", " ", false));
        assert_eq!(map.mode(), Mode::Pan);
    }

    #[test]
    fn test_escape_clears_selection() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);
        map.set_selected_token(Some(1));

        assert_eq!(map.handle_key_event(&press("Escape", "Escape", false)), vec![MapEvent::TokenSelected(None)]);
        assert!(map.handle_key_event(&press("Escape", "Escape", false)).is_empty());
    }

    #[test]
    fn test_hiding_selected_token_deselects() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![
            token(1, 1, EntityKind::Player, 0.0, 0.0),
            token(2, 2, EntityKind::Player, 0.0, 0.0),
        ]);
        map.set_selected_token(Some(1));

        assert!(map.toggle_token_visibility(2).is_empty());
        assert_eq!(map.toggle_token_visibility(1), vec![MapEvent::TokenSelected(None)]);
        assert!(map.selected_token().is_none());
        assert!(map.toggle_token_visibility(1).is_empty());
        assert!(map.board().is_token_visible(1));
    }

    #[test]
    fn test_completed_encounter_deselects_hidden_opponent() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![token(4, 9, EntityKind::Opponent, 0.0, 0.0)]);
        map.set_selected_token(Some(4));

        let mut encounter = element(1, 0.0, 0.0, 100.0, 100.0);
        encounter.opponents = vec![9];
        encounter.completed = true;
        assert_eq!(map.set_elements(vec![encounter]), vec![MapEvent::TokenSelected(None)]);
        assert!(!map.board().is_token_visible(4));
    }

    #[test]
    fn test_background_fits_viewport() {
        let (mut map, _) = mounted();
        map.zoom_in();
        let events = map.set_background(Some(Background {
            url: "cave.png".into(),
            size: Size::new(1600.0, 900.0),
        }));
        let expected = Viewport::new(-800.0, -450.0, 1600.0, 900.0);
        assert_eq!(events, vec![MapEvent::ViewportChanged(expected)]);
        map.zoom_out();
        map.reset_zoom();
        assert_eq!(map.viewport().committed(), expected);
        assert!(map.set_background(None).is_empty());
    }

    #[test]
    fn test_hit_test_uses_committed_view() {
        let (mut map, _) = mounted();
        map.set_tokens(vec![token(1, 1, EntityKind::Player, 0.0, 0.0)]);
        assert_eq!(map.hit_test(Point::new(50.0, 50.0)), HitTarget::Token(1));
        assert_eq!(map.hit_test(Point::new(500.0, 500.0)), HitTarget::Empty);
    }

    #[test]
    fn test_hit_test_handles_follow_unconfirmed_resize() {
        let (mut map, _) = mounted();
        map.set_elements(vec![element(3, 100.0, 100.0, 200.0, 100.0)]);
        down(&mut map, 150.0, 150.0, HitTarget::Element(3));
        map.pointer_up(Point::new(150.0, 150.0));

        down(&mut map, 300.0, 200.0, HitTarget::ResizeHandle(3, Corner::BottomRight));
        map.pointer_move(Point::new(400.0, 300.0));
        map.pointer_up(Point::new(400.0, 300.0));

        assert_eq!(
            map.hit_test(Point::new(399.0, 299.0)),
            HitTarget::ResizeHandle(3, Corner::BottomRight)
        );
        assert_eq!(map.hit_test(Point::new(299.0, 199.0)), HitTarget::Element(3));
    }

    #[test]
    fn test_map_event_json() {
        let json = serde_json::to_string(&MapEvent::ElementClicked(4)).unwrap();
        assert_eq!(json, r#"{"event":"element_clicked","data":4}"#);
        let json = serde_json::to_string(&MapEvent::ToggleAside).unwrap();
        assert_eq!(json, r#"{"event":"toggle_aside"}"#);
    }
}

//! Retained scene graph.
//!
//! [`SceneGraph::rebuild`] is the declarative path: it regenerates every node
//! from committed state. The [`RenderSurface`] impl is the fast path used
//! during gestures: it only offsets or reshapes existing nodes.

use crate::color::{Rgba, fade, parse_hex};
use crate::renderer::RenderContext;
use battlemap_core::board::{ElementId, EntityKind, TokenId};
use battlemap_core::mode::DrawStyle;
use battlemap_core::render_sync::RenderSurface;
use battlemap_core::resize::Corner;
use battlemap_core::viewport::Viewport;
use kurbo::{Affine, Circle, Point, Rect, Shape as _, Vec2};

const FALLBACK_ELEMENT_COLOR: Rgba = [148, 163, 184, 255];
const PLAYER_COLOR: Rgba = [34, 197, 94, 255];
const OPPONENT_COLOR: Rgba = [239, 68, 68, 255];
const COMBAT_COLOR: Rgba = [234, 88, 12, 255];
const MAP_EDGE_COLOR: Rgba = [71, 85, 105, 255];

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Background,
    Element(ElementId),
    ResizeHandle(ElementId, Corner),
    PreviewElement,
    Token(TokenId),
    SelectionRing(TokenId),
    DrawPreview,
}

/// Node geometry in world space, before the node's translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeShape {
    Rect(Rect),
    Circle(Circle),
}

impl NodeShape {
    pub fn bounds(&self) -> Rect {
        match self {
            NodeShape::Rect(rect) => *rect,
            NodeShape::Circle(circle) => circle.bounding_box(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub shape: NodeShape,
    /// Committed origin of the object this node belongs to.
    pub origin: Point,
    /// Offset applied by an in-progress drag.
    pub translate: Vec2,
    pub fill: Option<Rgba>,
    pub stroke: Option<Rgba>,
    pub dashed: bool,
    pub label: Option<String>,
}

impl SceneNode {
    fn new(kind: NodeKind, shape: NodeShape, origin: Point) -> Self {
        Self {
            kind,
            shape,
            origin,
            translate: Vec2::ZERO,
            fill: None,
            stroke: None,
            dashed: false,
            label: None,
        }
    }

    fn fill(mut self, color: Rgba) -> Self {
        self.fill = Some(color);
        self
    }

    fn stroke(mut self, color: Rgba) -> Self {
        self.stroke = Some(color);
        self
    }

    fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }

    fn label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Transform from node space to world space.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.translate)
    }

    /// Bounds in world space, translation included.
    pub fn world_bounds(&self) -> Rect {
        self.shape.bounds() + self.translate
    }
}

/// Retained nodes in paint order plus the current view box.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    bounds: Rect,
    view_box: Viewport,
    nodes: Vec<SceneNode>,
    handle_size: f64,
    background_color: Rgba,
    selection_color: Rgba,
}

impl SceneGraph {
    /// Empty graph occupying `bounds` on screen.
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            view_box: Viewport::default(),
            nodes: Vec::new(),
            handle_size: 16.0,
            background_color: [30, 30, 36, 255],
            selection_color: [59, 130, 246, 255],
        }
    }

    /// Host layout changed.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    pub fn view_box(&self) -> Viewport {
        self.view_box
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, kind: NodeKind) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.kind == kind)
    }

    pub fn background_color(&self) -> Rgba {
        self.background_color
    }

    pub fn selection_color(&self) -> Rgba {
        self.selection_color
    }

    /// Regenerate every node from committed state.
    ///
    /// Drag offsets are dropped; an active draw preview is kept.
    pub fn rebuild(&mut self, ctx: &RenderContext) {
        let draw_preview = self.nodes.iter().find(|n| n.kind == NodeKind::DrawPreview).cloned();
        self.nodes.clear();
        self.view_box = ctx.viewport;
        self.handle_size = ctx.handle_size;
        self.background_color = ctx.background_color;
        self.selection_color = ctx.selection_color;

        if let Some(background) = &ctx.board.background {
            let rect = background.rect();
            log::trace!("background {} at {:?}", background.url, rect);
            self.nodes
                .push(SceneNode::new(NodeKind::Background, NodeShape::Rect(rect), rect.origin()).stroke(MAP_EDGE_COLOR));
        }

        for element in ctx.elements {
            let color = parse_hex(&element.color).unwrap_or_else(|err| {
                log::warn!("element {}: {}", element.id, err);
                FALLBACK_ELEMENT_COLOR
            });
            let fill = if element.completed { fade(color, 0.15) } else { fade(color, 0.35) };
            let stroke = if element.combat_active { COMBAT_COLOR } else { color };
            let label = match &element.name {
                Some(name) => format!("{} {}", element.icon, name),
                None => element.icon.clone(),
            };
            self.nodes.push(
                SceneNode::new(NodeKind::Element(element.id), NodeShape::Rect(element.rect()), element.origin())
                    .fill(fill)
                    .stroke(stroke)
                    .label(Some(label)),
            );
        }

        if let Some(draft) = &ctx.board.preview {
            let color = parse_hex(&draft.color).unwrap_or(FALLBACK_ELEMENT_COLOR);
            self.nodes.push(
                SceneNode::new(NodeKind::PreviewElement, NodeShape::Rect(draft.rect()), draft.origin())
                    .fill(fade(color, 0.2))
                    .stroke(color)
                    .dashed()
                    .label(Some(draft.icon.clone())),
            );
        }

        for token in ctx.board.visible_tokens() {
            let circle = token.circle(ctx.token_size);
            if ctx.selected_token == Some(token.id) {
                let ring = Circle::new(circle.center, circle.radius + 6.0);
                self.nodes.push(
                    SceneNode::new(NodeKind::SelectionRing(token.id), NodeShape::Circle(ring), token.coordinates)
                        .stroke(ctx.selection_color),
                );
            }
            let color = match token.kind {
                EntityKind::Player => PLAYER_COLOR,
                EntityKind::Opponent => OPPONENT_COLOR,
            };
            let name = ctx.board.entity_for(token).map(|e| e.name.clone());
            self.nodes.push(
                SceneNode::new(NodeKind::Token(token.id), NodeShape::Circle(circle), token.coordinates)
                    .fill(color)
                    .stroke([255, 255, 255, 255])
                    .label(name),
            );
        }

        if let Some(element) = ctx.resize_selected.and_then(|id| ctx.elements.iter().find(|e| e.id == id)) {
            for corner in Corner::ALL {
                self.nodes.push(
                    SceneNode::new(
                        NodeKind::ResizeHandle(element.id, corner),
                        NodeShape::Rect(corner.handle_rect(element.rect(), ctx.handle_size)),
                        element.origin(),
                    )
                    .fill([255, 255, 255, 255])
                    .stroke(ctx.selection_color),
                );
            }
        }

        self.nodes.extend(draw_preview);
    }

    fn translate_where(&mut self, matches: impl Fn(NodeKind) -> bool, position: Point) {
        for node in self.nodes.iter_mut().filter(|n| matches(n.kind)) {
            node.translate = position - node.origin;
        }
    }

    fn draw_preview_mut(&mut self) -> Option<&mut SceneNode> {
        self.nodes.iter_mut().find(|n| n.kind == NodeKind::DrawPreview)
    }
}

impl RenderSurface for SceneGraph {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn set_view_box(&mut self, viewport: Viewport) {
        self.view_box = viewport;
    }

    fn show_draw_preview(&mut self, rect: Rect, style: &DrawStyle) {
        self.nodes.retain(|n| n.kind != NodeKind::DrawPreview);
        let color = parse_hex(&style.color).unwrap_or(FALLBACK_ELEMENT_COLOR);
        self.nodes.push(
            SceneNode::new(NodeKind::DrawPreview, NodeShape::Rect(rect), rect.origin())
                .fill(fade(color, 0.25))
                .stroke(color)
                .dashed(),
        );
    }

    fn update_draw_preview(&mut self, rect: Rect) {
        if let Some(node) = self.draw_preview_mut() {
            node.shape = NodeShape::Rect(rect);
            node.origin = rect.origin();
        }
    }

    fn remove_draw_preview(&mut self) {
        self.nodes.retain(|n| n.kind != NodeKind::DrawPreview);
    }

    fn translate_token(&mut self, id: TokenId, position: Point) {
        self.translate_where(
            |kind| matches!(kind, NodeKind::Token(t) | NodeKind::SelectionRing(t) if t == id),
            position,
        );
    }

    fn translate_element(&mut self, id: ElementId, origin: Point) {
        self.translate_where(
            |kind| matches!(kind, NodeKind::Element(e) | NodeKind::ResizeHandle(e, _) if e == id),
            origin,
        );
    }

    fn reshape_element(&mut self, id: ElementId, rect: Rect) {
        let handle_size = self.handle_size;
        for node in &mut self.nodes {
            match node.kind {
                NodeKind::Element(e) if e == id => node.shape = NodeShape::Rect(rect),
                NodeKind::ResizeHandle(e, corner) if e == id => {
                    node.shape = NodeShape::Rect(corner.handle_rect(rect, handle_size));
                }
                _ => continue,
            }
            node.origin = rect.origin();
            node.translate = Vec2::ZERO;
        }
    }

    fn translate_preview_element(&mut self, origin: Point) {
        self.translate_where(|kind| kind == NodeKind::PreviewElement, origin);
    }
}

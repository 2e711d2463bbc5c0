//! Vello-based renderer implementation.

use crate::color::{Rgba, to_color};
use crate::renderer::Renderer;
use crate::scene::{NodeKind, NodeShape, SceneGraph, SceneNode};
use battlemap_core::render_sync::RenderSurface;
use battlemap_core::transform::TransformSnapshot;
use kurbo::{Affine, BezPath, Point, Rect, Shape as KurboShape, Stroke};
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, Layout, LayoutContext, StyleProperty};
use peniko::{Brush, Fill};
use vello::Scene;

/// Label size in screen pixels.
const LABEL_FONT_SIZE: f32 = 14.0;
const LABEL_COLOR: Rgba = [241, 245, 249, 255];
/// Screen-space gap between a node and its label.
const LABEL_GAP: f64 = 4.0;

/// Vello-based renderer for GPU-accelerated 2D graphics.
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
    /// Font context for labels (system fonts).
    font_cx: FontContext,
    layout_cx: LayoutContext<Brush>,
    /// Current zoom level (for zoom-independent strokes).
    zoom: f64,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    /// Create a new Vello renderer.
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
            zoom: 1.0,
        }
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    /// World-to-screen transform for the graph's view box, or `None` for an
    /// empty surface.
    fn camera_transform(graph: &SceneGraph) -> Option<Affine> {
        let snapshot = TransformSnapshot::capture(&graph.view_box(), graph.bounds())?;
        Some(snapshot.affine().inverse())
    }

    fn render_node(&mut self, node: &SceneNode, camera: Affine, selection_color: Rgba) {
        let transform = camera * node.transform();
        let path = match node.shape {
            NodeShape::Rect(rect) => rect.to_path(0.1),
            NodeShape::Circle(circle) => circle.to_path(0.1),
        };

        if let Some(fill) = node.fill {
            self.scene.fill(Fill::NonZero, transform, to_color(fill), None, &path);
        }

        // Stroke widths are scaled inversely with zoom to keep a constant screen size.
        let width = match node.kind {
            NodeKind::SelectionRing(_) => 3.0,
            NodeKind::ResizeHandle(..) => 1.5,
            _ => 2.0,
        } / self.zoom;
        if let Some(stroke) = node.stroke {
            let mut style = Stroke::new(width);
            if node.dashed {
                let dash = 6.0 / self.zoom;
                style = style.with_dashes(0.0, &[dash, dash]);
            }
            self.scene.stroke(&style, transform, to_color(stroke), None, &path);
        }

        if node.kind == NodeKind::DrawPreview {
            self.render_crosshair(node.world_bounds(), camera, selection_color);
        }

        if let Some(label) = &node.label {
            let (anchor, centered) = label_anchor(node);
            self.render_label(label, camera * anchor, centered);
        }
    }

    fn layout_label(&mut self, text: &str, brush: &Brush) -> Layout<Brush> {
        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(LABEL_FONT_SIZE));
        builder.push_default(StyleProperty::Brush(brush.clone()));
        let mut layout = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());
        layout
    }

    /// Draw `text` at a screen position, left-aligned or centred on it.
    fn render_label(&mut self, text: &str, screen: Point, centered: bool) {
        if text.is_empty() {
            return;
        }
        let brush = Brush::Solid(to_color(LABEL_COLOR));
        let layout = self.layout_label(text, &brush);
        let dx = if centered { -(layout.width() as f64) / 2.0 } else { LABEL_GAP };
        let transform = Affine::translate((screen.x + dx, screen.y + LABEL_GAP));

        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let gx = x + glyph.x;
                        x += glyph.advance;
                        vello::Glyph {
                            id: glyph.id,
                            x: gx,
                            y: y - glyph.y,
                        }
                    })
                    .collect();
                if glyphs.is_empty() {
                    continue;
                }
                self.scene
                    .draw_glyphs(run.font())
                    .brush(&brush)
                    .hint(true)
                    .transform(transform)
                    .font_size(run.font_size())
                    .normalized_coords(run.normalized_coords())
                    .draw(Fill::NonZero, glyphs.into_iter());
            }
        }
    }

    /// Small cross at the centre of the rectangle being drawn.
    fn render_crosshair(&mut self, rect: Rect, camera: Affine, color: Rgba) {
        let center = rect.center();
        let half = 6.0 / self.zoom;
        let mut path = BezPath::new();
        path.move_to((center.x - half, center.y));
        path.line_to((center.x + half, center.y));
        path.move_to((center.x, center.y - half));
        path.line_to((center.x, center.y + half));
        self.scene.stroke(&Stroke::new(1.0 / self.zoom), camera, to_color(color), None, &path);
    }
}

/// World point a node's label hangs from: the top-left corner of a
/// rectangle or the bottom of a circle. The flag asks for centring.
fn label_anchor(node: &SceneNode) -> (Point, bool) {
    match node.shape {
        NodeShape::Rect(rect) => (rect.origin() + node.translate, false),
        NodeShape::Circle(circle) => (Point::new(circle.center.x, circle.center.y + circle.radius) + node.translate, true),
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, graph: &SceneGraph) {
        // Clear the scene
        self.scene.reset();

        let Some(camera) = Self::camera_transform(graph) else {
            log::debug!("skipping frame for empty surface");
            return;
        };
        self.zoom = camera.as_coeffs()[0].abs().max(f64::EPSILON);

        for node in graph.nodes() {
            self.render_node(node, camera, graph.selection_color());
        }
    }
}

//! Renderer trait abstraction.

use crate::color::{Rgba, to_color};
use crate::scene::SceneGraph;
use battlemap_core::board::{Board, Element, ElementId, TokenId};
use battlemap_core::config::MapConfig;
use battlemap_core::viewport::Viewport;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid color: {0:?}")]
    InvalidColor(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Committed map state for one declarative render.
pub struct RenderContext<'a> {
    /// Board content; tokens, entities, preview and background come from here.
    pub board: &'a Board,
    /// Elements to draw. Defaults to the board's list; hosts pass the
    /// engine's view when a resize is still unconfirmed.
    pub elements: &'a [Element],
    /// Committed view box.
    pub viewport: Viewport,
    pub selected_token: Option<TokenId>,
    /// Element showing resize handles.
    pub resize_selected: Option<ElementId>,
    /// Token visual edge length in world units.
    pub token_size: f64,
    /// Resize handle edge length in world units.
    pub handle_size: f64,
    pub background_color: Rgba,
    /// Selection ring and handle colour.
    pub selection_color: Rgba,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(board: &'a Board, viewport: Viewport) -> Self {
        Self {
            board,
            elements: &board.elements,
            viewport,
            selected_token: None,
            resize_selected: None,
            token_size: 100.0,
            handle_size: 16.0,
            background_color: [30, 30, 36, 255],
            selection_color: [59, 130, 246, 255],
        }
    }

    pub fn with_elements(mut self, elements: &'a [Element]) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_selection(mut self, token: Option<TokenId>, resize: Option<ElementId>) -> Self {
        self.selected_token = token;
        self.resize_selected = resize;
        self
    }

    /// Take token and handle sizes from the engine configuration.
    pub fn with_config(mut self, config: &MapConfig) -> Self {
        self.token_size = config.token_size;
        self.handle_size = config.handle_size;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Encode the retained scene, including any in-progress gesture
    /// offsets, for the next frame.
    fn build_scene(&mut self, graph: &SceneGraph);

    /// Get the background color (for clearing).
    fn background_color(&self, graph: &SceneGraph) -> Color {
        to_color(graph.background_color())
    }
}

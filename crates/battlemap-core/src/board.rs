//! Board content supplied by the host: elements, tokens, and the roster.
//!
//! The host owns this data and persists it; the engine only reads it and
//! proposes changes through [`crate::engine::MapEvent`]s.

use crate::resize::Corner;
use kurbo::{Circle, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ElementId = i64;
pub type TokenId = i64;
pub type EntityId = i64;

/// Default icon for newly drawn elements.
pub const DEFAULT_ELEMENT_ICON: &str = "📝";

/// Whether an entity is a party member or an opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Player,
    Opponent,
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub kind: EntityKind,
    /// Portrait reference, resolved by the host's asset layer.
    #[serde(default)]
    pub image: Option<String>,
}

/// A drawable world-space rectangle with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub icon: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Encounter finished; its opponents' tokens are hidden.
    #[serde(default)]
    pub completed: bool,
    /// Opponent entities taking part in this encounter.
    #[serde(default)]
    pub opponents: Vec<EntityId>,
    #[serde(default)]
    pub combat_active: bool,
}

impl Element {
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin(), (self.width, self.height))
    }

    /// Copy moved to `origin`.
    pub fn with_origin(&self, origin: Point) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            ..self.clone()
        }
    }

    /// Copy with position and size taken from `rect`.
    pub fn with_rect(&self, rect: Rect) -> Self {
        Self {
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            ..self.clone()
        }
    }

    /// Same geometry as `rect`, compared exactly.
    pub fn matches_rect(&self, rect: Rect) -> bool {
        self.rect() == rect
    }
}

/// An element that has not been saved yet (no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDraft {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub icon: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ElementDraft {
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin(), (self.width, self.height))
    }

    pub fn with_origin(&self, origin: Point) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            ..self.clone()
        }
    }
}

/// Placement of an entity on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub entity: EntityId,
    #[serde(default)]
    pub kind: EntityKind,
    /// Top-left corner of the token's visual.
    pub coordinates: Point,
}

impl Token {
    /// Square visual of edge length `size`.
    pub fn bounds(&self, size: f64) -> Rect {
        Rect::from_origin_size(self.coordinates, (size, size))
    }

    /// Portrait circle inscribed in the visual, with a 10% margin.
    pub fn circle(&self, size: f64) -> Circle {
        Circle::new(self.bounds(size).center(), size * 0.4)
    }

    pub fn with_coordinates(&self, coordinates: Point) -> Self {
        Self {
            coordinates,
            ..self.clone()
        }
    }
}

/// Background image of the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub url: String,
    /// Natural size of the image; the image is centred on the world origin.
    pub size: Size,
}

impl Background {
    pub fn rect(&self) -> Rect {
        Rect::from_center_size(Point::ZERO, self.size)
    }
}

/// What lies under the pointer at pointer-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitTarget {
    /// Canvas surface or background image.
    #[default]
    Empty,
    Token(TokenId),
    Element(ElementId),
    ResizeHandle(ElementId, Corner),
    PreviewElement,
}

impl HitTarget {
    /// Whether the target belongs to an element (body or handle).
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element(_) | Self::ResizeHandle(..))
    }
}

/// The host-supplied content of the map plus per-token visibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub preview: Option<ElementDraft>,
    #[serde(default)]
    pub background: Option<Background>,
    #[serde(skip)]
    visibility: HashMap<TokenId, bool>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the element list.
    pub fn set_elements(&mut self, elements: Vec<Element>) {
        self.elements = elements;
        self.hide_defeated_opponents();
    }

    /// Replace the token list.
    pub fn set_tokens(&mut self, tokens: Vec<Token>) {
        self.tokens = tokens;
        self.hide_defeated_opponents();
    }

    pub fn set_entities(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    /// Roster entry a token stands for.
    pub fn entity_for(&self, token: &Token) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|e| e.id == token.entity && e.kind == token.kind)
    }

    /// Tokens are visible unless explicitly hidden.
    pub fn is_token_visible(&self, id: TokenId) -> bool {
        self.visibility.get(&id).copied().unwrap_or(true)
    }

    pub fn set_token_visibility(&mut self, id: TokenId, visible: bool) {
        self.visibility.insert(id, visible);
    }

    /// Flip a token's visibility. Returns the new visibility.
    pub fn toggle_token_visibility(&mut self, id: TokenId) -> bool {
        let visible = !self.is_token_visible(id);
        self.set_token_visibility(id, visible);
        visible
    }

    pub fn visible_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| self.is_token_visible(t.id))
    }

    /// Hide tokens of opponents whose encounter is completed.
    ///
    /// Never reveals a token; returns the ids hidden by this call.
    fn hide_defeated_opponents(&mut self) -> Vec<TokenId> {
        let mut hidden = Vec::new();
        for element in self.elements.iter().filter(|e| e.completed) {
            for token in &self.tokens {
                if token.kind == EntityKind::Opponent
                    && element.opponents.contains(&token.entity)
                    && self.visibility.get(&token.id) != Some(&false)
                {
                    self.visibility.insert(token.id, false);
                    hidden.push(token.id);
                }
            }
        }
        if !hidden.is_empty() {
            log::debug!("auto-hid tokens {:?}", hidden);
        }
        hidden
    }

    /// Find the topmost target at a world point.
    ///
    /// Paint order is elements, then the preview element, then tokens, so
    /// tokens win. Resize handles of `resize_selected` sit above everything;
    /// they follow the element passed in, which may differ from the board's
    /// copy while a resize is unconfirmed.
    pub fn hit_test(
        &self,
        point: Point,
        token_size: f64,
        handle_size: f64,
        resize_selected: Option<&Element>,
    ) -> HitTarget {
        if let Some(element) = resize_selected {
            let rect = element.rect();
            for corner in Corner::ALL {
                if corner.handle_rect(rect, handle_size).contains(point) {
                    return HitTarget::ResizeHandle(element.id, corner);
                }
            }
        }

        if let Some(token) = self
            .visible_tokens()
            .filter(|t| t.bounds(token_size).contains(point))
            .last()
        {
            return HitTarget::Token(token.id);
        }

        if self.preview.as_ref().is_some_and(|p| p.rect().contains(point)) {
            return HitTarget::PreviewElement;
        }

        self.elements
            .iter()
            .rev()
            .find(|e| e.rect().contains(point))
            .map_or(HitTarget::Empty, |e| HitTarget::Element(e.id))
    }
}

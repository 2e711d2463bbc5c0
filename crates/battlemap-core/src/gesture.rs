//! Gesture sessions and the ownership of their global listeners.
//!
//! A gesture runs from pointer-down to pointer-up (or cancel). While it runs,
//! the host must deliver pointer-move and pointer-up events even when the
//! pointer leaves the map, which means attaching listeners outside the map's
//! own element. [`GestureMachine`] pairs every attach with exactly one detach:
//! [`GestureMachine::begin`] acquires a [`ListenerLease`] and
//! [`GestureMachine::end`] is the only place it is released.

use crate::board::{Element, ElementDraft, Token};
use crate::resize::Corner;
use crate::transform::TransformSnapshot;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one gesture session.
pub type SessionId = Uuid;

/// Errors raised when a gesture cannot start or continue.
///
/// These never reach the host: the engine logs them and ignores the input.
#[derive(Debug, Error, PartialEq)]
pub enum GestureError {
    #[error("a gesture is already active")]
    AlreadyActive,
    #[error("no gesture is active")]
    NotActive,
    #[error("no render surface is mounted")]
    NoSurface,
    #[error("render surface has zero size")]
    EmptySurface,
    #[error("token {0} not found")]
    UnknownToken(i64),
    #[error("element {0} not found")]
    UnknownElement(i64),
    #[error("no preview element to drag")]
    NoPreviewElement,
    #[error("element {0} is not selected for resizing")]
    NotResizable(i64),
}

pub type GestureResult<T> = Result<T, GestureError>;

/// Global listeners a gesture needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    PointerMove,
    PointerUp,
    KeyUp,
}

/// Host-side listener attachment.
///
/// Implemented by the host shell; a browser host would add and remove window
/// event listeners here.
pub trait ListenerRegistry {
    fn attach(&mut self, session: SessionId, kinds: &[ListenerKind]);
    fn detach(&mut self, session: SessionId, kinds: &[ListenerKind]);
}

/// Listeners attached for one session. Released by consuming it.
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerLease {
    session: SessionId,
    kinds: Vec<ListenerKind>,
}

impl ListenerLease {
    fn acquire<L: ListenerRegistry>(registry: &mut L, session: SessionId, kinds: Vec<ListenerKind>) -> Self {
        registry.attach(session, &kinds);
        Self { session, kinds }
    }

    fn release<L: ListenerRegistry>(self, registry: &mut L) {
        registry.detach(self.session, &self.kinds);
    }

    pub fn kinds(&self) -> &[ListenerKind] {
        &self.kinds
    }
}

/// The interaction in progress and its scratch state.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Panning {
        /// World point under the pointer at pointer-down.
        start_world: Point,
        /// Viewport origin at pointer-down.
        origin_at_start: Point,
    },
    Drawing {
        start: Point,
        current: Point,
    },
    DraggingToken {
        token: Token,
        anchor: Vec2,
        position: Point,
    },
    DraggingElement {
        element: Element,
        anchor: Vec2,
        position: Point,
    },
    DraggingPreview {
        draft: ElementDraft,
        anchor: Vec2,
        position: Point,
    },
    Resizing {
        element: Element,
        corner: Corner,
        start_world: Point,
        rect: Rect,
    },
}

impl Gesture {
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::Panning { .. } => "panning",
            Gesture::Drawing { .. } => "drawing",
            Gesture::DraggingToken { .. } => "dragging_token",
            Gesture::DraggingElement { .. } => "dragging_element",
            Gesture::DraggingPreview { .. } => "dragging_preview",
            Gesture::Resizing { .. } => "resizing",
        }
    }

    /// Listeners to hold while this gesture runs.
    pub fn listener_kinds(&self) -> Vec<ListenerKind> {
        let mut kinds = vec![ListenerKind::PointerMove, ListenerKind::PointerUp];
        if matches!(self, Gesture::Panning { .. }) {
            kinds.push(ListenerKind::KeyUp);
        }
        kinds
    }
}

/// Rectangle spanned by two corners, with non-negative size.
pub fn normalize_rect(start: Point, current: Point) -> Rect {
    Rect::from_points(start, current)
}

/// State of one pointer-down-to-pointer-up interaction.
#[derive(Debug)]
pub struct GestureSession {
    pub id: SessionId,
    pub gesture: Gesture,
    /// Screen-to-world mapping fixed at pointer-down.
    pub snapshot: TransformSnapshot,
    /// Whether any pointer-move reached this session.
    pub moved: bool,
    lease: Option<ListenerLease>,
}

impl GestureSession {
    pub fn to_world(&self, screen: Point) -> Point {
        self.snapshot.to_world(screen)
    }

    pub fn lease(&self) -> Option<&ListenerLease> {
        self.lease.as_ref()
    }
}

/// Holds at most one [`GestureSession`] and its listener lease.
pub struct GestureMachine<L: ListenerRegistry> {
    registry: L,
    session: Option<GestureSession>,
}

impl<L: ListenerRegistry> GestureMachine<L> {
    pub fn new(registry: L) -> Self {
        Self {
            registry,
            session: None,
        }
    }

    pub fn registry(&self) -> &L {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut L {
        &mut self.registry
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut GestureSession> {
        self.session.as_mut()
    }

    /// Start a session and attach its listeners.
    pub fn begin(&mut self, gesture: Gesture, snapshot: TransformSnapshot) -> GestureResult<&mut GestureSession> {
        if self.session.is_some() {
            return Err(GestureError::AlreadyActive);
        }

        let id = Uuid::new_v4();
        let lease = ListenerLease::acquire(&mut self.registry, id, gesture.listener_kinds());
        log::debug!("gesture {} started ({})", gesture.name(), id);

        Ok(self.session.insert(GestureSession {
            id,
            gesture,
            snapshot,
            moved: false,
            lease: Some(lease),
        }))
    }

    /// End the active session and release its listeners.
    ///
    /// Returns the finished session so the caller can commit or discard it.
    pub fn end(&mut self) -> Option<GestureSession> {
        let mut session = self.session.take()?;
        if let Some(lease) = session.lease.take() {
            lease.release(&mut self.registry);
        }
        log::debug!("gesture {} ended ({})", session.gesture.name(), session.id);
        Some(session)
    }
}

impl<L: ListenerRegistry> Drop for GestureMachine<L> {
    fn drop(&mut self) {
        self.end();
    }
}

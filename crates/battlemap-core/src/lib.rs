//! Battle Map Core Library
//!
//! Platform-agnostic engine for the interactive battle map: coordinate
//! transforms, viewport control, gestures and transient rendering.

pub mod board;
pub mod config;
pub mod engine;
pub mod gesture;
pub mod input;
pub mod mode;
pub mod render_sync;
pub mod resize;
pub mod transform;
pub mod viewport;

pub use board::{Background, Board, Element, ElementDraft, ElementId, Entity, EntityKind, HitTarget, Token, TokenId};
pub use config::{ConfigError, ConfigResult, MapConfig};
pub use engine::{BattleMap, MapEvent};
pub use gesture::{Gesture, GestureError, GestureMachine, ListenerKind, ListenerLease, ListenerRegistry, SessionId};
pub use input::{InputState, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use mode::{DrawStyle, Mode};
pub use render_sync::{FrameRequest, RenderSurface, RenderSync};
pub use resize::Corner;
pub use transform::{TransformSnapshot, to_world};
pub use viewport::{Viewport, ViewportController, ZoomDirection};

//! Input events and per-session input tracking.

use crate::board::HitTarget;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on Linux/Windows or Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in screen coordinates.
///
/// `target` on `Down` is what the host's hit test found under the pointer;
/// hosts without their own hit testing can use [`crate::board::Board::hit_test`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    Down {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        target: HitTarget,
    },
    Move {
        position: Point,
    },
    Up {
        position: Point,
        #[serde(default)]
        button: MouseButton,
    },
    Wheel {
        position: Point,
        delta: Vec2,
        #[serde(default)]
        modifiers: Modifiers,
    },
}

/// Keyboard event.
///
/// `code` is the physical key name (`"Space"`), `key` the produced value
/// (`"Escape"`, `"+"`, `"d"`), as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyEvent {
    Pressed {
        code: String,
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Released {
        code: String,
    },
}

/// Tracks held keys.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Physical codes of currently held keys.
    pressed_keys: HashSet<String>,
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key event. Returns `false` for auto-repeat presses.
    pub fn handle_key_event(&mut self, event: &KeyEvent) -> bool {
        match event {
            KeyEvent::Pressed { code, .. } => self.pressed_keys.insert(code.clone()),
            KeyEvent::Released { code } => self.pressed_keys.remove(code),
        }
    }

    /// Check if a key is currently held.
    pub fn is_key_pressed(&self, code: &str) -> bool {
        self.pressed_keys.contains(code)
    }

    /// Forget held keys (window lost focus).
    pub fn release_all(&mut self) {
        self.pressed_keys.clear();
    }
}

//! Interaction modes and the style of newly drawn elements.

use crate::board::DEFAULT_ELEMENT_ICON;
use serde::{Deserialize, Serialize};

/// Active interaction mode.
///
/// Pan and draw share one value, so both can never be on at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Select,
    Pan,
    Draw,
}

impl Mode {
    /// Space pressed: pan mode, draw forced off.
    pub fn hold_pan(self) -> Self {
        Mode::Pan
    }

    /// Space released.
    pub fn release_pan(self) -> Self {
        match self {
            Mode::Pan => Mode::Select,
            other => other,
        }
    }

    /// Toolbar draw button or Ctrl/Cmd+D. Pan is forced off.
    pub fn toggle_draw(self) -> Self {
        match self {
            Mode::Draw => Mode::Select,
            Mode::Select | Mode::Pan => Mode::Draw,
        }
    }

    /// Zoom buttons and window blur drop a held pan.
    pub fn clear_pan(self) -> Self {
        self.release_pan()
    }

    /// A draw gesture ended.
    pub fn finish_draw(self) -> Self {
        match self {
            Mode::Draw => Mode::Select,
            other => other,
        }
    }

    pub fn is_pan(self) -> bool {
        self == Mode::Pan
    }

    pub fn is_draw(self) -> bool {
        self == Mode::Draw
    }
}

/// Style applied to elements created by a draw gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawStyle {
    pub color: String,
    pub icon: String,
    pub title: Option<String>,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: "#3b82f6".to_string(),
            icon: DEFAULT_ELEMENT_ICON.to_string(),
            title: None,
        }
    }
}

//! Scene and input-script files read by the replay host.

use crate::error::{AppError, AppResult};
use battlemap_core::board::{Background, Board, ElementDraft, TokenId};
use battlemap_core::config::MapConfig;
use battlemap_core::input::{KeyEvent, PointerEvent};
use battlemap_core::mode::DrawStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Initial state of the map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub board: Board,
    /// Overrides the config file when present.
    pub config: Option<MapConfig>,
    pub draw_style: Option<DrawStyle>,
    pub selected_token: Option<TokenId>,
}

/// One scripted input.
///
/// Pointer-down events without a `target` are resolved by hit testing the
/// current scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Pointer { event: PointerEvent },
    Key { event: KeyEvent },
    /// Window lost focus.
    Blur,
    /// Animation frame.
    Frame,
    ToggleDraw,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    ToggleVisibility { token: TokenId },
    Cancel,
    SetBackground { background: Option<Background> },
    SetPreview { preview: Option<ElementDraft> },
    /// Host layout changed.
    Resize { width: f64, height: f64 },
}

fn read(path: &Path) -> AppResult<String> {
    fs::read_to_string(path).map_err(|e| AppError::Io(format!("{}: {}", path.display(), e)))
}

fn parse_error(path: &Path, err: serde_json::Error) -> AppError {
    AppError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

impl SceneFile {
    pub fn load(path: &Path) -> AppResult<Self> {
        serde_json::from_str(&read(path)?).map_err(|e| parse_error(path, e))
    }
}

pub fn load_script(path: &Path) -> AppResult<Vec<Step>> {
    serde_json::from_str(&read(path)?).map_err(|e| parse_error(path, e))
}

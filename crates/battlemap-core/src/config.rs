//! Tunable limits for the battle map engine.

use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Lowest zoom factor reachable by any zoom operation.
    pub min_zoom: f64,
    /// Highest zoom factor reachable by any zoom operation.
    pub max_zoom: f64,
    /// Relative change applied by one zoom button press (0.2 = 20%).
    pub zoom_step: f64,
    /// Base of the exponential wheel zoom: `factor = wheel_base^(-delta_y)`.
    pub wheel_base: f64,
    /// Drawn rectangles must exceed this size on both axes to be kept.
    pub draw_threshold: f64,
    /// Smallest width/height an element can be resized to.
    pub resize_min_size: f64,
    /// Window shown at session start and after a reset (until a background is fitted).
    pub default_viewport: Viewport,
    /// Edge length of a token's square visual, in world units.
    pub token_size: f64,
    /// Edge length of an element's resize handle, in world units.
    pub handle_size: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 5.0,
            zoom_step: 0.2,
            wheel_base: 1.005,
            draw_threshold: 5.0,
            resize_min_size: 50.0,
            default_viewport: Viewport::new(0.0, 0.0, 1000.0, 1000.0),
            token_size: 100.0,
            handle_size: 16.0,
        }
    }
}

impl MapConfig {
    /// Parse and validate a config from JSON.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded map config from {}", path.display());
        Ok(config)
    }

    /// Load the config at the default location, falling back to defaults
    /// when the file is missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Default config location.
    ///
    /// On Unix: `~/.config/battlemap/config.json`
    /// On Windows: `%APPDATA%\battlemap\config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("battlemap").join("config.json"))
    }

    /// Serialize the config to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that the limits describe a usable engine.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.min_zoom > 0.0) {
            return Err(ConfigError::Invalid("min_zoom must be positive".into()));
        }
        if self.max_zoom < self.min_zoom {
            return Err(ConfigError::Invalid(format!(
                "max_zoom ({}) is below min_zoom ({})",
                self.max_zoom, self.min_zoom
            )));
        }
        // The default viewport is shown at zoom 1.
        if !(self.min_zoom <= 1.0 && 1.0 <= self.max_zoom) {
            return Err(ConfigError::Invalid(format!(
                "zoom limits [{}, {}] must include 1",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.zoom_step > 0.0 && self.zoom_step < 1.0) {
            return Err(ConfigError::Invalid("zoom_step must be in (0, 1)".into()));
        }
        if !(self.wheel_base > 1.0) {
            return Err(ConfigError::Invalid("wheel_base must be greater than 1".into()));
        }
        if self.draw_threshold < 0.0 || self.resize_min_size < 0.0 {
            return Err(ConfigError::Invalid("size thresholds must not be negative".into()));
        }
        if !self.default_viewport.is_valid() {
            return Err(ConfigError::Invalid("default_viewport must have a positive size".into()));
        }
        if !(self.token_size > 0.0 && self.handle_size > 0.0) {
            return Err(ConfigError::Invalid("token_size and handle_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.min_zoom - 0.1).abs() < f64::EPSILON);
        assert!((config.max_zoom - 5.0).abs() < f64::EPSILON);
        assert!((config.draw_threshold - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MapConfig::from_json(r#"{ "max_zoom": 8.0 }"#).unwrap();
        assert!((config.max_zoom - 8.0).abs() < f64::EPSILON);
        assert!((config.zoom_step - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.default_viewport, Viewport::new(0.0, 0.0, 1000.0, 1000.0));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = MapConfig {
            resize_min_size: 32.0,
            ..MapConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(MapConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_inverted_zoom_limits() {
        let result = MapConfig::from_json(r#"{ "min_zoom": 2.0, "max_zoom": 1.0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_limits_excluding_initial_zoom() {
        for json in [r#"{ "min_zoom": 2.0, "max_zoom": 5.0 }"#, r#"{ "min_zoom": 0.1, "max_zoom": 0.5 }"#] {
            let result = MapConfig::from_json(json);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{json}");
        }
        assert!(MapConfig::from_json(r#"{ "min_zoom": 1.0, "max_zoom": 1.0 }"#).is_ok());
    }

    #[test]
    fn test_rejects_degenerate_viewport() {
        let result = MapConfig::from_json(
            r#"{ "default_viewport": { "x": 0, "y": 0, "width": 0, "height": 10 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = MapConfig::from_json("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "zoom_step": 0.25, "draw_threshold": 10.0 }}"#).unwrap();

        let config = MapConfig::load(file.path()).unwrap();
        assert!((config.zoom_step - 0.25).abs() < f64::EPSILON);
        assert!((config.draw_threshold - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = MapConfig::load(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

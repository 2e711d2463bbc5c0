//! Battle Map replay host
//!
//! Loads a scene, feeds a script of pointer, keyboard and toolbar inputs to
//! the engine, persists the events it raises and re-renders the committed
//! state onto a scene graph.

mod app;
mod error;
mod listeners;
mod script;
mod shortcuts;

pub use app::{App, AppConfig, Cli, Command, SurfaceSize, run};
pub use error::{AppError, AppResult};
pub use listeners::WindowListeners;
pub use script::{SceneFile, Step, load_script};
pub use shortcuts::{Shortcut, ShortcutRegistry};

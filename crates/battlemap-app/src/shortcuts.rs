//! Keyboard shortcut registry and documentation.

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub command: bool,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(key: &'static str, command: bool, description: &'static str) -> Self {
        Self {
            key,
            command,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+D").
    pub fn format(&self) -> String {
        if self.command {
            format!("Ctrl/Cmd+{}", self.key)
        } else {
            self.key.to_string()
        }
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("Space (hold)", false, "Pan the map"),
            Shortcut::new("Escape", false, "Clear token selection"),
            Shortcut::new("D", true, "Toggle draw mode"),
            Shortcut::new("S", true, "Toggle side panel"),
            Shortcut::new("+", true, "Zoom in"),
            Shortcut::new("-", true, "Zoom out"),
            Shortcut::new("Wheel", true, "Zoom around the pointer"),
        ]
    }

    /// Render all shortcuts as a help table.
    pub fn help() -> String {
        let mut out = String::from("Keyboard shortcuts:\n");
        for shortcut in Self::all() {
            out.push_str(&format!("  {:20} {}\n", shortcut.format(), shortcut.description));
        }
        out
    }
}

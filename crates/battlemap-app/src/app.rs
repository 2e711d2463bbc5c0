//! Replay host: drives a [`BattleMap`] from a script and plays the role of
//! the surrounding application.

use crate::error::{AppError, AppResult};
use crate::listeners::WindowListeners;
use crate::script::{SceneFile, Step, load_script};
use crate::shortcuts::ShortcutRegistry;
use battlemap_core::board::{Board, Element, HitTarget, Token};
use battlemap_core::config::MapConfig;
use battlemap_core::engine::{BattleMap, MapEvent};
use battlemap_core::gesture::ListenerKind;
use battlemap_core::input::PointerEvent;
use battlemap_core::mode::Mode;
use battlemap_core::render_sync::RenderSurface;
use battlemap_core::viewport::Viewport;
use battlemap_render::{RenderContext, SceneGraph};
use clap::{Args, Parser, Subcommand};
use kurbo::Rect;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Command line.
#[derive(Parser, Debug)]
#[command(name = "battlemap", version, about = "Replay input scripts against the battle map engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Replay an input script against a scene and print the events.
    Replay(AppConfig),
    /// List the keyboard shortcuts.
    Shortcuts,
}

/// Replay options.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Scene file: board, optional engine config, draw style.
    #[arg(value_name = "SCENE")]
    pub scene_path: PathBuf,
    /// Input script: a JSON array of steps.
    #[arg(value_name = "SCRIPT")]
    pub script_path: PathBuf,
    /// Engine config file; the default location is used when absent.
    #[arg(long = "config", env = "BATTLEMAP_CONFIG", value_name = "FILE")]
    pub config_path: Option<PathBuf>,
    /// Surface size in pixels.
    #[arg(long, value_name = "WxH", default_value = "1280x800", value_parser = parse_size)]
    pub size: SurfaceSize,
    /// Print the final board and viewport after the script.
    #[arg(long = "state")]
    pub print_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub fn to_rect(self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

fn parse_size(value: &str) -> Result<SurfaceSize, String> {
    let invalid = || format!("expected WxH with positive sizes, got {value:?}");
    let (w, h) = value.split_once('x').ok_or_else(invalid)?;
    let width: f64 = w.trim().parse().map_err(|_| invalid())?;
    let height: f64 = h.trim().parse().map_err(|_| invalid())?;
    if !(width > 0.0 && height > 0.0) {
        return Err(invalid());
    }
    Ok(SurfaceSize { width, height })
}

#[derive(Serialize)]
struct FinalState<'a> {
    viewport: Viewport,
    zoom: f64,
    mode: Mode,
    selected_token: Option<i64>,
    aside_open: bool,
    elements: &'a [Element],
    tokens: &'a [Token],
}

/// Application state around the map.
pub struct App {
    map: BattleMap<SceneGraph, WindowListeners>,
    /// The host's own copy of the board, standing in for persistence.
    store: Board,
    aside_open: bool,
    frame_pending: bool,
}

impl App {
    pub fn new(scene: SceneFile, config: MapConfig, surface: Rect) -> Self {
        let mut map = BattleMap::new(config, WindowListeners::new());
        map.mount(SceneGraph::new(surface));
        if let Some(style) = scene.draw_style.clone() {
            map.set_draw_style(style);
        }

        let mut app = Self {
            map,
            store: scene.board.clone(),
            aside_open: false,
            frame_pending: false,
        };
        app.map.set_entities(scene.board.entities);
        app.map.set_preview_element(scene.board.preview);
        app.map.set_elements(scene.board.elements);
        app.map.set_tokens(scene.board.tokens);
        app.map.set_selected_token(scene.selected_token);
        app.map.set_background(scene.board.background);
        app.rebuild();
        app
    }

    pub fn map(&self) -> &BattleMap<SceneGraph, WindowListeners> {
        &self.map
    }

    pub fn store(&self) -> &Board {
        &self.store
    }

    pub fn aside_open(&self) -> bool {
        self.aside_open
    }

    /// Feed one step to the map and apply the resulting events.
    pub fn step(&mut self, step: &Step) -> Vec<MapEvent> {
        let events = match step {
            Step::Pointer { event } => self.pointer(event),
            Step::Key { event } => self.map.handle_key_event(event),
            Step::Blur => {
                self.map.blur();
                Vec::new()
            }
            Step::Frame => {
                self.frame_pending = false;
                self.map.animation_frame();
                Vec::new()
            }
            Step::ToggleDraw => {
                self.map.toggle_draw();
                Vec::new()
            }
            Step::ZoomIn => self.map.zoom_in(),
            Step::ZoomOut => self.map.zoom_out(),
            Step::ResetZoom => self.map.reset_zoom(),
            Step::ToggleVisibility { token } => {
                let events = self.map.toggle_token_visibility(*token);
                self.rebuild();
                events
            }
            Step::Cancel => {
                self.map.cancel_gesture();
                Vec::new()
            }
            Step::SetBackground { background } => {
                self.store.background = background.clone();
                self.map.set_background(background.clone())
            }
            Step::SetPreview { preview } => {
                self.store.preview = preview.clone();
                self.map.set_preview_element(preview.clone());
                self.rebuild();
                Vec::new()
            }
            Step::Resize { width, height } => {
                if let Some(surface) = self.map.surface_mut() {
                    surface.set_bounds(Rect::new(0.0, 0.0, *width, *height));
                }
                Vec::new()
            }
        };
        self.apply(events)
    }

    fn pointer(&mut self, event: &PointerEvent) -> Vec<MapEvent> {
        let listeners = self.map.listeners();
        match event {
            PointerEvent::Down {
                position,
                button,
                target: HitTarget::Empty,
            } => {
                let target = self.map.hit_test(*position);
                self.map.pointer_down(*position, *button, target)
            }
            PointerEvent::Move { .. } if !listeners.is_listening(ListenerKind::PointerMove) => Vec::new(),
            PointerEvent::Up { .. } if !listeners.is_listening(ListenerKind::PointerUp) => Vec::new(),
            _ => self.map.handle_pointer_event(event),
        }
    }

    /// Apply events the way a persisting host would, then hand the new data
    /// back to the map. Events raised by the setters are applied too.
    fn apply(&mut self, events: Vec<MapEvent>) -> Vec<MapEvent> {
        let mut applied = Vec::new();
        let mut queue = events;
        let mut committed = false;

        while !queue.is_empty() {
            let mut follow_up = Vec::new();
            for event in queue {
                match &event {
                    MapEvent::ElementDrawn(draft) => {
                        let id = self.store.elements.iter().map(|e| e.id).max().unwrap_or(0) + 1;
                        self.store.elements.push(Element {
                            id,
                            x: draft.x,
                            y: draft.y,
                            width: draft.width,
                            height: draft.height,
                            color: draft.color.clone(),
                            icon: draft.icon.clone(),
                            name: draft.name.clone(),
                            completed: false,
                            opponents: Vec::new(),
                            combat_active: false,
                        });
                        follow_up.extend(self.map.set_elements(self.store.elements.clone()));
                        committed = true;
                    }
                    MapEvent::ElementMoved(element) => {
                        if let Some(slot) = self.store.elements.iter_mut().find(|e| e.id == element.id) {
                            *slot = element.clone();
                        }
                        follow_up.extend(self.map.set_elements(self.store.elements.clone()));
                        committed = true;
                    }
                    MapEvent::TokenMoved(token) => {
                        if let Some(slot) = self.store.tokens.iter_mut().find(|t| t.id == token.id) {
                            *slot = token.clone();
                        }
                        follow_up.extend(self.map.set_tokens(self.store.tokens.clone()));
                        committed = true;
                    }
                    MapEvent::PreviewMoved(draft) => {
                        self.store.preview = Some(draft.clone());
                        self.map.set_preview_element(Some(draft.clone()));
                        committed = true;
                    }
                    MapEvent::TokenSelected(_) | MapEvent::ElementClicked(_) | MapEvent::ViewportChanged(_) => {
                        committed = true;
                    }
                    MapEvent::ToggleAside => self.aside_open = !self.aside_open,
                    MapEvent::FrameRequested => self.frame_pending = true,
                }
                applied.push(event);
            }
            queue = follow_up;
        }

        if committed {
            self.rebuild();
        }
        applied
    }

    /// Declarative render of the committed state onto the surface.
    fn rebuild(&mut self) {
        let elements = self.map.elements();
        let viewport = self.map.viewport().committed();
        let selected = self.map.selected_token().map(|t| t.id);
        let resize = self.map.resize_selected();
        let config = self.map.config().clone();

        let (surface, board) = self.map.surface_and_board();
        if let Some(surface) = surface {
            let ctx = RenderContext::new(board, viewport)
                .with_elements(&elements)
                .with_selection(selected, resize)
                .with_config(&config);
            surface.rebuild(&ctx);
        }
    }

    /// Run every step, writing each host-visible event as a JSON line.
    pub fn run_script<W: Write>(&mut self, steps: &[Step], out: &mut W) -> AppResult<()> {
        for step in steps {
            for event in self.step(step) {
                if event == MapEvent::FrameRequested {
                    continue;
                }
                write_json(out, &event)?;
            }
        }
        if self.frame_pending {
            self.frame_pending = false;
            self.map.animation_frame();
        }
        Ok(())
    }

    pub fn write_state<W: Write>(&self, out: &mut W) -> AppResult<()> {
        let state = FinalState {
            viewport: self.map.viewport().committed(),
            zoom: self.map.viewport().zoom(),
            mode: self.map.mode(),
            selected_token: self.map.selected_token().map(|t| t.id),
            aside_open: self.aside_open,
            elements: &self.store.elements,
            tokens: &self.store.tokens,
        };
        write_json(out, &state)
    }

    /// Encode the current scene graph for the GPU.
    #[cfg(feature = "vello-renderer")]
    pub fn encode_frame(&self) -> Option<battlemap_render::VelloRenderer> {
        use battlemap_render::Renderer;

        let graph = self.map.surface()?;
        let mut renderer = battlemap_render::VelloRenderer::new();
        renderer.build_scene(graph);
        Some(renderer)
    }

    /// Surface bounds currently in use.
    pub fn surface_bounds(&self) -> Option<Rect> {
        self.map.surface().map(|s| s.bounds())
    }
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> AppResult<()> {
    let line = serde_json::to_string(value).map_err(|e| AppError::Output(e.to_string()))?;
    writeln!(out, "{line}").map_err(|e| AppError::Output(e.to_string()))
}

/// Entry point used by the binary.
pub fn run<W: Write>(command: Command, out: &mut W) -> AppResult<()> {
    let config = match command {
        Command::Shortcuts => {
            write!(out, "{}", ShortcutRegistry::help()).map_err(|e| AppError::Output(e.to_string()))?;
            return Ok(());
        }
        Command::Replay(config) => config,
    };

    let scene = SceneFile::load(&config.scene_path)?;
    let steps = load_script(&config.script_path)?;
    let map_config = match (&scene.config, &config.config_path) {
        (Some(inline), _) => {
            inline.validate()?;
            inline.clone()
        }
        (None, Some(path)) => MapConfig::load(path)?,
        (None, None) => MapConfig::load_or_default(),
    };

    log::info!("replaying {} steps from {}", steps.len(), config.script_path.display());
    let mut app = App::new(scene, map_config, config.size.to_rect());
    app.run_script(&steps, out)?;
    if config.print_state {
        app.write_state(out)?;
    }

    #[cfg(feature = "vello-renderer")]
    if app.encode_frame().is_some() {
        log::debug!("final frame encoded");
    }

    let (attached, detached) = app.map().listeners().totals();
    log::info!("listeners attached {attached}, detached {detached}");
    Ok(())
}

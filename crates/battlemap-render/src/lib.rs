//! Battle Map Render Library
//!
//! Retained scene graph used as the engine's render surface, plus a renderer
//! abstraction. The default implementation uses Vello for GPU-accelerated
//! rendering.

pub mod color;
mod renderer;
pub mod scene;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use color::{Rgba, parse_hex};
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};
pub use scene::{NodeKind, NodeShape, SceneGraph, SceneNode};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;

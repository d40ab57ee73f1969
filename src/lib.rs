//! Forward Renderer - a small forward renderer with a normal/specular material
//! and bitmap text overlay
//!
//! The renderer drives an immediate-mode graphics state machine through the
//! [`GraphicsBackend`] trait. Two backends are provided:
//! - **wgpu**: records the state machine into render passes on a window surface
//! - **recording**: keeps every call in memory, for tests and headless runs
//!
//! # Frame
//! `setup` once, then per frame `begin_frame`, any number of `render_model`,
//! `render_quad`, `render_char` and `render_string` calls, and `end_frame`;
//! `finish` releases the shader and material.

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod window;

pub use backend::recording::RecordingBackend;
pub use backend::traits::{BackendError, BackendResult, GraphicsBackend};
pub use backend::types::{ErrorCode, TextureHandle};
pub use backend::wgpu_backend::{WgpuBackend, WgpuBackendConfig};
pub use config::RendererConfig;
pub use error::{RenderResult, RendererError};
pub use renderer::Renderer;
pub use resources::{Font, Glyph, Material, MaterialAssets, MeshError, RenderMesh, RenderModel, TextureData};
pub use scene::{Camera, Lighting, PerspectiveCamera};
pub use window::Window;

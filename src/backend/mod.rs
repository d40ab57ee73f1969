//! Backend abstraction layer
//!
//! Provides the state-machine trait the renderer drives, a wgpu implementation
//! and a recording implementation used in tests and headless runs.

pub mod recording;
pub mod reflection;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use recording::{Call, RecordingBackend};
pub use reflection::ShaderReflection;
pub use traits::*;
pub use types::*;

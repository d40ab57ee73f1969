//! Core backend abstraction traits
//!
//! The renderer drives the graphics context through an immediate-mode state
//! machine: capabilities, matrices, the bound program and textures, and vertex
//! arrays persist until changed, and draw calls consume the current state.

use crate::backend::reflection::ShaderReflection;
use crate::backend::types::*;
use glam::Mat4;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Main graphics backend trait
pub trait GraphicsBackend {
    // Global state

    /// Colour written by `clear` with `ClearMask::COLOR`
    fn set_clear_color(&mut self, color: [f32; 4]);

    /// Depth written by `clear` with `ClearMask::DEPTH`
    fn set_clear_depth(&mut self, depth: f32);

    fn enable(&mut self, capability: Capability);

    fn disable(&mut self, capability: Capability);

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor);

    /// Clear the selected buffers of the current frame
    fn clear(&mut self, mask: ClearMask);

    /// Replace the model-view or projection matrix
    fn load_matrix(&mut self, mode: MatrixMode, matrix: Mat4);

    // Programs

    /// Compile and link a program from WGSL vertex and fragment sources
    fn create_program(
        &mut self,
        label: Option<&str>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<ProgramHandle>;

    fn delete_program(&mut self, program: ProgramHandle);

    /// Reflection of a live program, `None` for unknown handles
    fn program_reflection(&self, program: ProgramHandle) -> Option<&ShaderReflection>;

    /// Vertex input slot of the named attribute
    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<AttribLocation> {
        self.program_reflection(program)?.attrib_location(name)
    }

    /// Location of the named uniform
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.program_reflection(program)?.uniform_location(name)
    }

    /// Bind a program; `None` selects the built-in textured pipeline
    fn use_program(&mut self, program: Option<ProgramHandle>);

    /// Set a uniform of the currently bound program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    // Textures

    fn create_texture(&mut self, image: &ImageData<'_>) -> BackendResult<TextureHandle>;

    fn delete_texture(&mut self, texture: TextureHandle);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    // Vertex arrays

    fn enable_client_array(&mut self, array: ClientArray);

    fn disable_client_array(&mut self, array: ClientArray);

    fn client_array_pointer(&mut self, array: ClientArray, data: VertexData<'_>);

    fn enable_attrib_array(&mut self, location: AttribLocation);

    fn disable_attrib_array(&mut self, location: AttribLocation);

    fn attrib_pointer(&mut self, location: AttribLocation, data: VertexData<'_>);

    // Draws

    /// Draw `count` vertices from the enabled arrays starting at `first`
    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Draw the enabled arrays through an index list
    fn draw_elements(&mut self, topology: Topology, indices: &[u32]);

    /// Draw vertices supplied inline, ignoring the enabled arrays
    fn draw_immediate(&mut self, topology: Topology, vertices: &[TexturedVertex]);

    // Frame

    /// Submit all recorded work
    fn flush(&mut self);

    /// Present the back buffer
    fn present(&mut self) -> BackendResult<()>;

    /// Return and reset the first error raised since the last query
    fn get_error(&mut self) -> ErrorCode;
}

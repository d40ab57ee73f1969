//! Recording backend for tests and headless runs.
//!
//! This backend performs no GPU work. It records every call with its
//! arguments and tracks just enough state to raise the same error flags a
//! real context would (unbound program, unknown handles, out-of-range indices).

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use glam::Mat4;

use crate::backend::reflection::ShaderReflection;
use crate::backend::traits::*;
use crate::backend::types::*;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetClearColor([f32; 4]),
    SetClearDepth(f32),
    Enable(Capability),
    Disable(Capability),
    SetViewport { x: i32, y: i32, width: u32, height: u32 },
    SetBlendFunc { src: BlendFactor, dst: BlendFactor },
    Clear(ClearMask),
    LoadMatrix { mode: MatrixMode, matrix: Mat4 },
    CreateProgram { program: ProgramHandle, label: Option<String> },
    DeleteProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    SetUniform { location: UniformLocation, value: UniformValue },
    CreateTexture { texture: TextureHandle, width: u32, height: u32 },
    DeleteTexture(TextureHandle),
    BindTexture { unit: u32, texture: Option<TextureHandle> },
    EnableClientArray(ClientArray),
    DisableClientArray(ClientArray),
    ClientArrayPointer { array: ClientArray, data: OwnedVertexData },
    EnableAttribArray(AttribLocation),
    DisableAttribArray(AttribLocation),
    AttribPointer { location: AttribLocation, data: OwnedVertexData },
    DrawArrays { topology: Topology, first: u32, count: u32 },
    DrawElements { topology: Topology, indices: Vec<u32> },
    DrawImmediate { topology: Topology, vertices: Vec<TexturedVertex> },
    Flush,
    Present,
}

impl Call {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Call::DrawArrays { .. } | Call::DrawElements { .. } | Call::DrawImmediate { .. }
        )
    }
}

/// Backend that records calls instead of rendering
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<Call>,
    programs: HashMap<u64, ShaderReflection>,
    textures: HashSet<u64>,
    current_program: Option<ProgramHandle>,
    client_arrays: HashMap<ClientArray, (bool, usize)>,
    attrib_arrays: HashMap<AttribLocation, (bool, usize)>,
    error: Option<ErrorCode>,
    lookups: Cell<usize>,
    fail_present: bool,
    next_program_id: u64,
    next_texture_id: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_program_id: 1,
            next_texture_id: 1,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Drain the recorded calls
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn draw_calls(&self) -> Vec<&Call> {
        self.calls.iter().filter(|call| call.is_draw()).collect()
    }

    /// Number of `attrib_location` / `uniform_location` queries answered so far
    pub fn location_lookups(&self) -> usize {
        self.lookups.get()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Raise an error flag as if the context had reported it
    pub fn raise_error(&mut self, code: ErrorCode) {
        self.error.get_or_insert(code);
    }

    /// Make the next `present` calls fail with `SurfaceLost`
    pub fn set_fail_present(&mut self, fail: bool) {
        self.fail_present = fail;
    }

    fn record(&mut self, call: Call) {
        log::trace!("RecordingBackend: {call:?}");
        self.calls.push(call);
    }

    /// Smallest vertex count over the arrays a draw would read
    fn enabled_vertex_count(&self) -> Option<usize> {
        self.client_arrays
            .values()
            .chain(self.attrib_arrays.values())
            .filter(|(enabled, _)| *enabled)
            .map(|(_, count)| *count)
            .min()
    }
}

impl GraphicsBackend for RecordingBackend {
    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.record(Call::SetClearColor(color));
    }

    fn set_clear_depth(&mut self, depth: f32) {
        self.record(Call::SetClearDepth(depth));
    }

    fn enable(&mut self, capability: Capability) {
        self.record(Call::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.record(Call::Disable(capability));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record(Call::SetViewport { x, y, width, height });
    }

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.record(Call::SetBlendFunc { src, dst });
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record(Call::Clear(mask));
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: Mat4) {
        self.record(Call::LoadMatrix { mode, matrix });
    }

    fn create_program(
        &mut self,
        label: Option<&str>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<ProgramHandle> {
        let reflection = ShaderReflection::from_wgsl(vertex_source, fragment_source)?;

        let program = ProgramHandle(self.next_program_id);
        self.next_program_id += 1;
        self.programs.insert(program.0, reflection);

        self.record(Call::CreateProgram {
            program,
            label: label.map(str::to_string),
        });
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program.0).is_none() {
            self.raise_error(ErrorCode::InvalidValue);
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.record(Call::DeleteProgram(program));
    }

    fn program_reflection(&self, program: ProgramHandle) -> Option<&ShaderReflection> {
        self.programs.get(&program.0)
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<AttribLocation> {
        self.lookups.set(self.lookups.get() + 1);
        self.program_reflection(program)?.attrib_location(name)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.lookups.set(self.lookups.get() + 1);
        self.program_reflection(program)?.uniform_location(name)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        match program {
            Some(handle) if !self.programs.contains_key(&handle.0) => {
                self.raise_error(ErrorCode::InvalidValue);
            }
            _ => self.current_program = program,
        }
        self.record(Call::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let declared = self
            .current_program
            .and_then(|program| self.programs.get(&program.0))
            .and_then(|reflection| reflection.uniform(location))
            .map(|uniform| uniform.ty);

        let accepted = match declared {
            Some(UniformType::Sampler) => matches!(value, UniformValue::Int(unit) if unit >= 0),
            Some(ty) => ty == value.ty(),
            None => false,
        };
        if !accepted {
            self.raise_error(ErrorCode::InvalidOperation);
        }
        self.record(Call::SetUniform { location, value });
    }

    fn create_texture(&mut self, image: &ImageData<'_>) -> BackendResult<TextureHandle> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}: {}x{} image with {} bytes",
                image.label.unwrap_or("texture"),
                image.width,
                image.height,
                image.rgba.len()
            )));
        }

        let texture = TextureHandle(self.next_texture_id);
        self.next_texture_id += 1;
        self.textures.insert(texture.0);

        self.record(Call::CreateTexture {
            texture,
            width: image.width,
            height: image.height,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if !self.textures.remove(&texture.0) {
            self.raise_error(ErrorCode::InvalidValue);
        }
        self.record(Call::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        if texture.is_some_and(|t| !self.textures.contains(&t.0)) {
            self.raise_error(ErrorCode::InvalidValue);
        }
        self.record(Call::BindTexture { unit, texture });
    }

    fn enable_client_array(&mut self, array: ClientArray) {
        self.client_arrays.entry(array).or_insert((false, 0)).0 = true;
        self.record(Call::EnableClientArray(array));
    }

    fn disable_client_array(&mut self, array: ClientArray) {
        self.client_arrays.entry(array).or_insert((false, 0)).0 = false;
        self.record(Call::DisableClientArray(array));
    }

    fn client_array_pointer(&mut self, array: ClientArray, data: VertexData<'_>) {
        self.client_arrays.entry(array).or_insert((false, 0)).1 = data.vertex_count();
        self.record(Call::ClientArrayPointer {
            array,
            data: data.to_owned(),
        });
    }

    fn enable_attrib_array(&mut self, location: AttribLocation) {
        self.attrib_arrays.entry(location).or_insert((false, 0)).0 = true;
        self.record(Call::EnableAttribArray(location));
    }

    fn disable_attrib_array(&mut self, location: AttribLocation) {
        self.attrib_arrays.entry(location).or_insert((false, 0)).0 = false;
        self.record(Call::DisableAttribArray(location));
    }

    fn attrib_pointer(&mut self, location: AttribLocation, data: VertexData<'_>) {
        self.attrib_arrays.entry(location).or_insert((false, 0)).1 = data.vertex_count();
        self.record(Call::AttribPointer {
            location,
            data: data.to_owned(),
        });
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        let available = self.enabled_vertex_count().unwrap_or(0);
        if (first + count) as usize > available {
            self.raise_error(ErrorCode::InvalidValue);
        }
        self.record(Call::DrawArrays { topology, first, count });
    }

    fn draw_elements(&mut self, topology: Topology, indices: &[u32]) {
        let available = self.enabled_vertex_count().unwrap_or(0);
        if indices.iter().any(|&index| index as usize >= available) {
            self.raise_error(ErrorCode::InvalidValue);
        }
        self.record(Call::DrawElements {
            topology,
            indices: indices.to_vec(),
        });
    }

    fn draw_immediate(&mut self, topology: Topology, vertices: &[TexturedVertex]) {
        self.record(Call::DrawImmediate {
            topology,
            vertices: vertices.to_vec(),
        });
    }

    fn flush(&mut self) {
        self.record(Call::Flush);
    }

    fn present(&mut self) -> BackendResult<()> {
        self.record(Call::Present);
        if self.fail_present {
            return Err(BackendError::SurfaceLost);
        }
        Ok(())
    }

    fn get_error(&mut self) -> ErrorCode {
        self.error.take().unwrap_or(ErrorCode::NoError)
    }
}

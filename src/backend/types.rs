//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::fmt;

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Vertex input slot of a program, as declared by `@location(n)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttribLocation(pub u32);

/// Index of a named uniform inside a program's reflection table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Pipeline capabilities toggled with `enable` / `disable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Texture2d,
    Multisample,
    DepthTest,
    Blend,
}

/// Matrix slot written by `load_matrix`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    ModelView,
    Projection,
}

/// Built-in vertex arrays fed to fixed shader locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientArray {
    Position,
    Normal,
    TexCoord,
}

impl ClientArray {
    pub const ALL: [ClientArray; 3] = [ClientArray::Position, ClientArray::Normal, ClientArray::TexCoord];

    /// Shader location this array is bound to
    pub fn location(&self) -> AttribLocation {
        match self {
            ClientArray::Position => AttribLocation(0),
            ClientArray::Normal => AttribLocation(1),
            ClientArray::TexCoord => AttribLocation(2),
        }
    }

    pub fn from_location(location: AttribLocation) -> Option<Self> {
        Self::ALL.into_iter().find(|array| array.location() == location)
    }
}

/// Primitive topology for draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    /// Four vertices per quad, split into two triangles by the backend
    Quads,
}

impl Topology {
    /// Expand `count` vertices of this topology into a triangle list index sequence
    pub fn triangulate(&self, first: u32, count: u32) -> Vec<u32> {
        match self {
            Topology::Triangles => (first..first + count).collect(),
            Topology::Quads => {
                let mut indices = Vec::with_capacity((count / 4 * 6) as usize);
                for quad in 0..count / 4 {
                    let base = first + quad * 4;
                    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
                }
                indices
            }
        }
    }
}

/// Blend factor for `set_blend_func`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Buffers cleared by `clear`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask(u32);

impl ClearMask {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ClearMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Value uploaded through `set_uniform`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Raw bytes as laid out inside a uniform block
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Int(v) => v.to_ne_bytes().to_vec(),
            UniformValue::Float(v) => v.to_ne_bytes().to_vec(),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v).to_vec(),
        }
    }
}

/// Declared type of a reflected uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Int,
    Float,
    Vec3,
    Vec4,
    Mat4,
    /// A `texture_2d` global; its value is the texture unit it samples from
    Sampler,
}

/// A borrowed float array bound to a vertex slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexData<'a> {
    /// Floats per vertex (1..=4)
    pub components: u32,
    pub values: &'a [f32],
}

impl<'a> VertexData<'a> {
    pub fn vec2(values: &'a [Vec2]) -> Self {
        Self { components: 2, values: bytemuck::cast_slice(values) }
    }

    pub fn vec3(values: &'a [Vec3]) -> Self {
        Self { components: 3, values: bytemuck::cast_slice(values) }
    }

    pub fn vec4(values: &'a [Vec4]) -> Self {
        Self { components: 4, values: bytemuck::cast_slice(values) }
    }

    pub fn vertex_count(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components as usize
        }
    }

    pub fn to_owned(&self) -> OwnedVertexData {
        OwnedVertexData {
            components: self.components,
            values: self.values.to_vec(),
        }
    }
}

/// Copy of a vertex array held by a backend until the next pointer call
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedVertexData {
    pub components: u32,
    pub values: Vec<f32>,
}

impl OwnedVertexData {
    pub fn vertex_count(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components as usize
        }
    }
}

/// Vertex emitted by immediate-mode draws
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

impl TexturedVertex {
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self { position, uv }
    }
}

/// Error flag reported by `get_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    StackOverflow,
    StackUnderflow,
    OutOfMemory,
    Unknown(u32),
}

impl ErrorCode {
    /// Human-readable label, `None` for codes without one
    pub fn label(&self) -> Option<&'static str> {
        match self {
            ErrorCode::NoError => Some("No Error"),
            ErrorCode::InvalidEnum => Some("Invalid Enum"),
            ErrorCode::InvalidValue => Some("Invalid Value"),
            ErrorCode::InvalidOperation => Some("Invalid Operation"),
            ErrorCode::StackOverflow => Some("Stack Overflow"),
            ErrorCode::StackUnderflow => Some("Stack Underflow"),
            ErrorCode::OutOfMemory => Some("Out of Memory"),
            ErrorCode::Unknown(_) => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(label),
            None => match self {
                ErrorCode::Unknown(code) => write!(f, "Unknown error 0x{code:04x}"),
                _ => Ok(()),
            },
        }
    }
}

/// Decoded RGBA8 pixels ready for upload
#[derive(Debug, Clone)]
pub struct ImageData<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quads_triangulate_into_two_triangles_each() {
        assert_eq!(Topology::Quads.triangulate(0, 8), vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert_eq!(Topology::Quads.triangulate(4, 4), vec![4, 5, 6, 4, 6, 7]);
        assert_eq!(Topology::Triangles.triangulate(2, 3), vec![2, 3, 4]);
    }

    #[test]
    fn client_arrays_use_fixed_locations() {
        for array in ClientArray::ALL {
            assert_eq!(ClientArray::from_location(array.location()), Some(array));
        }
        assert_eq!(ClientArray::from_location(AttribLocation(3)), None);
    }

    #[test]
    fn unknown_error_codes_have_no_label() {
        assert_eq!(ErrorCode::InvalidValue.label(), Some("Invalid Value"));
        assert_eq!(ErrorCode::Unknown(0x0506).label(), None);
    }

    #[test]
    fn vertex_data_counts_vertices() {
        let values = [Vec3::ZERO, Vec3::ONE];
        let data = VertexData::vec3(&values);
        assert_eq!(data.vertex_count(), 2);
        assert_eq!(data.values.len(), 6);
    }
}

//! Mesh data structures and generation

use glam::{Vec2, Vec3, Vec4};
use thiserror::Error;

/// Geometry that breaks the mesh invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("`{array}` has {len} elements, expected {expected}")]
    LengthMismatch {
        array: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("index count {0} is not a multiple of 3")]
    NotTriangles(usize),
}

/// A triangle mesh stored as parallel vertex arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub tangents: Vec<Vec3>,
    pub binormals: Vec<Vec3>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
}

impl RenderMesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that every array matches the position count and every index is in range
    pub fn validate(&self) -> Result<(), MeshError> {
        let expected = self.vertex_count();
        let lengths = [
            ("normals", self.normals.len()),
            ("uvs", self.uvs.len()),
            ("tangents", self.tangents.len()),
            ("binormals", self.binormals.len()),
            ("colors", self.colors.len()),
        ];
        for (array, len) in lengths {
            if len != expected {
                return Err(MeshError::LengthMismatch { array, len, expected });
            }
        }

        if self.indices.len() % 3 != 0 {
            return Err(MeshError::NotTriangles(self.indices.len()));
        }

        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, &index)| index as usize >= expected)
        {
            return Err(MeshError::IndexOutOfRange {
                position,
                index,
                vertex_count: expected,
            });
        }

        Ok(())
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2, tangent: Vec3) {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        self.tangents.push(tangent);
        self.binormals.push(normal.cross(tangent));
        self.colors.push(Vec4::ONE);
    }

    /// Fill every vertex colour with `color`
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.colors.iter_mut().for_each(|c| *c = color);
        self
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = RenderMesh::new("cube");

        // (normal, tangent) per face
        let faces = [
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, -Vec3::X),
            (Vec3::X, -Vec3::Z),
            (-Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (-Vec3::Y, Vec3::X),
        ];
        let corners = [
            (Vec2::new(-0.5, -0.5), Vec2::new(0.0, 1.0)),
            (Vec2::new(0.5, -0.5), Vec2::new(1.0, 1.0)),
            (Vec2::new(0.5, 0.5), Vec2::new(1.0, 0.0)),
            (Vec2::new(-0.5, 0.5), Vec2::new(0.0, 0.0)),
        ];

        for (normal, tangent) in faces {
            let bitangent = normal.cross(tangent);
            let base = mesh.vertex_count() as u32;
            for (corner, uv) in corners {
                let position = normal * 0.5 + tangent * corner.x + bitangent * corner.y;
                mesh.push_vertex(position, normal, uv, tangent);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Create a UV sphere of diameter 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = RenderMesh::new("sphere");
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = std::f32::consts::TAU / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let (ring_radius, y) = phi.sin_cos();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let normal = Vec3::new(ring_radius * cos_theta, y, ring_radius * sin_theta);

                mesh.push_vertex(
                    normal * 0.5,
                    normal.normalize_or_zero(),
                    Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32),
                    Vec3::new(-sin_theta, 0.0, cos_theta),
                );
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = RenderMesh::new("plane");
        let subdivisions = subdivisions.max(1);

        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.push_vertex(
                    Vec3::new(-width / 2.0 + x as f32 * step_x, 0.0, -depth / 2.0 + z as f32 * step_z),
                    Vec3::Y,
                    Vec2::new(x as f32 / subdivisions as f32, z as f32 / subdivisions as f32),
                    Vec3::X,
                );
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }
}

/// An ordered list of meshes drawn together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderModel {
    pub meshes: Vec<RenderMesh>,
}

impl RenderModel {
    pub fn new(meshes: Vec<RenderMesh>) -> Self {
        Self { meshes }
    }

    pub fn with_mesh(mut self, mesh: RenderMesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Validate every mesh, reporting the first invalid one
    pub fn validate(&self) -> Result<(), (usize, MeshError)> {
        self.meshes
            .iter()
            .enumerate()
            .try_for_each(|(index, mesh)| mesh.validate().map_err(|e| (index, e)))
    }
}

impl From<RenderMesh> for RenderModel {
    fn from(mesh: RenderMesh) -> Self {
        Self { meshes: vec![mesh] }
    }
}

//! Common fixtures for renderer integration tests.
//!
//! Every test runs against the recording backend, so no GPU is needed.

#![allow(dead_code)]

use forward_renderer::backend::{Call, OwnedVertexData, RecordingBackend, TexturedVertex};
use forward_renderer::{
    Font, Glyph, MaterialAssets, PerspectiveCamera, RenderMesh, RenderModel, Renderer, RendererConfig,
    TextureData, TextureHandle,
};
use glam::{Vec2, Vec3};

pub const VERTEX_SHADER: &str = include_str!("../../Engine/Assets/Shaders/normal_spec.vs.wgsl");
pub const FRAGMENT_SHADER: &str = include_str!("../../Engine/Assets/Shaders/normal_spec.fs.wgsl");

pub type TestRenderer = Renderer<RecordingBackend>;

/// Shader from the asset directory with flat 1x1 textures
pub fn test_assets() -> MaterialAssets {
    MaterialAssets::with_shaders(VERTEX_SHADER, FRAGMENT_SHADER)
}

/// A renderer that has not been set up
pub fn bare_renderer() -> TestRenderer {
    Renderer::new(RecordingBackend::new(), RendererConfig::default())
}

/// A set up renderer with an 800x600 viewport and no recorded calls
pub fn renderer() -> TestRenderer {
    let mut renderer = bare_renderer();
    renderer
        .setup_with_assets(&test_assets())
        .expect("setup with bundled shaders");
    renderer.set_viewport(800, 600);
    renderer.backend_mut().clear_calls();
    renderer
}

pub fn test_camera() -> PerspectiveCamera {
    PerspectiveCamera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO)
}

/// A set up renderer with `test_camera` active
pub fn renderer_with_camera() -> TestRenderer {
    let mut renderer = renderer();
    renderer.set_camera(Some(test_camera()));
    renderer
}

/// Upload a texture for overlay draws
pub fn overlay_texture(renderer: &mut TestRenderer) -> TextureHandle {
    let texture = TextureData::solid_color([255, 0, 0, 255], "overlay")
        .upload(renderer.backend_mut())
        .expect("1x1 texture upload");
    renderer.backend_mut().clear_calls();
    texture
}

/// Font with distinct metrics for 'A' and 'B'
pub fn test_font(texture: TextureHandle) -> Font {
    Font::new(texture)
        .with_glyph(
            'A',
            Glyph::new(Vec2::new(0.0, 0.0), Vec2::new(0.25, 0.5), Vec2::new(0.1, 0.2), Vec2::new(0.01, 0.02)),
        )
        .with_glyph(
            'B',
            Glyph::new(Vec2::new(0.25, 0.0), Vec2::new(0.25, 0.5), Vec2::new(0.05, 0.1), Vec2::new(0.03, 0.04)),
        )
}

/// Model with one triangle mesh per entry, sized by vertex count
pub fn model_with_meshes(vertex_counts: &[usize]) -> RenderModel {
    let meshes = vertex_counts
        .iter()
        .map(|&count| {
            let mut mesh = RenderMesh::plane(1.0, 1.0, 1);
            mesh.positions.resize(count, Vec3::ZERO);
            mesh.normals.resize(count, Vec3::Y);
            mesh.uvs.resize(count, Vec2::ZERO);
            mesh.tangents.resize(count, Vec3::X);
            mesh.binormals.resize(count, Vec3::Z);
            mesh.colors.resize(count, glam::Vec4::ONE);
            mesh.indices = (0..count as u32).rev().take(count - count % 3).collect();
            mesh
        })
        .collect();
    RenderModel::new(meshes)
}

/// Vertices of every immediate-mode draw
pub fn immediate_draws(calls: &[Call]) -> Vec<Vec<TexturedVertex>> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::DrawImmediate { vertices, .. } => Some(vertices.clone()),
            _ => None,
        })
        .collect()
}

/// Data passed to every `client_array_pointer` call for the position array
pub fn position_pointers(calls: &[Call]) -> Vec<OwnedVertexData> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::ClientArrayPointer {
                array: forward_renderer::backend::ClientArray::Position,
                data,
            } => Some(data.clone()),
            _ => None,
        })
        .collect()
}

/// Flatten `Vec3` positions the way a vertex array stores them
pub fn flatten(positions: impl IntoIterator<Item = Vec3>) -> Vec<f32> {
    positions.into_iter().flat_map(|p| p.to_array()).collect()
}

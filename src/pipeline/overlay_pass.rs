//! Screen-space quads and bitmap text
//!
//! Every overlay draw uses the built-in textured pipeline under an identity
//! orthographic projection, then restores the camera matrices.

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::*;
use crate::error::RenderResult;
use crate::renderer::Renderer;
use crate::resources::Font;
use crate::scene::Camera;
use glam::{Mat4, Vec2, Vec3};

impl<B: GraphicsBackend, C: Camera> Renderer<B, C> {
    /// Draw `texture` on the quad spanning `top_left` to `bottom_right` in clip space
    pub fn render_quad(&mut self, texture: TextureHandle, top_left: Vec2, bottom_right: Vec2) -> RenderResult<()> {
        self.begin_overlay();
        self.backend.disable(Capability::DepthTest);
        self.bind_overlay_texture(texture);

        let vertices = [
            TexturedVertex::new(Vec3::new(top_left.x, top_left.y, 0.0), Vec2::new(0.0, 0.0)),
            TexturedVertex::new(Vec3::new(bottom_right.x, top_left.y, 0.0), Vec2::new(1.0, 0.0)),
            TexturedVertex::new(Vec3::new(bottom_right.x, bottom_right.y, 0.0), Vec2::new(1.0, -1.0)),
            TexturedVertex::new(Vec3::new(top_left.x, bottom_right.y, 0.0), Vec2::new(0.0, -1.0)),
        ];
        self.backend.draw_immediate(Topology::Quads, &vertices);

        self.backend.enable(Capability::DepthTest);
        self.setup_camera()
    }

    /// Draw `texture` over the whole viewport
    pub fn render_screen_quad(&mut self, texture: TextureHandle) -> RenderResult<()> {
        self.render_quad(texture, Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0))
    }

    /// Draw one glyph with its top-left corner at `pos`.
    ///
    /// Unlike `render_string`, `pos.y` is used as given and the glyph offset is ignored.
    pub fn render_char(&mut self, c: char, font: &Font, pos: Vec2, size: f32) -> RenderResult<()> {
        let vertices = font.require_glyph(c)?.quad(pos, size);

        self.begin_overlay();
        self.backend.disable(Capability::DepthTest);
        self.enable_alpha_blend();
        self.bind_overlay_texture(font.texture());

        self.backend.draw_immediate(Topology::Quads, &vertices);

        self.backend.enable(Capability::DepthTest);
        self.backend.disable(Capability::Blend);
        self.setup_camera()
    }

    /// Draw `text` on one line in a single draw call.
    ///
    /// The layout starts at `(pos.x, -pos.y)`; see `TextBuffers::layout`.
    pub fn render_string(&mut self, text: &str, font: &Font, pos: Vec2, size: f32) -> RenderResult<()> {
        let vertex_count = self.text.layout(text, font, pos, size)?;
        if vertex_count == 0 {
            return Ok(());
        }

        self.begin_overlay();
        self.bind_overlay_texture(font.texture());
        self.backend.disable(Capability::DepthTest);
        self.enable_alpha_blend();

        self.backend.enable_client_array(ClientArray::Position);
        self.backend.enable_client_array(ClientArray::TexCoord);
        self.backend
            .client_array_pointer(ClientArray::Position, VertexData::vec3(self.text.positions()));
        self.backend
            .client_array_pointer(ClientArray::TexCoord, VertexData::vec2(self.text.uvs()));

        self.backend
            .draw_arrays(Topology::Quads, 0, vertex_count as u32);

        self.backend.disable_client_array(ClientArray::Position);
        self.backend.disable_client_array(ClientArray::TexCoord);

        self.backend.enable(Capability::DepthTest);
        self.backend.disable(Capability::Blend);
        self.setup_camera()
    }

    fn begin_overlay(&mut self) {
        self.backend.use_program(None);
        self.backend.load_matrix(MatrixMode::Projection, overlay_projection());
        self.backend.load_matrix(MatrixMode::ModelView, Mat4::IDENTITY);
    }

    fn bind_overlay_texture(&mut self, texture: TextureHandle) {
        self.backend.enable(Capability::Texture2d);
        self.backend.bind_texture(0, Some(texture));
    }

    fn enable_alpha_blend(&mut self) {
        self.backend.enable(Capability::Blend);
        self.backend
            .set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    }
}

/// Orthographic projection of the [-1, 1] cube
pub fn overlay_projection() -> Mat4 {
    Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_projection_flips_depth_only() {
        let projection = overlay_projection();
        let point = projection.transform_point3(Vec3::new(0.5, -0.25, 0.75));
        assert!(point.abs_diff_eq(Vec3::new(0.5, -0.25, -0.75), 1e-6));
    }
}

//! Lit mesh rendering with the normal/specular program

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::*;
use crate::error::{RenderResult, RendererError};
use crate::renderer::{Renderer, UniformLocations};
use crate::resources::{Material, RenderMesh, RenderModel};
use crate::scene::Camera;

impl<B: GraphicsBackend, C: Camera> Renderer<B, C> {
    /// Draw every mesh of `model` with the default material
    pub fn render_model(&mut self, model: &RenderModel) -> RenderResult<()> {
        let material = self.material().cloned().ok_or(RendererError::NotSetUp)?;
        self.render_model_with(model, &material)
    }

    /// Draw every mesh of `model` with `material`.
    ///
    /// Meshes are validated before anything is drawn. Vertex arrays are
    /// enabled once before the first mesh and disabled once after the last.
    pub fn render_model_with(&mut self, model: &RenderModel, material: &Material) -> RenderResult<()> {
        let program = self
            .assets
            .as_ref()
            .map(|assets| assets.program.clone())
            .ok_or(RendererError::NotSetUp)?;
        model
            .validate()
            .map_err(|(index, source)| RendererError::InvalidMesh { index, source })?;

        if let Some(camera) = &self.camera {
            self.eye_position = camera.position();
        }

        let attributes = program.attributes;
        let custom = [attributes.tangent, attributes.binormal, attributes.color];

        for array in ClientArray::ALL {
            self.backend.enable_client_array(array);
        }
        for location in custom.iter().flatten() {
            self.backend.enable_attrib_array(*location);
        }

        for mesh in &model.meshes {
            self.backend.use_program(Some(program.handle));
            self.upload_material(&program.uniforms, material);
            self.point_arrays(mesh, custom);
            self.backend.draw_elements(Topology::Triangles, &mesh.indices);
            self.backend.use_program(None);
        }

        for array in ClientArray::ALL {
            self.backend.disable_client_array(array);
        }
        for location in custom.iter().flatten() {
            self.backend.disable_attrib_array(*location);
        }

        log::trace!("Rendered model with {} meshes", model.meshes.len());
        Ok(())
    }

    fn upload_material(&mut self, uniforms: &UniformLocations, material: &Material) {
        for (unit, location) in uniforms.samplers().into_iter().enumerate() {
            if let Some(location) = location {
                self.backend.set_uniform(location, UniformValue::Int(unit as i32));
            }
        }
        for (unit, texture) in material.textures().into_iter().enumerate() {
            self.backend.bind_texture(unit as u32, Some(texture));
        }

        let lighting = self.lighting;
        let values = [
            (uniforms.light_position, UniformValue::Vec3(lighting.position)),
            (uniforms.eye_position, UniformValue::Vec3(self.eye_position)),
            (uniforms.diffuse_light, UniformValue::Vec3(lighting.diffuse)),
            (uniforms.specular_light, UniformValue::Vec3(lighting.specular)),
            (uniforms.ambient_light, UniformValue::Vec3(lighting.ambient)),
            (uniforms.glossiness, UniformValue::Float(material.glossiness)),
            (uniforms.bumpiness, UniformValue::Float(material.bumpiness)),
            (uniforms.specular_level, UniformValue::Float(material.specular_level)),
        ];
        for (location, value) in values {
            if let Some(location) = location {
                self.backend.set_uniform(location, value);
            }
        }
    }

    fn point_arrays(&mut self, mesh: &RenderMesh, [tangent, binormal, color]: [Option<AttribLocation>; 3]) {
        self.backend
            .client_array_pointer(ClientArray::Position, VertexData::vec3(&mesh.positions));
        self.backend
            .client_array_pointer(ClientArray::Normal, VertexData::vec3(&mesh.normals));
        self.backend
            .client_array_pointer(ClientArray::TexCoord, VertexData::vec2(&mesh.uvs));

        if let Some(location) = tangent {
            self.backend.attrib_pointer(location, VertexData::vec3(&mesh.tangents));
        }
        if let Some(location) = binormal {
            self.backend.attrib_pointer(location, VertexData::vec3(&mesh.binormals));
        }
        if let Some(location) = color {
            self.backend.attrib_pointer(location, VertexData::vec4(&mesh.colors));
        }
    }
}

//! Normal/specular shader program with locations resolved at load time

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::{AttribLocation, ProgramHandle, UniformLocation};

/// Per-vertex attributes fed through generic attribute arrays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomAttributes {
    pub tangent: Option<AttribLocation>,
    pub binormal: Option<AttribLocation>,
    pub color: Option<AttribLocation>,
}

/// Uniform locations used by `render_model`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformLocations {
    pub diffuse_map: Option<UniformLocation>,
    pub bump_map: Option<UniformLocation>,
    pub spec_map: Option<UniformLocation>,
    pub light_position: Option<UniformLocation>,
    pub eye_position: Option<UniformLocation>,
    pub diffuse_light: Option<UniformLocation>,
    pub ambient_light: Option<UniformLocation>,
    pub specular_light: Option<UniformLocation>,
    pub glossiness: Option<UniformLocation>,
    pub bumpiness: Option<UniformLocation>,
    pub specular_level: Option<UniformLocation>,
}

impl UniformLocations {
    /// Sampler uniforms in texture unit order
    pub fn samplers(&self) -> [Option<UniformLocation>; 3] {
        [self.diffuse_map, self.bump_map, self.spec_map]
    }
}

/// A linked program and every location the renderer uploads through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pub handle: ProgramHandle,
    pub attributes: CustomAttributes,
    pub uniforms: UniformLocations,
}

impl ShaderProgram {
    /// Look up every attribute and uniform once
    pub fn resolve<B: GraphicsBackend>(backend: &B, handle: ProgramHandle) -> Self {
        let attrib = |name: &str| {
            let location = backend.attrib_location(handle, name);
            if location.is_none() {
                log::warn!("Shader has no vertex input `{name}`");
            }
            location
        };
        let attributes = CustomAttributes {
            tangent: attrib("tangent"),
            binormal: attrib("binormal"),
            color: attrib("color"),
        };

        let uniform = |name: &str| {
            let location = backend.uniform_location(handle, name);
            if location.is_none() {
                log::warn!("Shader has no uniform `{name}`");
            }
            location
        };
        let uniforms = UniformLocations {
            diffuse_map: uniform("diffuse_map"),
            bump_map: uniform("bump_map"),
            spec_map: uniform("spec_map"),
            light_position: uniform("light_position"),
            eye_position: uniform("eye_position"),
            diffuse_light: uniform("diffuse_light"),
            ambient_light: uniform("ambient_light"),
            specular_light: uniform("specular_light"),
            glossiness: uniform("glossiness"),
            bumpiness: uniform("bumpiness"),
            specular_level: uniform("specular_level"),
        };

        Self {
            handle,
            attributes,
            uniforms,
        }
    }
}

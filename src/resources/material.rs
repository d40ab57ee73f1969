//! Normal + specular material

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::TextureHandle;
use crate::config::RendererConfig;
use crate::error::{RenderResult, RendererError};
use crate::resources::TextureData;
use std::path::Path;

pub const DEFAULT_GLOSSINESS: f32 = 7.0;
pub const DEFAULT_BUMPINESS: f32 = 1.0;
pub const DEFAULT_SPECULAR_LEVEL: f32 = 2.0;

/// Textures and shading scalars for the normal/specular shader
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub diffuse_map: TextureHandle,
    pub bump_map: TextureHandle,
    pub spec_map: TextureHandle,
    pub glossiness: f32,
    pub bumpiness: f32,
    pub specular_level: f32,
}

impl Material {
    pub fn new(diffuse_map: TextureHandle, bump_map: TextureHandle, spec_map: TextureHandle) -> Self {
        Self {
            diffuse_map,
            bump_map,
            spec_map,
            glossiness: DEFAULT_GLOSSINESS,
            bumpiness: DEFAULT_BUMPINESS,
            specular_level: DEFAULT_SPECULAR_LEVEL,
        }
    }

    pub fn with_glossiness(mut self, glossiness: f32) -> Self {
        self.glossiness = glossiness;
        self
    }

    pub fn with_bumpiness(mut self, bumpiness: f32) -> Self {
        self.bumpiness = bumpiness;
        self
    }

    pub fn with_specular_level(mut self, specular_level: f32) -> Self {
        self.specular_level = specular_level;
        self
    }

    /// Texture bound to each unit, in unit order
    pub fn textures(&self) -> [TextureHandle; 3] {
        [self.diffuse_map, self.bump_map, self.spec_map]
    }
}

/// Shader sources and decoded textures needed to set up the renderer
#[derive(Debug, Clone)]
pub struct MaterialAssets {
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub diffuse: TextureData,
    pub normal: TextureData,
    pub specular: TextureData,
}

impl MaterialAssets {
    /// Read every asset named by the config
    pub fn load(config: &RendererConfig) -> RenderResult<Self> {
        Ok(Self {
            vertex_shader: read_source(&config.vertex_shader_path())?,
            fragment_shader: read_source(&config.fragment_shader_path())?,
            diffuse: TextureData::from_file(config.diffuse_texture_path())?,
            normal: TextureData::from_file(config.normal_texture_path())?,
            specular: TextureData::from_file(config.specular_texture_path())?,
        })
    }

    /// Assets with flat placeholder textures
    pub fn with_shaders(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            diffuse: TextureData::white(),
            normal: TextureData::default_normal(),
            specular: TextureData::white(),
        }
    }

    /// Upload the three textures, deleting any already created if one fails
    pub(crate) fn upload_textures<B: GraphicsBackend>(
        &self,
        backend: &mut B,
    ) -> RenderResult<[TextureHandle; 3]> {
        let mut handles = Vec::with_capacity(3);
        for texture in [&self.diffuse, &self.normal, &self.specular] {
            match texture.upload(backend) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    handles.into_iter().for_each(|h| backend.delete_texture(h));
                    return Err(e.into());
                }
            }
        }
        Ok([handles[0], handles[1], handles[2]])
    }
}

fn read_source(path: &Path) -> RenderResult<String> {
    std::fs::read_to_string(path).map_err(|source| RendererError::Io {
        path: path.to_path_buf(),
        source,
    })
}

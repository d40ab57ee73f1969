//! Renderer configuration

use crate::resources::{DEFAULT_BUMPINESS, DEFAULT_GLOSSINESS, DEFAULT_SPECULAR_LEVEL};
use crate::scene::Lighting;
use std::path::{Path, PathBuf};

/// Default limit on characters per `render_string` call
pub const DEFAULT_MAX_TEXT_CHARS: usize = 2048;

/// Configuration for setting up the renderer
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Directory the asset paths below are relative to
    pub asset_root: PathBuf,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub diffuse_texture: PathBuf,
    pub normal_texture: PathBuf,
    pub specular_texture: PathBuf,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub lighting: Lighting,
    pub glossiness: f32,
    pub bumpiness: f32,
    pub specular_level: f32,
    pub max_text_chars: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("Engine/Assets"),
            vertex_shader: PathBuf::from("Shaders/normal_spec.vs.wgsl"),
            fragment_shader: PathBuf::from("Shaders/normal_spec.fs.wgsl"),
            diffuse_texture: PathBuf::from("Textures/piano.dds"),
            normal_texture: PathBuf::from("Textures/piano_nm.dds"),
            specular_texture: PathBuf::from("Textures/piano_s.dds"),
            clear_color: [1.0, 0.769, 0.0, 0.0],
            clear_depth: 1.0,
            lighting: Lighting::default(),
            glossiness: DEFAULT_GLOSSINESS,
            bumpiness: DEFAULT_BUMPINESS,
            specular_level: DEFAULT_SPECULAR_LEVEL,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
        }
    }
}

impl RendererConfig {
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_shaders(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    pub fn with_textures(
        mut self,
        diffuse: impl Into<PathBuf>,
        normal: impl Into<PathBuf>,
        specular: impl Into<PathBuf>,
    ) -> Self {
        self.diffuse_texture = diffuse.into();
        self.normal_texture = normal.into();
        self.specular_texture = specular.into();
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_lighting(mut self, lighting: Lighting) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn with_max_text_chars(mut self, max: usize) -> Self {
        self.max_text_chars = max;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.asset_root.join(path)
    }

    pub fn vertex_shader_path(&self) -> PathBuf {
        self.resolve(&self.vertex_shader)
    }

    pub fn fragment_shader_path(&self) -> PathBuf {
        self.resolve(&self.fragment_shader)
    }

    pub fn diffuse_texture_path(&self) -> PathBuf {
        self.resolve(&self.diffuse_texture)
    }

    pub fn normal_texture_path(&self) -> PathBuf {
        self.resolve(&self.normal_texture)
    }

    pub fn specular_texture_path(&self) -> PathBuf {
        self.resolve(&self.specular_texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_under_asset_root() {
        let config = RendererConfig::default().with_asset_root("/data");
        assert_eq!(
            config.vertex_shader_path(),
            PathBuf::from("/data/Shaders/normal_spec.vs.wgsl")
        );
        assert_eq!(config.normal_texture_path(), PathBuf::from("/data/Textures/piano_nm.dds"));
    }

    #[test]
    fn defaults_match_piano_scene() {
        let config = RendererConfig::default();
        assert_eq!(config.clear_color, [1.0, 0.769, 0.0, 0.0]);
        assert_eq!(config.glossiness, 7.0);
        assert_eq!(config.max_text_chars, 2048);
    }
}

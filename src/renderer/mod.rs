//! Renderer lifecycle and frame sequencing
//!
//! Drawing recipes live in `crate::pipeline`.

mod program;

pub use program::*;

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::*;
use crate::config::RendererConfig;
use crate::error::{RenderResult, RendererError};
use crate::resources::{Material, MaterialAssets, TextBuffers};
use crate::scene::{Camera, Lighting, PerspectiveCamera};
use glam::Vec3;

/// Everything created by `setup` and released by `finish`
#[derive(Debug, Clone)]
pub(crate) struct LoadedAssets {
    pub program: ShaderProgram,
    pub material: Material,
}

/// Forward renderer driving a graphics backend
pub struct Renderer<B: GraphicsBackend, C: Camera = PerspectiveCamera> {
    pub(crate) backend: B,
    pub(crate) config: RendererConfig,
    pub(crate) camera: Option<C>,
    pub(crate) viewport: (u32, u32),
    pub(crate) assets: Option<LoadedAssets>,
    pub(crate) lighting: Lighting,
    /// Last eye position uploaded to the shader
    pub(crate) eye_position: Vec3,
    pub(crate) text: TextBuffers,
}

impl<B: GraphicsBackend, C: Camera> Renderer<B, C> {
    pub fn new(backend: B, config: RendererConfig) -> Self {
        Self {
            backend,
            lighting: config.lighting,
            text: TextBuffers::new(config.max_text_chars),
            config,
            camera: None,
            viewport: (0, 0),
            assets: None,
            eye_position: Vec3::ZERO,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn is_set_up(&self) -> bool {
        self.assets.is_some()
    }

    /// Default material loaded by `setup`
    pub fn material(&self) -> Option<&Material> {
        self.assets.as_ref().map(|assets| &assets.material)
    }

    pub fn material_mut(&mut self) -> Option<&mut Material> {
        self.assets.as_mut().map(|assets| &mut assets.material)
    }

    pub fn program(&self) -> Option<&ShaderProgram> {
        self.assets.as_ref().map(|assets| &assets.program)
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub fn set_lighting(&mut self, lighting: Lighting) {
        self.lighting = lighting;
    }

    /// Configure the context and load the shader and material from the configured paths
    pub fn setup(&mut self) -> RenderResult<()> {
        let assets = MaterialAssets::load(&self.config)?;
        self.setup_with_assets(&assets)
    }

    /// Configure the context and create the shader and material from in-memory assets
    pub fn setup_with_assets(&mut self, assets: &MaterialAssets) -> RenderResult<()> {
        if self.assets.is_some() {
            log::warn!("Renderer set up twice; releasing previous resources");
            self.finish()?;
        }

        self.backend.set_clear_color(self.config.clear_color);
        self.backend.set_clear_depth(self.config.clear_depth);
        self.backend.enable(Capability::Texture2d);
        self.backend.enable(Capability::Multisample);
        self.backend.enable(Capability::DepthTest);

        let handle = self.backend.create_program(
            Some("normal_spec"),
            &assets.vertex_shader,
            &assets.fragment_shader,
        )?;

        let [diffuse, bump, spec] = match assets.upload_textures(&mut self.backend) {
            Ok(textures) => textures,
            Err(e) => {
                self.backend.delete_program(handle);
                return Err(e);
            }
        };

        let program = ShaderProgram::resolve(&self.backend, handle);
        let material = Material::new(diffuse, bump, spec)
            .with_glossiness(self.config.glossiness)
            .with_bumpiness(self.config.bumpiness)
            .with_specular_level(self.config.specular_level);

        self.lighting = self.config.lighting;
        self.assets = Some(LoadedAssets { program, material });

        log::info!("Renderer set up");
        Ok(())
    }

    /// Release the material textures and the shader program
    pub fn finish(&mut self) -> RenderResult<()> {
        let assets = self.assets.take().ok_or(RendererError::NotSetUp)?;

        for texture in assets.material.textures() {
            self.backend.delete_texture(texture);
        }
        self.backend.delete_program(assets.program.handle);

        log::info!("Renderer finished");
        Ok(())
    }

    /// Set the active camera; `None` turns camera matrix setup into a no-op
    pub fn set_camera(&mut self, camera: Option<C>) {
        self.camera = camera;
    }

    pub fn camera(&self) -> Option<&C> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut C> {
        self.camera.as_mut()
    }

    /// Store the viewport size and apply it to the backend
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.backend.set_viewport(0, 0, width, height);
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Viewport height divided by width
    pub fn aspect_ratio(&self) -> RenderResult<f32> {
        let (width, height) = self.viewport;
        if width == 0 {
            return Err(RendererError::DegenerateViewport);
        }
        Ok(height as f32 / width as f32)
    }

    /// Load the camera matrices, if a camera is set
    pub fn setup_camera(&mut self) -> RenderResult<()> {
        let Some(camera) = &self.camera else {
            return Ok(());
        };
        let aspect = self.aspect_ratio()?;

        self.backend
            .load_matrix(MatrixMode::ModelView, camera.view_matrix());
        self.backend
            .load_matrix(MatrixMode::Projection, camera.projection_matrix(aspect));
        Ok(())
    }

    /// Load the camera matrices and clear colour and depth
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        self.setup_camera()?;
        self.backend.clear(ClearMask::COLOR | ClearMask::DEPTH);
        Ok(())
    }

    /// Submit the frame and present it
    pub fn end_frame(&mut self) -> RenderResult<()> {
        self.backend.flush();
        self.backend.present()?;
        Ok(())
    }

    /// Print a label for the backend's pending error flag and return it
    #[doc(alias = "print_last_gl_error")]
    pub fn print_last_error(&mut self) -> ErrorCode {
        let code = self.backend.get_error();
        if let Some(label) = code.label() {
            println!("Graphics Error: {label}");
        }
        code
    }
}

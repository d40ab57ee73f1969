//! # Piano Demo
//!
//! Opens a window and draws a lit cube and sphere with the normal/specular
//! material, a textured corner quad and a line of text.
//!
//! ```bash
//! # Use the textures under Engine/Assets
//! cargo run --example piano
//!
//! # Flat placeholder textures, no vsync, stop after 300 frames
//! cargo run --example piano -- --placeholder-textures --no-vsync --max-frames 300
//! ```

use clap::Parser;
use forward_renderer::resources::TextureData;
use forward_renderer::{
    Font, MaterialAssets, PerspectiveCamera, RenderMesh, RenderModel, Renderer, RendererConfig, TextureHandle,
    WgpuBackend, WgpuBackendConfig,
};
use glam::{Vec2, Vec3, Vec4};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "piano", about = "Forward renderer demo")]
struct Args {
    /// Directory holding Shaders/ and Textures/
    #[arg(long, default_value = "Engine/Assets")]
    asset_root: PathBuf,

    /// Use flat textures instead of loading the DDS files
    #[arg(long)]
    placeholder_textures: bool,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    #[arg(long)]
    no_vsync: bool,

    /// MSAA sample count
    #[arg(long, default_value_t = 4)]
    samples: u32,

    /// Exit after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

struct Demo {
    renderer: Renderer<WgpuBackend>,
    model: RenderModel,
    font: Font,
    overlay: TextureHandle,
    frame: u64,
}

impl Demo {
    fn new(args: &Args, window: &forward_renderer::Window) -> Result<Self, Box<dyn std::error::Error>> {
        let backend = WgpuBackend::new(
            window.window_arc(),
            WgpuBackendConfig {
                vsync: !args.no_vsync,
                sample_count: args.samples,
            },
        )?;

        let config = RendererConfig::default().with_asset_root(&args.asset_root);
        let mut renderer = Renderer::new(backend, config);

        if args.placeholder_textures {
            let config = renderer.config();
            let assets = MaterialAssets::with_shaders(
                std::fs::read_to_string(config.vertex_shader_path())?,
                std::fs::read_to_string(config.fragment_shader_path())?,
            );
            renderer.setup_with_assets(&assets)?;
        } else {
            renderer.setup()?;
        }

        let (width, height) = window.dimensions();
        renderer.set_viewport(width, height);
        renderer.set_camera(Some(PerspectiveCamera::new(Vec3::new(0.0, 1.5, 4.0), Vec3::ZERO)));

        let overlay = TextureData::checkerboard(64, [255, 255, 255, 255], [40, 40, 40, 255])
            .upload(renderer.backend_mut())?;
        let atlas = TextureData::solid_color([255, 255, 255, 255], "font_atlas").upload(renderer.backend_mut())?;
        let font = Font::monospace_grid(atlas, 16, 6, b' ', Vec2::new(0.02, 0.04));

        let mut sphere = RenderMesh::sphere(32, 16).with_color(Vec4::new(0.8, 0.9, 1.0, 1.0));
        sphere.positions.iter_mut().for_each(|p| *p += Vec3::new(1.2, 0.0, 0.0));
        let model = RenderModel::from(RenderMesh::cube()).with_mesh(sphere);

        Ok(Self {
            renderer,
            model,
            font,
            overlay,
            frame: 0,
        })
    }

    fn frame(&mut self, window: &mut forward_renderer::Window) -> forward_renderer::RenderResult<()> {
        let (width, height) = window.dimensions();
        if !is_drawable(width, height) {
            // minimized; keep the last viewport until the window is restored
            return Ok(());
        }
        if window.take_resized() {
            self.renderer.backend_mut().resize(width, height);
            self.renderer.set_viewport(width, height);
        }

        if let Some(camera) = self.renderer.camera_mut() {
            camera.orbit(0.01);
        }

        self.renderer.begin_frame()?;
        self.renderer.render_model(&self.model)?;
        self.renderer
            .render_quad(self.overlay, Vec2::new(0.6, 0.9), Vec2::new(0.9, 0.6))?;
        self.renderer
            .render_string(&format!("FRAME {}", self.frame), &self.font, Vec2::new(-0.95, -0.9), 1.0)?;
        self.renderer.end_frame()?;

        self.renderer.print_last_error();
        self.frame += 1;
        Ok(())
    }
}

/// A minimized window reports a zero-sized surface
fn is_drawable(width: u32, height: u32) -> bool {
    width > 0 && height > 0
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    log::info!("Starting piano demo");

    let mut demo: Option<Demo> = None;
    let result = forward_renderer::window::run("Piano", args.width, args.height, move |window| {
        if demo.is_none() {
            match Demo::new(&args, window) {
                Ok(created) => demo = Some(created),
                Err(e) => {
                    log::error!("Failed to start demo: {e}");
                    window.close();
                    return;
                }
            }
        }
        let Some(state) = demo.as_mut() else {
            return;
        };

        if let Err(e) = state.frame(window) {
            log::error!("Frame failed: {e}");
            window.close();
        }
        if args.max_frames.is_some_and(|max| state.frame >= max) {
            if let Err(e) = state.renderer.finish() {
                log::error!("Failed to release renderer resources: {e}");
            }
            window.close();
        }
    });

    if let Err(e) = result {
        log::error!("Event loop error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_window_is_not_drawn() {
        assert!(!is_drawable(0, 0));
        assert!(!is_drawable(1280, 0));
        assert!(!is_drawable(0, 720));
        assert!(is_drawable(1, 1));
    }
}

//! Forward rendering pipeline
//!
//! 1. Forward pass - lit meshes drawn with the normal/specular program
//! 2. Overlay pass - textured screen quads, glyphs and strings on top

mod forward_pass;
mod overlay_pass;

pub use overlay_pass::overlay_projection;

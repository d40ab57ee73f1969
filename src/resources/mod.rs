//! Resource management
//!
//! Meshes, textures, materials and fonts consumed by the renderer.

mod font;
mod material;
mod mesh;
mod texture;

pub use font::*;
pub use material::*;
pub use mesh::*;
pub use texture::*;

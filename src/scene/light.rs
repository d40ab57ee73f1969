//! Scene lighting

use glam::Vec3;

/// A single point light with ambient fill
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub position: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub ambient: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            position: Vec3::splat(100.0),
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            ambient: Vec3::splat(0.25),
        }
    }
}

impl Lighting {
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_diffuse(mut self, color: Vec3) -> Self {
        self.diffuse = color;
        self
    }

    pub fn with_specular(mut self, color: Vec3) -> Self {
        self.specular = color;
        self
    }

    pub fn with_ambient(mut self, color: Vec3) -> Self {
        self.ambient = color;
        self
    }
}

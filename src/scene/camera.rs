//! Camera system

use glam::{Mat4, Vec3};

/// What the renderer needs from a camera
pub trait Camera {
    /// World-space eye position
    fn position(&self) -> Vec3;

    fn view_matrix(&self) -> Mat4;

    /// Projection for a viewport whose aspect ratio is `height / width`
    fn projection_matrix(&self, aspect: f32) -> Mat4;
}

/// Look-at camera with a right-handed perspective projection
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn with_fov_degrees(mut self, fov_y_degrees: f32) -> Self {
        self.fov_y = fov_y_degrees.to_radians();
        self
    }

    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Rotate the eye around the target about the up axis
    pub fn orbit(&mut self, angle: f32) {
        let offset = self.position - self.target;
        self.position = self.target + glam::Quat::from_axis_angle(self.up.normalize_or_zero(), angle) * offset;
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

impl Camera for PerspectiveCamera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    fn projection_matrix(&self, aspect: f32) -> Mat4 {
        // glam wants width / height
        Mat4::perspective_rh(self.fov_y, aspect.recip(), self.near, self.far)
    }
}

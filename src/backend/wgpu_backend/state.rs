//! CPU-side copy of the immediate-mode state

use crate::backend::types::*;
use glam::Mat4;
use std::collections::{HashMap, HashSet};

/// Pipeline variant selected by the state at draw time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: u64,
    pub depth_test: bool,
    pub blend: Option<(BlendFactor, BlendFactor)>,
    /// (shader location, components) per vertex buffer slot
    pub inputs: Vec<(u32, u32)>,
}

#[derive(Debug, Default)]
pub(super) struct ArrayState {
    pub enabled: bool,
    pub data: Option<OwnedVertexData>,
}

impl ArrayState {
    pub fn enabled_data(&self) -> Option<&OwnedVertexData> {
        if self.enabled {
            self.data.as_ref()
        } else {
            None
        }
    }
}

pub(super) struct StateMachine {
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub capabilities: HashSet<Capability>,
    pub viewport: (i32, i32, u32, u32),
    pub blend_func: (BlendFactor, BlendFactor),
    pub model_view: Mat4,
    pub projection: Mat4,
    pub current_program: Option<u64>,
    /// Texture unit to texture id
    pub texture_units: HashMap<u32, u64>,
    pub client_arrays: HashMap<ClientArray, ArrayState>,
    pub attrib_arrays: HashMap<AttribLocation, ArrayState>,
}

impl StateMachine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            capabilities: HashSet::new(),
            viewport: (0, 0, width, height),
            blend_func: (BlendFactor::One, BlendFactor::Zero),
            model_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            current_program: None,
            texture_units: HashMap::new(),
            client_arrays: HashMap::new(),
            attrib_arrays: HashMap::new(),
        }
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Viewport intersected with the surface, `None` when nothing is visible.
    /// The origin is bottom-left as in the state machine; wgpu counts from the top.
    pub fn clamped_viewport(&self, (surface_width, surface_height): (u32, u32)) -> Option<[f32; 4]> {
        let (x, y, width, height) = self.viewport;
        let (surface_width, surface_height) = (surface_width as i64, surface_height as i64);

        let left = (x as i64).clamp(0, surface_width);
        let right = (x as i64 + width as i64).clamp(0, surface_width);
        let bottom = (y as i64).clamp(0, surface_height);
        let top = (y as i64 + height as i64).clamp(0, surface_height);
        if right <= left || top <= bottom {
            return None;
        }

        Some([
            left as f32,
            (surface_height - top) as f32,
            (right - left) as f32,
            (top - bottom) as f32,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_flipped_and_clamped() {
        let mut state = StateMachine::new(800, 600);
        assert_eq!(state.clamped_viewport((800, 600)), Some([0.0, 0.0, 800.0, 600.0]));

        state.viewport = (100, 50, 1000, 100);
        assert_eq!(state.clamped_viewport((800, 600)), Some([100.0, 450.0, 700.0, 100.0]));

        state.viewport = (900, 0, 10, 10);
        assert_eq!(state.clamped_viewport((800, 600)), None);
    }
}

//! WGSL program reflection
//!
//! Both stages of a program are parsed and validated with naga, and the
//! interface the renderer talks to is extracted once: vertex inputs by name,
//! uniform struct members with their byte offsets, and texture/sampler slots.
//! Backends answer `attrib_location` / `uniform_location` from this table, so
//! no name lookup ever reaches the GPU.

use crate::backend::traits::{BackendError, BackendResult};
use crate::backend::types::{AttribLocation, UniformLocation, UniformType};

/// Entry point name of the vertex stage
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point name of the fragment stage
pub const FRAGMENT_ENTRY: &str = "fs_main";
/// Name of the uniform struct that receives the fixed-function matrices
pub const TRANSFORMS_NAME: &str = "transforms";

/// A `@group(g) @binding(b)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingSlot {
    pub group: u32,
    pub binding: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub name: String,
    pub location: AttribLocation,
    pub components: u32,
}

/// A `var<uniform>` struct whose members are exposed as named uniforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub slot: BindingSlot,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub ty: UniformType,
    /// Index into `ShaderReflection::blocks`, `None` for sampler uniforms
    pub block: Option<usize>,
    pub offset: u32,
    /// Binding of the texture global for sampler uniforms
    pub slot: Option<BindingSlot>,
}

/// The `transforms` block fed from the model-view and projection matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformsBinding {
    pub slot: BindingSlot,
    pub model_view_offset: u32,
    pub projection_offset: u32,
    pub size: u32,
}

/// Interface of a linked program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub inputs: Vec<VertexInput>,
    pub uniforms: Vec<UniformInfo>,
    pub blocks: Vec<UniformBlock>,
    pub transforms: Option<TransformsBinding>,
    pub samplers: Vec<BindingSlot>,
}

impl ShaderReflection {
    /// Parse, validate and reflect a vertex/fragment pair
    pub fn from_wgsl(vertex_source: &str, fragment_source: &str) -> BackendResult<Self> {
        let vertex = parse_module(vertex_source)?;
        let fragment = parse_module(fragment_source)?;

        find_entry_point(&vertex, naga::ShaderStage::Vertex, VERTEX_ENTRY)?;
        find_entry_point(&fragment, naga::ShaderStage::Fragment, FRAGMENT_ENTRY)?;

        let mut reflection = Self {
            inputs: reflect_vertex_inputs(&vertex)?,
            ..Default::default()
        };
        reflection.reflect_globals(&vertex)?;
        reflection.reflect_globals(&fragment)?;

        Ok(reflection)
    }

    pub fn attrib_location(&self, name: &str) -> Option<AttribLocation> {
        self.inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| input.location)
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|uniform| uniform.name == name)
            .map(|index| UniformLocation(index as u32))
    }

    pub fn uniform(&self, location: UniformLocation) -> Option<&UniformInfo> {
        self.uniforms.get(location.index())
    }

    pub fn input(&self, location: AttribLocation) -> Option<&VertexInput> {
        self.inputs.iter().find(|input| input.location == location)
    }

    /// Texture slots paired with the uniform index that selects their unit
    pub fn textures(&self) -> impl Iterator<Item = (usize, BindingSlot)> + '_ {
        self.uniforms
            .iter()
            .enumerate()
            .filter_map(|(index, uniform)| uniform.slot.map(|slot| (index, slot)))
    }

    /// Highest bind group index used, plus one
    pub fn group_count(&self) -> u32 {
        let blocks = self.blocks.iter().map(|b| b.slot.group);
        let transforms = self.transforms.iter().map(|t| t.slot.group);
        let textures = self.textures().map(|(_, slot)| slot.group);
        let samplers = self.samplers.iter().map(|s| s.group);
        blocks
            .chain(transforms)
            .chain(textures)
            .chain(samplers)
            .max()
            .map_or(0, |group| group + 1)
    }

    fn has_slot(&self, slot: BindingSlot) -> bool {
        self.blocks.iter().any(|b| b.slot == slot)
            || self.transforms.is_some_and(|t| t.slot == slot)
            || self.samplers.contains(&slot)
            || self.textures().any(|(_, s)| s == slot)
    }

    fn reflect_globals(&mut self, module: &naga::Module) -> BackendResult<()> {
        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let slot = BindingSlot {
                group: binding.group,
                binding: binding.binding,
            };
            // Both stages may declare the same resource.
            if self.has_slot(slot) {
                continue;
            }
            let name = global.name.clone().unwrap_or_default();

            match (&global.space, &module.types[global.ty].inner) {
                (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                    if name == TRANSFORMS_NAME {
                        self.transforms = Some(reflect_transforms(module, members, *span, slot)?);
                        continue;
                    }
                    let block = self.blocks.len();
                    self.blocks.push(UniformBlock {
                        name,
                        slot,
                        size: *span,
                    });
                    for member in members {
                        let member_name = member.name.clone().unwrap_or_default();
                        let ty = uniform_type(module, member.ty).ok_or_else(|| {
                            BackendError::ShaderCreationFailed(format!(
                                "uniform `{member_name}` has an unsupported type"
                            ))
                        })?;
                        self.uniforms.push(UniformInfo {
                            name: member_name,
                            ty,
                            block: Some(block),
                            offset: member.offset,
                            slot: None,
                        });
                    }
                }
                (naga::AddressSpace::Uniform, _) => {
                    return Err(BackendError::ShaderCreationFailed(format!(
                        "uniform `{name}` must be declared inside a struct"
                    )));
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => {
                    self.uniforms.push(UniformInfo {
                        name,
                        ty: UniformType::Sampler,
                        block: None,
                        offset: 0,
                        slot: Some(slot),
                    });
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => {
                    self.samplers.push(slot);
                }
                _ => {
                    return Err(BackendError::ShaderCreationFailed(format!(
                        "resource `{name}` has an unsupported binding type"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_module(source: &str) -> BackendResult<naga::Module> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| BackendError::ShaderCreationFailed(e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| BackendError::ShaderCreationFailed(e.emit_to_string(source)))?;

    Ok(module)
}

fn find_entry_point<'m>(
    module: &'m naga::Module,
    stage: naga::ShaderStage,
    name: &str,
) -> BackendResult<&'m naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
        .ok_or_else(|| {
            BackendError::ShaderCreationFailed(format!("missing {stage:?} entry point `{name}`"))
        })
}

fn reflect_vertex_inputs(module: &naga::Module) -> BackendResult<Vec<VertexInput>> {
    let entry = find_entry_point(module, naga::ShaderStage::Vertex, VERTEX_ENTRY)?;
    let mut inputs = Vec::new();

    for argument in &entry.function.arguments {
        match &module.types[argument.ty].inner {
            naga::TypeInner::Struct { members, .. } => {
                for member in members {
                    push_input(module, &mut inputs, member.name.as_deref(), member.ty, member.binding.as_ref())?;
                }
            }
            _ => push_input(module, &mut inputs, argument.name.as_deref(), argument.ty, argument.binding.as_ref())?,
        }
    }

    inputs.sort_by_key(|input| input.location);
    Ok(inputs)
}

fn push_input(
    module: &naga::Module,
    inputs: &mut Vec<VertexInput>,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
) -> BackendResult<()> {
    let Some(naga::Binding::Location { location, .. }) = binding else {
        return Ok(());
    };
    let name = name.unwrap_or_default().to_string();
    let components = match &module.types[ty].inner {
        naga::TypeInner::Scalar(scalar) if scalar.kind == naga::ScalarKind::Float => 1,
        naga::TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
            *size as u32
        }
        _ => {
            return Err(BackendError::ShaderCreationFailed(format!(
                "vertex input `{name}` must be a float scalar or vector"
            )))
        }
    };
    inputs.push(VertexInput {
        name,
        location: AttribLocation(*location),
        components,
    });
    Ok(())
}

fn reflect_transforms(
    module: &naga::Module,
    members: &[naga::StructMember],
    span: u32,
    slot: BindingSlot,
) -> BackendResult<TransformsBinding> {
    let offset_of = |name: &str| {
        members
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
            .filter(|m| uniform_type(module, m.ty) == Some(UniformType::Mat4))
            .map(|m| m.offset)
            .ok_or_else(|| {
                BackendError::ShaderCreationFailed(format!(
                    "`{TRANSFORMS_NAME}` needs a mat4x4<f32> member `{name}`"
                ))
            })
    };

    Ok(TransformsBinding {
        slot,
        model_view_offset: offset_of("model_view")?,
        projection_offset: offset_of("projection")?,
        size: span,
    })
}

fn uniform_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Option<UniformType> {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match &module.types[ty].inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(UniformType::Float),
            ScalarKind::Sint => Some(UniformType::Int),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Tri => Some(UniformType::Vec3),
            VectorSize::Quad => Some(UniformType::Vec4),
            VectorSize::Bi => None,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformType::Mat4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = include_str!("../../Engine/Assets/Shaders/normal_spec.vs.wgsl");
    const FRAGMENT: &str = include_str!("../../Engine/Assets/Shaders/normal_spec.fs.wgsl");

    #[test]
    fn reflects_custom_attributes_by_name() {
        let reflection = ShaderReflection::from_wgsl(VERTEX, FRAGMENT).unwrap();

        assert_eq!(reflection.attrib_location("position"), Some(AttribLocation(0)));
        assert_eq!(reflection.attrib_location("tangent"), Some(AttribLocation(3)));
        assert_eq!(reflection.attrib_location("binormal"), Some(AttribLocation(4)));
        assert_eq!(reflection.attrib_location("color"), Some(AttribLocation(5)));
        assert_eq!(reflection.attrib_location("missing"), None);
        assert_eq!(reflection.input(AttribLocation(5)).unwrap().components, 4);
    }

    #[test]
    fn reflects_material_block_layout() {
        let reflection = ShaderReflection::from_wgsl(VERTEX, FRAGMENT).unwrap();

        assert_eq!(reflection.blocks.len(), 1);
        assert_eq!(reflection.blocks[0].size, 80);

        let offset = |name: &str| {
            let location = reflection.uniform_location(name).unwrap();
            reflection.uniform(location).unwrap().offset
        };
        assert_eq!(offset("light_position"), 0);
        assert_eq!(offset("glossiness"), 12);
        assert_eq!(offset("eye_position"), 16);
        assert_eq!(offset("bumpiness"), 28);
        assert_eq!(offset("specular_level"), 44);
        assert_eq!(offset("ambient_light"), 64);
    }

    #[test]
    fn reflects_textures_as_sampler_uniforms() {
        let reflection = ShaderReflection::from_wgsl(VERTEX, FRAGMENT).unwrap();

        for name in ["diffuse_map", "bump_map", "spec_map"] {
            let location = reflection.uniform_location(name).unwrap();
            assert_eq!(reflection.uniform(location).unwrap().ty, UniformType::Sampler);
        }
        assert_eq!(reflection.textures().count(), 3);
        assert_eq!(reflection.samplers.len(), 1);
        assert_eq!(reflection.group_count(), 2);

        let transforms = reflection.transforms.unwrap();
        assert_eq!(transforms.model_view_offset, 0);
        assert_eq!(transforms.projection_offset, 64);
    }

    #[test]
    fn rejects_missing_entry_point() {
        let err = ShaderReflection::from_wgsl(
            "@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
            FRAGMENT,
        )
        .unwrap_err();
        assert!(err.to_string().contains("vs_main"));
    }

    #[test]
    fn rejects_invalid_wgsl() {
        assert!(ShaderReflection::from_wgsl("fn vs_main( {", FRAGMENT).is_err());
    }
}

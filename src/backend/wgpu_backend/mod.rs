//! wgpu backend implementation
//!
//! The immediate-mode state machine is recorded on the CPU: every draw
//! snapshots the current program, capabilities, matrices, textures and vertex
//! arrays into GPU buffers and bind groups. `flush` replays the recorded
//! draws into render passes (a new pass starts at every `clear`) and submits
//! them; `present` flushes and presents the swapchain image.

mod state;

use crate::backend::reflection::{BindingSlot, ShaderReflection};
use crate::backend::traits::*;
use crate::backend::types::*;
use glam::Mat4;
use parking_lot::Mutex;
use state::{PipelineKey, StateMachine};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Program id reserved for the built-in textured pipeline
const BUILTIN_PROGRAM: u64 = 0;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Configuration for the wgpu backend
#[derive(Debug, Clone)]
pub struct WgpuBackendConfig {
    /// Enable vsync
    pub vsync: bool,
    /// MSAA sample count (1 disables multisampling)
    pub sample_count: u32,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            sample_count: 4,
        }
    }
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuProgram {
    reflection: ShaderReflection,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    /// CPU copy of every uniform block
    block_data: Vec<Vec<u8>>,
    /// Texture unit selected by each sampler uniform
    sampler_units: HashMap<usize, u32>,
}

/// Recorded draw with all of its GPU inputs
struct DrawCommand {
    pipeline: PipelineKey,
    bind_groups: Vec<wgpu::BindGroup>,
    vertex_buffers: Vec<wgpu::Buffer>,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    viewport: [f32; 4],
}

enum FrameCommand {
    Clear {
        color: Option<[f32; 4]>,
        depth: Option<f32>,
    },
    Draw(DrawCommand),
}

/// Render targets that follow the surface size
struct Attachments {
    depth: wgpu::TextureView,
    msaa: Option<wgpu::TextureView>,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    attachments: Attachments,
    current_texture: Option<wgpu::SurfaceTexture>,

    // Resource storage
    programs: HashMap<u64, GpuProgram>,
    textures: HashMap<u64, GpuTexture>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    default_sampler: wgpu::Sampler,
    white_texture: GpuTexture,

    // Handle counters
    next_program_id: u64,
    next_texture_id: u64,

    state: StateMachine,
    commands: Vec<FrameCommand>,
    error_sink: Arc<Mutex<Option<ErrorCode>>>,
}

impl WgpuBackend {
    fn convert_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
        match factor {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        }
    }

    fn convert_vertex_format(components: u32) -> Option<wgpu::VertexFormat> {
        match components {
            1 => Some(wgpu::VertexFormat::Float32),
            2 => Some(wgpu::VertexFormat::Float32x2),
            3 => Some(wgpu::VertexFormat::Float32x3),
            4 => Some(wgpu::VertexFormat::Float32x4),
            _ => None,
        }
    }

    fn create_attachments(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> Attachments {
        let size = wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        };

        let depth = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Depth Buffer"),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let msaa = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("MSAA Color Buffer"),
                    size,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: config.format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        Attachments { depth, msaa }
    }

    fn upload_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &ImageData<'_>,
    ) -> GpuTexture {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: image.label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture { texture, view }
    }

    fn raise(&self, code: ErrorCode) {
        self.error_sink.lock().get_or_insert(code);
    }
}

impl WgpuBackend {
    /// Create a backend rendering into `window`
    pub fn new(window: Arc<winit::window::Window>, config: WgpuBackendConfig) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, config))
    }

    /// Async initialization, wrapped by `new`
    pub async fn new_async(
        window: Arc<winit::window::Window>,
        config: WgpuBackendConfig,
    ) -> BackendResult<Self> {
        let (instance, surface, adapter, device, queue) = Self::init_native(window.clone()).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::SurfaceCreationFailed("Surface has no formats".into()))?;

        let present_mode = if config.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count = config.sample_count.max(1);
        let attachments = Self::create_attachments(&device, &surface_config, sample_count);

        let error_sink = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&error_sink);
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("wgpu error: {error}");
            let code = match error {
                wgpu::Error::OutOfMemory { .. } => ErrorCode::OutOfMemory,
                _ => ErrorCode::InvalidOperation,
            };
            sink.lock().get_or_insert(code);
        }));

        let default_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Default Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white_texture = Self::upload_texture(
            &device,
            &queue,
            &ImageData {
                label: Some("white"),
                width: 1,
                height: 1,
                rgba: &[255, 255, 255, 255],
            },
        );

        let mut backend = Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            sample_count,
            attachments,
            current_texture: None,
            programs: HashMap::new(),
            textures: HashMap::new(),
            pipelines: HashMap::new(),
            default_sampler,
            white_texture,
            next_program_id: BUILTIN_PROGRAM + 1,
            next_texture_id: 1,
            state: StateMachine::new(size.width.max(1), size.height.max(1)),
            commands: Vec::new(),
            error_sink,
        };

        let builtin = backend.build_program(Some("Builtin Textured"), BUILTIN_VERTEX_SHADER, BUILTIN_FRAGMENT_SHADER)?;
        backend.programs.insert(BUILTIN_PROGRAM, builtin);

        Ok(backend)
    }

    /// Native initialization
    async fn init_native(
        window: Arc<winit::window::Window>,
    ) -> BackendResult<(
        wgpu::Instance,
        wgpu::Surface<'static>,
        wgpu::Adapter,
        wgpu::Device,
        wgpu::Queue,
    )> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Graphics Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok((instance, surface, adapter, device, queue))
    }

    /// Resize the swapchain and the attachments that follow it
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let max_size = self.device.limits().max_texture_dimension_2d;
        self.surface_config.width = width.min(max_size);
        self.surface_config.height = height.min(max_size);
        self.surface.configure(&self.device, &self.surface_config);
        self.attachments =
            Self::create_attachments(&self.device, &self.surface_config, self.sample_count);
    }

    /// Get the actual surface size (may be clamped by device limits)
    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn build_program(
        &self,
        label: Option<&str>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<GpuProgram> {
        let reflection = ShaderReflection::from_wgsl(vertex_source, fragment_source)?;

        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label,
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label,
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let group_layouts: Vec<wgpu::BindGroupLayout> = (0..reflection.group_count())
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = layout_entries(&reflection, group)
                    .into_iter()
                    .map(|(binding, ty)| wgpu::BindGroupLayoutEntry {
                        binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty,
                        count: None,
                    })
                    .collect();
                self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label,
                    entries: &entries,
                })
            })
            .collect();

        let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &layout_refs,
                push_constant_ranges: &[],
            });

        let block_data = reflection
            .blocks
            .iter()
            .map(|block| vec![0u8; block.size as usize])
            .collect();

        log::debug!(
            "Created program {:?}: {} inputs, {} uniforms",
            label,
            reflection.inputs.len(),
            reflection.uniforms.len()
        );

        Ok(GpuProgram {
            reflection,
            vertex_module,
            fragment_module,
            pipeline_layout,
            group_layouts,
            block_data,
            sampler_units: HashMap::new(),
        })
    }

    fn create_pipeline(&self, key: &PipelineKey) -> Option<wgpu::RenderPipeline> {
        let program = self.programs.get(&key.program)?;

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
            .inputs
            .iter()
            .map(|&(location, components)| {
                Self::convert_vertex_format(components).map(|format| {
                    [wgpu::VertexAttribute {
                        format,
                        offset: 0,
                        shader_location: location,
                    }]
                })
            })
            .collect::<Option<_>>()?;

        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = key
            .inputs
            .iter()
            .zip(attributes.iter())
            .map(|(&(_, components), attrs)| wgpu::VertexBufferLayout {
                array_stride: components as u64 * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let blend = key.blend.map(|(src, dst)| {
            let component = wgpu::BlendComponent {
                src_factor: Self::convert_blend_factor(src),
                dst_factor: Self::convert_blend_factor(dst),
                operation: wgpu::BlendOperation::Add,
            };
            wgpu::BlendState {
                color: component,
                alpha: component,
            }
        });

        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.surface_config.format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let depth_stencil = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };

        Some(
            self.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: None,
                    layout: Some(&program.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &program.vertex_module,
                        entry_point: crate::backend::reflection::VERTEX_ENTRY,
                        buffers: &vertex_buffers,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &program.fragment_module,
                        entry_point: crate::backend::reflection::FRAGMENT_ENTRY,
                        targets: &color_targets,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: Some(depth_stencil),
                    multisample: wgpu::MultisampleState {
                        count: self.sample_count,
                        ..Default::default()
                    },
                    multiview: None,
                }),
        )
    }

    /// Snapshot the current state into a draw command
    fn record_draw(&mut self, mut sources: HashMap<u32, OwnedVertexData>, triangle_indices: Vec<u32>) {
        let program_id = self.state.current_program.unwrap_or(BUILTIN_PROGRAM);
        let Some(program) = self.programs.get(&program_id) else {
            self.raise(ErrorCode::InvalidOperation);
            return;
        };

        let Some(vertex_count) = sources.values().map(|data| data.vertex_count()).min() else {
            self.raise(ErrorCode::InvalidOperation);
            return;
        };
        if triangle_indices.iter().any(|&index| index as usize >= vertex_count) {
            self.raise(ErrorCode::InvalidValue);
            return;
        }
        if triangle_indices.is_empty() {
            return;
        }

        let Some(viewport) = self.state.clamped_viewport(self.surface_size()) else {
            return;
        };

        let mut inputs = Vec::with_capacity(program.reflection.inputs.len());
        let mut vertex_buffers = Vec::with_capacity(program.reflection.inputs.len());
        for input in &program.reflection.inputs {
            // Unfed inputs read zeros, like a disabled generic attribute.
            let data = sources.remove(&input.location.0).unwrap_or_else(|| OwnedVertexData {
                components: input.components,
                values: vec![0.0; vertex_count * input.components as usize],
            });
            if Self::convert_vertex_format(data.components).is_none() {
                self.raise(ErrorCode::InvalidValue);
                return;
            }
            inputs.push((input.location.0, data.components));
            vertex_buffers.push(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(input.name.as_str()),
                contents: bytemuck::cast_slice(&data.values),
                usage: wgpu::BufferUsages::VERTEX,
            }));
        }

        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&triangle_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let bind_groups = self.create_bind_groups(program_id);

        let pipeline = PipelineKey {
            program: program_id,
            depth_test: self.state.is_enabled(Capability::DepthTest),
            blend: self
                .state
                .is_enabled(Capability::Blend)
                .then_some(self.state.blend_func),
            inputs,
        };

        self.commands.push(FrameCommand::Draw(DrawCommand {
            pipeline,
            bind_groups,
            vertex_buffers,
            index_buffer,
            index_count: triangle_indices.len() as u32,
            viewport,
        }));
    }

    fn create_bind_groups(&self, program_id: u64) -> Vec<wgpu::BindGroup> {
        let Some(program) = self.programs.get(&program_id) else {
            return Vec::new();
        };
        let reflection = &program.reflection;
        let builtin = program_id == BUILTIN_PROGRAM;

        // Buffers must outlive the bind group descriptors built below.
        let mut buffers: Vec<(BindingSlot, wgpu::Buffer)> = Vec::new();
        if let Some(transforms) = reflection.transforms {
            let mut bytes = vec![0u8; transforms.size as usize];
            write_matrix(&mut bytes, transforms.model_view_offset, &self.state.model_view);
            write_matrix(&mut bytes, transforms.projection_offset, &self.state.projection);
            buffers.push((transforms.slot, self.uniform_buffer("transforms", &bytes)));
        }
        for (block, data) in reflection.blocks.iter().zip(&program.block_data) {
            buffers.push((block.slot, self.uniform_buffer(&block.name, data)));
        }

        let mut views: Vec<(BindingSlot, &wgpu::TextureView)> = Vec::new();
        for (uniform, slot) in reflection.textures() {
            let unit = program.sampler_units.get(&uniform).copied().unwrap_or(0);
            let bound = self
                .state
                .texture_units
                .get(&unit)
                .and_then(|id| self.textures.get(id));
            let texture = match bound {
                Some(texture) if !builtin || self.state.is_enabled(Capability::Texture2d) => texture,
                _ => &self.white_texture,
            };
            views.push((slot, &texture.view));
        }

        program
            .group_layouts
            .iter()
            .enumerate()
            .map(|(group, layout)| {
                let group = group as u32;
                let mut entries: Vec<wgpu::BindGroupEntry> = Vec::new();
                for (slot, buffer) in buffers.iter().filter(|(slot, _)| slot.group == group) {
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot.binding,
                        resource: buffer.as_entire_binding(),
                    });
                }
                for (slot, view) in views.iter().filter(|(slot, _)| slot.group == group) {
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot.binding,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                }
                for slot in reflection.samplers.iter().filter(|slot| slot.group == group) {
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot.binding,
                        resource: wgpu::BindingResource::Sampler(&self.default_sampler),
                    });
                }
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: None,
                    layout,
                    entries: &entries,
                })
            })
            .collect()
    }

    fn uniform_buffer(&self, label: &str, data: &[u8]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: data,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    /// Arrays fed to the current draw, keyed by shader location
    fn enabled_sources(&self) -> HashMap<u32, OwnedVertexData> {
        let client = self.state.client_arrays.iter().filter_map(|(array, state)| {
            state.enabled_data().map(|data| (array.location().0, data.clone()))
        });
        let generic = self.state.attrib_arrays.iter().filter_map(|(location, state)| {
            state.enabled_data().map(|data| (location.0, data.clone()))
        });
        client.chain(generic).collect()
    }

    fn acquire_surface_texture(&mut self) -> Option<&wgpu::SurfaceTexture> {
        if self.current_texture.is_none() {
            match self.surface.get_current_texture() {
                Ok(texture) => self.current_texture = Some(texture),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("Surface lost or outdated, reconfiguring");
                    self.surface.configure(&self.device, &self.surface_config);
                    return None;
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    self.raise(ErrorCode::OutOfMemory);
                    return None;
                }
                Err(e) => {
                    log::warn!("Failed to acquire surface texture: {e}");
                    return None;
                }
            }
        }
        self.current_texture.as_ref()
    }
}

impl GraphicsBackend for WgpuBackend {
    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.clear_color = color;
    }

    fn set_clear_depth(&mut self, depth: f32) {
        self.state.clear_depth = depth;
    }

    fn enable(&mut self, capability: Capability) {
        if capability == Capability::Multisample && self.sample_count == 1 {
            log::debug!("Multisampling requested on a single-sampled surface");
        }
        self.state.capabilities.insert(capability);
    }

    fn disable(&mut self, capability: Capability) {
        self.state.capabilities.remove(&capability);
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.state.viewport = (x, y, width, height);
    }

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.state.blend_func = (src, dst);
    }

    fn clear(&mut self, mask: ClearMask) {
        self.commands.push(FrameCommand::Clear {
            color: mask.contains(ClearMask::COLOR).then_some(self.state.clear_color),
            depth: mask.contains(ClearMask::DEPTH).then_some(self.state.clear_depth),
        });
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: Mat4) {
        match mode {
            MatrixMode::ModelView => self.state.model_view = matrix,
            MatrixMode::Projection => self.state.projection = matrix,
        }
    }

    fn create_program(
        &mut self,
        label: Option<&str>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<ProgramHandle> {
        let program = self.build_program(label, vertex_source, fragment_source)?;

        let id = self.next_program_id;
        self.next_program_id += 1;
        self.programs.insert(id, program);

        Ok(ProgramHandle(id))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if program.0 == BUILTIN_PROGRAM || self.programs.remove(&program.0).is_none() {
            self.raise(ErrorCode::InvalidValue);
            return;
        }
        self.pipelines.retain(|key, _| key.program != program.0);
        if self.state.current_program == Some(program.0) {
            self.state.current_program = None;
        }
    }

    fn program_reflection(&self, program: ProgramHandle) -> Option<&ShaderReflection> {
        self.programs.get(&program.0).map(|p| &p.reflection)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        match program {
            Some(handle) if !self.programs.contains_key(&handle.0) => {
                self.raise(ErrorCode::InvalidValue);
            }
            _ => self.state.current_program = program.map(|p| p.0),
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let program_id = self.state.current_program.unwrap_or(BUILTIN_PROGRAM);
        let Some(program) = self.programs.get_mut(&program_id) else {
            self.raise(ErrorCode::InvalidOperation);
            return;
        };
        let Some(uniform) = program.reflection.uniform(location).cloned() else {
            self.raise(ErrorCode::InvalidOperation);
            return;
        };

        match (uniform.ty, value, uniform.block) {
            (UniformType::Sampler, UniformValue::Int(unit), _) if unit >= 0 => {
                program.sampler_units.insert(location.index(), unit as u32);
            }
            (ty, value, Some(block)) if ty == value.ty() => {
                let bytes = value.to_bytes();
                let start = uniform.offset as usize;
                if let Some(target) = program.block_data[block].get_mut(start..start + bytes.len()) {
                    target.copy_from_slice(&bytes);
                }
            }
            _ => self.raise(ErrorCode::InvalidOperation),
        }
    }

    fn create_texture(&mut self, image: &ImageData<'_>) -> BackendResult<TextureHandle> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}: {}x{} image with {} bytes",
                image.label.unwrap_or("texture"),
                image.width,
                image.height,
                image.rgba.len()
            )));
        }
        let max_size = self.device.limits().max_texture_dimension_2d;
        if image.width > max_size || image.height > max_size {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}x{} exceeds the device limit of {max_size}",
                image.width, image.height
            )));
        }

        let texture = Self::upload_texture(&self.device, &self.queue, image);

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);
        log::debug!("Created texture {:?} ({}x{})", image.label, image.width, image.height);

        Ok(TextureHandle(id))
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_none() {
            self.raise(ErrorCode::InvalidValue);
        }
        self.state.texture_units.retain(|_, id| *id != texture.0);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(handle) if !self.textures.contains_key(&handle.0) => {
                self.raise(ErrorCode::InvalidValue);
            }
            Some(handle) => {
                self.state.texture_units.insert(unit, handle.0);
            }
            None => {
                self.state.texture_units.remove(&unit);
            }
        }
    }

    fn enable_client_array(&mut self, array: ClientArray) {
        self.state.client_arrays.entry(array).or_default().enabled = true;
    }

    fn disable_client_array(&mut self, array: ClientArray) {
        self.state.client_arrays.entry(array).or_default().enabled = false;
    }

    fn client_array_pointer(&mut self, array: ClientArray, data: VertexData<'_>) {
        self.state.client_arrays.entry(array).or_default().data = Some(data.to_owned());
    }

    fn enable_attrib_array(&mut self, location: AttribLocation) {
        self.state.attrib_arrays.entry(location).or_default().enabled = true;
    }

    fn disable_attrib_array(&mut self, location: AttribLocation) {
        self.state.attrib_arrays.entry(location).or_default().enabled = false;
    }

    fn attrib_pointer(&mut self, location: AttribLocation, data: VertexData<'_>) {
        self.state.attrib_arrays.entry(location).or_default().data = Some(data.to_owned());
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        let sources = self.enabled_sources();
        self.record_draw(sources, topology.triangulate(first, count));
    }

    fn draw_elements(&mut self, topology: Topology, indices: &[u32]) {
        let sources = self.enabled_sources();
        let expanded = topology
            .triangulate(0, indices.len() as u32)
            .into_iter()
            .map(|i| indices[i as usize])
            .collect();
        self.record_draw(sources, expanded);
    }

    fn draw_immediate(&mut self, topology: Topology, vertices: &[TexturedVertex]) {
        let positions: Vec<glam::Vec3> = vertices.iter().map(|v| v.position).collect();
        let uvs: Vec<glam::Vec2> = vertices.iter().map(|v| v.uv).collect();

        let mut sources = HashMap::new();
        sources.insert(
            ClientArray::Position.location().0,
            VertexData::vec3(&positions).to_owned(),
        );
        sources.insert(
            ClientArray::TexCoord.location().0,
            VertexData::vec2(&uvs).to_owned(),
        );
        self.record_draw(sources, topology.triangulate(0, vertices.len() as u32));
    }

    fn flush(&mut self) {
        if self.commands.is_empty() {
            return;
        }
        let commands = std::mem::take(&mut self.commands);

        // Pipelines are created up front; render passes only borrow them.
        for command in &commands {
            if let FrameCommand::Draw(draw) = command {
                if !self.pipelines.contains_key(&draw.pipeline) {
                    match self.create_pipeline(&draw.pipeline) {
                        Some(pipeline) => {
                            self.pipelines.insert(draw.pipeline.clone(), pipeline);
                        }
                        None => self.raise(ErrorCode::InvalidOperation),
                    }
                }
            }
        }

        let Some(surface_texture) = self.acquire_surface_texture() else {
            return;
        };
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (color_view, resolve_target) = match &self.attachments.msaa {
            Some(msaa) => (msaa, Some(&surface_view)),
            None => (&surface_view, None),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for pass in split_passes(&commands) {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Forward Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: match pass.clear_color {
                            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                                r: c[0] as f64,
                                g: c[1] as f64,
                                b: c[2] as f64,
                                a: c[3] as f64,
                            }),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.attachments.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: match pass.clear_depth {
                            Some(depth) => wgpu::LoadOp::Clear(depth),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in pass.draws {
                let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                    continue;
                };
                let [x, y, width, height] = draw.viewport;
                render_pass.set_viewport(x, y, width, height, 0.0, 1.0);
                render_pass.set_pipeline(pipeline);
                for (index, bind_group) in draw.bind_groups.iter().enumerate() {
                    render_pass.set_bind_group(index as u32, bind_group, &[]);
                }
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn present(&mut self) -> BackendResult<()> {
        self.flush();
        if let Some(texture) = self.current_texture.take() {
            texture.present();
        }
        Ok(())
    }

    fn get_error(&mut self) -> ErrorCode {
        self.error_sink.lock().take().unwrap_or(ErrorCode::NoError)
    }
}

/// Draws sharing one set of load operations
struct PassPlan<'a> {
    clear_color: Option<[f32; 4]>,
    clear_depth: Option<f32>,
    draws: Vec<&'a DrawCommand>,
}

/// Group commands into render passes; each clear after a draw opens a new pass
fn split_passes(commands: &[FrameCommand]) -> Vec<PassPlan<'_>> {
    let mut passes = Vec::new();
    let mut current = PassPlan {
        clear_color: None,
        clear_depth: None,
        draws: Vec::new(),
    };

    for command in commands {
        match command {
            FrameCommand::Clear { color, depth } => {
                if !current.draws.is_empty() {
                    passes.push(std::mem::replace(
                        &mut current,
                        PassPlan {
                            clear_color: None,
                            clear_depth: None,
                            draws: Vec::new(),
                        },
                    ));
                }
                current.clear_color = color.or(current.clear_color);
                current.clear_depth = depth.or(current.clear_depth);
            }
            FrameCommand::Draw(draw) => current.draws.push(draw),
        }
    }

    if !current.draws.is_empty() || current.clear_color.is_some() || current.clear_depth.is_some() {
        passes.push(current);
    }
    passes
}

fn layout_entries(reflection: &ShaderReflection, group: u32) -> Vec<(u32, wgpu::BindingType)> {
    let uniform = wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    };

    let mut entries = Vec::new();
    if let Some(transforms) = reflection.transforms.filter(|t| t.slot.group == group) {
        entries.push((transforms.slot.binding, uniform));
    }
    for block in reflection.blocks.iter().filter(|b| b.slot.group == group) {
        entries.push((block.slot.binding, uniform));
    }
    for (_, slot) in reflection.textures().filter(|(_, s)| s.group == group) {
        entries.push((
            slot.binding,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        ));
    }
    for slot in reflection.samplers.iter().filter(|s| s.group == group) {
        entries.push((
            slot.binding,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        ));
    }
    entries
}

fn write_matrix(bytes: &mut [u8], offset: u32, matrix: &Mat4) {
    let start = offset as usize;
    let source = bytemuck::bytes_of(matrix);
    if let Some(target) = bytes.get_mut(start..start + source.len()) {
        target.copy_from_slice(source);
    }
}

/// Textured, unlit pipeline used when no program is bound
pub const BUILTIN_VERTEX_SHADER: &str = r#"
struct Transforms {
    model_view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> transforms: Transforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(2) uv: vec2<f32>) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = transforms.projection * transforms.model_view * vec4<f32>(position, 1.0);
    output.uv = uv;
    return output;
}
"#;

pub const BUILTIN_FRAGMENT_SHADER: &str = r#"
@group(1) @binding(0) var base_texture: texture_2d<f32>;
@group(1) @binding(1) var base_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(base_texture, base_sampler, uv);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_shaders_reflect_expected_interface() {
        let reflection =
            ShaderReflection::from_wgsl(BUILTIN_VERTEX_SHADER, BUILTIN_FRAGMENT_SHADER).unwrap();

        assert_eq!(reflection.attrib_location("position"), Some(AttribLocation(0)));
        assert_eq!(reflection.attrib_location("uv"), Some(AttribLocation(2)));
        assert!(reflection.transforms.is_some());
        assert_eq!(reflection.textures().count(), 1);
        assert_eq!(reflection.group_count(), 2);
    }

    #[test]
    fn clears_after_draws_open_new_passes() {
        let commands = vec![
            FrameCommand::Clear {
                color: Some([1.0, 0.0, 0.0, 1.0]),
                depth: None,
            },
            FrameCommand::Clear {
                color: None,
                depth: Some(1.0),
            },
        ];
        let passes = split_passes(&commands);

        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].clear_color, Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(passes[0].clear_depth, Some(1.0));
    }

    #[test]
    fn matrices_are_written_at_reflected_offsets() {
        let mut bytes = vec![0u8; 128];
        write_matrix(&mut bytes, 64, &Mat4::IDENTITY);

        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(floats[0], 0.0);
        assert_eq!(floats[16], 1.0);
        assert_eq!(floats[21], 1.0);
    }
}

//! wgpu implementation of [`GraphicsBackend`].
//!
//! wgpu has no global "bound program" state, so the backend keeps it: uniform
//! uploads go into a CPU copy of the bound program's uniform block, and every
//! draw snapshots that block into its own buffer and bind group. Draws are
//! queued until [`WgpuBackend::encode`] replays them into render passes against
//! caller-supplied targets. Pipelines are created on first use per program,
//! vertex array and target formats.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::shader::{FRAGMENT_ENTRY, VERTEX_ENTRY};

use super::backend::{
    BackendResult, BufferHandle, GraphicsBackend, ProgramHandle, ProgramSource, StepMode,
    TextureHandle, UniformValue, VertexArrayDesc, VertexArrayHandle, VertexFormat,
};
use super::{BackendError, FrameTargets, TargetFormats};

/// Parses and validates one WGSL stage, returning the rendered diagnostic on failure.
pub fn validate_wgsl(source: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.emit_to_string(source))?;
    Ok(())
}

fn to_wgpu_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
        VertexFormat::Sint32 => wgpu::VertexFormat::Sint32,
    }
}

fn to_wgpu_step(step: StepMode) -> wgpu::VertexStepMode {
    match step {
        StepMode::Vertex => wgpu::VertexStepMode::Vertex,
        StepMode::Instance => wgpu::VertexStepMode::Instance,
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct GpuProgram {
    source: ProgramSource,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    formats: TargetFormats,
}

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    /// Buffer per vertex-buffer slot, in shader location order.
    slots: Vec<BufferHandle>,
}

struct PendingDraw {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    vertex_count: u32,
    instance_count: u32,
    bind_group: wgpu::BindGroup,
}

/// Graphics backend over a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u64,

    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayDesc>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    pipelines: HashMap<PipelineKey, CachedPipeline>,

    bound_program: Option<ProgramHandle>,
    uniform_block: Vec<u8>,
    bound_textures: HashMap<String, TextureHandle>,

    pending: Vec<PendingDraw>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            bound_program: None,
            uniform_block: Vec::new(),
            bound_textures: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Draws queued since the last [`encode`](Self::encode).
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Replays queued draws into `encoder`, loading and storing `targets`.
    ///
    /// Consecutive draws with the same number of fragment outputs share a
    /// render pass. Returns the number of draws encoded. If a pipeline cannot
    /// be created nothing is encoded and the queue is left intact.
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &FrameTargets<'_>,
    ) -> BackendResult<usize> {
        // Mutating methods must happen before borrowing pipelines immutably.
        // Draws stay queued until every pipeline exists.
        let pairs: Vec<_> = self.pending.iter().map(|d| (d.program, d.vertex_array)).collect();
        let mut keys = Vec::with_capacity(pairs.len());
        for (program, vertex_array) in pairs {
            keys.push(self.ensure_pipeline(program, vertex_array, targets.formats)?);
        }
        let draws = std::mem::take(&mut self.pending);

        let outputs_of = |program: ProgramHandle| {
            self.programs
                .get(&program)
                .map_or(0, |p| p.source.fragment_outputs.len())
        };

        let mut encoded = 0;
        let mut start = 0;
        while start < draws.len() {
            let outputs = outputs_of(draws[start].program);
            let mut end = start + 1;
            while end < draws.len() && outputs_of(draws[end].program) == outputs {
                end += 1;
            }

            if outputs == 0 && targets.depth.is_none() {
                log::warn!(
                    "WgpuBackend: skipping {} depth-only draws without a depth target",
                    end - start
                );
                start = end;
                continue;
            }

            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = (0
                ..outputs)
                .map(|location| {
                    targets
                        .output_view(location)
                        .map(|view| wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })
                })
                .collect();

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stipple draw pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: targets.depth.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for (draw, key) in draws[start..end].iter().zip(&keys[start..end]) {
                let Some(cached) = self.pipelines.get(key) else { continue };
                rpass.set_pipeline(&cached.pipeline);
                rpass.set_bind_group(0, &draw.bind_group, &[]);
                for (slot, handle) in cached.slots.iter().enumerate() {
                    let Some(buffer) = self.buffers.get(handle) else { continue };
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                rpass.draw(0..draw.vertex_count, 0..draw.instance_count);
                encoded += 1;
            }

            start = end;
        }

        log::trace!("WgpuBackend: encoded {encoded} draws");
        Ok(encoded)
    }

    fn ensure_pipeline(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        formats: TargetFormats,
    ) -> BackendResult<PipelineKey> {
        let key = PipelineKey {
            program,
            vertex_array,
            formats,
        };
        if self.pipelines.contains_key(&key) {
            return Ok(key);
        }

        let gpu_program = self.programs.get(&program).ok_or(BackendError::UnknownHandle {
            kind: "program",
            id: program.0,
        })?;
        let desc = self
            .vertex_arrays
            .get(&vertex_array)
            .ok_or(BackendError::UnknownHandle {
                kind: "vertex array",
                id: vertex_array.0,
            })?;

        let source = &gpu_program.source;
        let mut slots = Vec::with_capacity(source.vertex_inputs.len());
        let mut attributes = Vec::with_capacity(source.vertex_inputs.len());
        for (location, input) in source.vertex_inputs.iter().enumerate() {
            let binding = desc.binding(&input.name).ok_or_else(|| {
                BackendError::ResourceCreation(format!(
                    "vertex array `{}` has no buffer for input `{}` of `{}`",
                    desc.label, input.name, source.label
                ))
            })?;
            slots.push(binding.buffer);
            attributes.push((
                binding,
                [wgpu::VertexAttribute {
                    format: to_wgpu_format(binding.format),
                    offset: 0,
                    shader_location: location as u32,
                }],
            ));
        }
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .map(|(binding, attr)| wgpu::VertexBufferLayout {
                array_stride: binding.format.size(),
                step_mode: to_wgpu_step(binding.step_mode),
                attributes: attr,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = (0..source.fragment_outputs.len())
            .map(|location| {
                formats.output_format(location).map(|format| wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&source.label),
            layout: Some(&gpu_program.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &gpu_program.vertex,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &gpu_program.fragment,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &targets,
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: formats.depth.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: formats.depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "WgpuBackend: pipeline for `{}` ({} vertex buffers, {} color targets)",
            source.label,
            buffers.len(),
            targets.len()
        );

        self.pipelines.insert(key, CachedPipeline { pipeline, slots });
        Ok(key)
    }

    fn create_bind_group_layout(&self, source: &ProgramSource) -> wgpu::BindGroupLayout {
        let mut entries = Vec::with_capacity(1 + 2 * source.textures.len());
        if !source.uniforms.is_empty() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(source.uniforms.size() as u64),
                },
                count: None,
            });
        }
        for i in 0..source.textures.len() {
            let binding = 1 + 2 * i as u32;
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: binding + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&source.label),
                entries: &entries,
            })
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BackendResult<BufferHandle> {
        // Empty point sets still get a (never bound) non-empty buffer.
        let contents = if contents.is_empty() { &[0u8; 4][..] } else { contents };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let handle = BufferHandle(self.allocate());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn create_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> BackendResult<TextureHandle> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || texels.len() != expected {
            return Err(BackendError::ResourceCreation(format!(
                "texture `{label}`: {} bytes for {width}x{height} RGBA8",
                texels.len()
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let handle = TextureHandle(self.allocate());
        self.textures.insert(
            handle,
            GpuTexture {
                _texture: texture,
                view,
                sampler,
            },
        );
        Ok(handle)
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> BackendResult<VertexArrayHandle> {
        if let Some(missing) = desc.bindings.iter().find(|b| !self.buffers.contains_key(&b.buffer)) {
            return Err(BackendError::UnknownHandle {
                kind: "buffer",
                id: missing.buffer.0,
            });
        }
        let handle = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(handle, desc.clone());
        log::debug!(
            "WgpuBackend: vertex array `{}` with {} bindings",
            desc.label,
            desc.bindings.len()
        );
        Ok(handle)
    }

    fn compile_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramHandle> {
        for stage in [&source.vertex, &source.fragment] {
            validate_wgsl(stage).map_err(|diagnostic| BackendError::ShaderCompilation {
                label: source.label.clone(),
                diagnostic,
            })?;
        }

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
        });

        let bind_group_layout = self.create_bind_group_layout(source);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&source.label),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let handle = ProgramHandle(self.allocate());
        self.programs.insert(
            handle,
            GpuProgram {
                source: source.clone(),
                vertex,
                fragment,
                bind_group_layout,
                pipeline_layout,
            },
        );
        Ok(handle)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let size = self
            .programs
            .get(&program)
            .map_or(0, |p| p.source.uniforms.size());
        self.bound_program = Some(program);
        self.uniform_block.clear();
        self.uniform_block.resize(size, 0);
        self.bound_textures.clear();
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(program) = self.bound_program.and_then(|p| self.programs.get(&p)) else {
            log::warn!("WgpuBackend: uniform `{name}` set without a bound program");
            return;
        };
        if !program
            .source
            .uniforms
            .write(&mut self.uniform_block, name, &value.to_bytes())
        {
            log::trace!("WgpuBackend: `{}` has no uniform `{name}`", program.source.label);
        }
    }

    fn bind_texture(&mut self, name: &str, texture: TextureHandle) {
        self.bound_textures.insert(name.to_owned(), texture);
    }

    fn draw_instanced(
        &mut self,
        vertex_array: VertexArrayHandle,
        vertex_count: u32,
        instance_count: u32,
    ) {
        let Some(handle) = self.bound_program else {
            log::warn!("WgpuBackend: draw without a bound program");
            return;
        };
        let Some(program) = self.programs.get(&handle) else { return };

        let uniform_buffer = (!self.uniform_block.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&program.source.label),
                    contents: &self.uniform_block,
                    usage: wgpu::BufferUsages::UNIFORM,
                })
        });

        let mut entries = Vec::with_capacity(1 + 2 * program.source.textures.len());
        if let Some(buffer) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        for (i, name) in program.source.textures.iter().enumerate() {
            let texture = self
                .bound_textures
                .get(name)
                .and_then(|t| self.textures.get(t));
            let Some(texture) = texture else {
                log::warn!(
                    "WgpuBackend: `{}` drawn without texture `{name}`; draw skipped",
                    program.source.label
                );
                return;
            };
            let binding = 1 + 2 * i as u32;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.source.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        log::trace!(
            "WgpuBackend: queue `{}` {vertex_count} vertices x {instance_count} instances",
            program.source.label
        );
        self.pending.push(PendingDraw {
            program: handle,
            vertex_array,
            vertex_count,
            instance_count,
            bind_group,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_stage() {
        let src = "@fragment\nfn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }\n";
        assert!(validate_wgsl(src).is_ok());
    }

    #[test]
    fn rejects_with_rendered_diagnostic() {
        let src = "@fragment\nfn fs_main() -> @location(0) vec4<f32> { return undefined_name; }\n";
        let diagnostic = validate_wgsl(src).unwrap_err();
        assert!(diagnostic.contains("undefined_name"), "{diagnostic}");
    }
}

//! wgpu adapter for [`DrawBackend`].
//!
//! Draw calls made during a flush are recorded and encoded into a single
//! render pass at [`end_flush`](DrawBackend::end_flush). This is a thin
//! adapter, not a general renderer:
//! - clips that are not scissor-representable are approximated by their bounds;
//! - only texture layer 0 is sampled;
//! - user programs are ignored.

use std::collections::HashMap;

use anyhow::{bail, Context as _, Result};
use bytemuck::{Pod, Zeroable};
use slotmap::SecondaryMap;

use crate::clip::ClipStack;
use crate::coords::{Matrix, PixelBounds};
use crate::device::Gpu;
use crate::paint::PackedColor;
use crate::pipeline::{BlendMode, Filter, Pipeline, Wrap};
use crate::texture::TextureId;

use super::backend::{
    BackendCaps, BufferId, BufferUsage, DrawBackend, DrawCall, FlushTarget, VertexLayout,
};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    mvp: [f32; 16],
    tex_matrix: [f32; 16],
}

const UNIFORM_SIZE: u64 = std::mem::size_of::<Uniforms>() as u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    position_components: usize,
    stride: u64,
    blend: BlendMode,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct SamplerKey {
    filter: Filter,
    wrap: Wrap,
}

/// Layer 0 as seen by the shader; `None` samples the white texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    texture: Option<TextureId>,
    sampler: SamplerKey,
}

#[derive(Debug, Copy, Clone)]
struct ScissorRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// A draw recorded during a flush, encoded at `end_flush`.
#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    pipeline: PipelineKey,
    binding: BindingKey,
    uniform: usize,
    scissor: Option<ScissorRect>,
    vertices: BufferId,
    vertex_offset: u64,
    indices: BufferId,
    first_index: u32,
    index_count: u32,
    base_vertex: i32,
}

/// State accumulated between `begin_flush` and `end_flush`.
#[derive(Debug)]
struct FlushRecording {
    target: FlushTarget,
    scissor: Option<ScissorRect>,
    /// Clip excludes every pixel; draws are dropped.
    clipped_out: bool,
    modelview: Matrix,
    pipeline: Option<(BlendMode, BindingKey, Matrix)>,
    layout: Option<VertexLayout>,
    uniforms: Vec<Uniforms>,
    draws: Vec<PendingDraw>,
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// [`DrawBackend`] over a headless wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    uniform_align: u64,

    buffers: HashMap<BufferId, GpuBuffer>,
    next_buffer: u32,
    textures: SecondaryMap<TextureId, GpuTexture>,

    shader: Option<wgpu::ShaderModule>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: Option<wgpu::PipelineLayout>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    samplers: HashMap<SamplerKey, wgpu::Sampler>,
    white: Option<GpuTexture>,

    uniform_buffer: Option<wgpu::Buffer>,
    uniform_capacity: usize,
    readback: Option<wgpu::Buffer>,

    recording: Option<FlushRecording>,

    warned_clip_bounds: bool,
    warned_extra_layers: bool,
    warned_user_program: bool,
    warned_primitive: bool,
}

impl WgpuBackend {
    pub fn new(gpu: &Gpu) -> Self {
        let uniform_align = gpu.device().limits().min_uniform_buffer_offset_alignment as u64;
        Self {
            device: gpu.device().clone(),
            queue: gpu.queue().clone(),
            uniform_align: uniform_align.max(UNIFORM_SIZE),
            buffers: HashMap::new(),
            next_buffer: 0,
            textures: SecondaryMap::new(),
            shader: None,
            bind_group_layout: None,
            pipeline_layout: None,
            pipelines: HashMap::new(),
            samplers: HashMap::new(),
            white: None,
            uniform_buffer: None,
            uniform_capacity: 0,
            readback: None,
            recording: None,
            warned_clip_bounds: false,
            warned_extra_layers: false,
            warned_user_program: false,
            warned_primitive: false,
        }
    }

    // ── lazy resources ────────────────────────────────────────────────────

    fn ensure_layouts(&mut self) {
        if self.pipeline_layout.is_some() {
            return;
        }

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("strata journal shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/journal.wgsl").into()),
        });

        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("strata journal bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: wgpu::BufferSize::new(UNIFORM_SIZE),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("strata journal pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let white = self.create_gpu_texture(1, 1, "strata white texture");
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &white.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0xff; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );

        self.shader = Some(shader);
        self.bind_group_layout = Some(bind_group_layout);
        self.pipeline_layout = Some(pipeline_layout);
        self.white = Some(white);
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let (Some(shader), Some(layout)) = (self.shader.as_ref(), self.pipeline_layout.as_ref()) else {
            return;
        };

        let attributes = [
            wgpu::VertexAttribute {
                format: if key.position_components == 3 {
                    wgpu::VertexFormat::Float32x3
                } else {
                    wgpu::VertexFormat::Float32x2
                },
                offset: 0,
                shader_location: 0,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Unorm8x4,
                offset: key.position_components as u64 * 4,
                shader_location: 1,
            },
            // Texcoord slots are padded, so layer 0 always exists in the vertex.
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: (key.position_components as u64 + 1) * 4,
                shader_location: 2,
            },
        ];

        let blend = match key.blend {
            BlendMode::SrcOver => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            BlendMode::Replace => wgpu::BlendState::REPLACE,
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("strata journal pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(if key.position_components == 3 { "vs_xyz" } else { "vs_xy" }),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: key.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
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
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("wgpu backend: created pipeline {key:?}");
        self.pipelines.insert(key, pipeline);
    }

    fn ensure_sampler(&mut self, key: SamplerKey) {
        if self.samplers.contains_key(&key) {
            return;
        }
        let address = match key.wrap {
            Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            Wrap::Repeat => wgpu::AddressMode::Repeat,
        };
        let filter = match key.filter {
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("strata layer sampler"),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        self.samplers.insert(key, sampler);
    }

    fn ensure_uniform_capacity(&mut self, count: usize) {
        if self.uniform_buffer.is_some() && self.uniform_capacity >= count {
            return;
        }
        let cap = count.next_power_of_two().max(64);
        self.uniform_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strata journal uniforms"),
            size: cap as u64 * self.uniform_align,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.uniform_capacity = cap;
    }

    fn create_gpu_texture(&self, width: u32, height: u32, label: &str) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture { texture, view, width, height }
    }

    fn write_region(&self, texture: &GpuTexture, bounds: PixelBounds, rgba: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: bounds.x0 as u32, y: bounds.y0 as u32, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bounds.width() as u32 * 4),
                rows_per_image: Some(bounds.height() as u32),
            },
            wgpu::Extent3d {
                width: bounds.width() as u32,
                height: bounds.height() as u32,
                depth_or_array_layers: 1,
            },
        );
    }

    fn scissor_for(clip: &ClipStack, target: &FlushTarget) -> Option<ScissorRect> {
        let full = PixelBounds::new(0, 0, target.width as i32, target.height as i32);
        let b = clip.combined_bounds().intersect(full);
        (!b.is_empty()).then(|| ScissorRect {
            x: b.x0 as u32,
            y: b.y0 as u32,
            width: b.width() as u32,
            height: b.height() as u32,
        })
    }

    // ── encoding ──────────────────────────────────────────────────────────

    fn encode(&mut self, rec: FlushRecording) {
        self.ensure_layouts();
        self.ensure_uniform_capacity(rec.uniforms.len());
        for draw in &rec.draws {
            self.ensure_pipeline(draw.pipeline);
            self.ensure_sampler(draw.binding.sampler);
        }

        let (Some(ubo), Some(bgl), Some(white)) =
            (self.uniform_buffer.as_ref(), self.bind_group_layout.as_ref(), self.white.as_ref())
        else {
            return;
        };
        let Some(target) = self.textures.get(rec.target.texture) else {
            log::warn!("wgpu backend: flush to unknown target texture");
            return;
        };

        let align = self.uniform_align as usize;
        let mut uniform_bytes = vec![0u8; rec.uniforms.len() * align];
        for (i, u) in rec.uniforms.iter().enumerate() {
            uniform_bytes[i * align..i * align + UNIFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(u));
        }
        self.queue.write_buffer(ubo, 0, &uniform_bytes);

        let mut bind_groups: HashMap<BindingKey, wgpu::BindGroup> = HashMap::new();
        for draw in &rec.draws {
            if bind_groups.contains_key(&draw.binding) {
                continue;
            }
            let view = match draw.binding.texture {
                Some(t) => match self.textures.get(t) {
                    Some(tex) => &tex.view,
                    None => &white.view,
                },
                None => &white.view,
            };
            let Some(sampler) = self.samplers.get(&draw.binding.sampler) else { continue };
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("strata journal bind group"),
                layout: bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: ubo,
                            offset: 0,
                            size: wgpu::BufferSize::new(UNIFORM_SIZE),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            });
            bind_groups.insert(draw.binding, bind_group);
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("strata journal encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("strata journal pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let vp = rec.target.viewport;
            rpass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);

            for draw in &rec.draws {
                let (Some(pipeline), Some(bind_group), Some(vbo), Some(ibo)) = (
                    self.pipelines.get(&draw.pipeline),
                    bind_groups.get(&draw.binding),
                    self.buffers.get(&draw.vertices),
                    self.buffers.get(&draw.indices),
                ) else {
                    continue;
                };
                match draw.scissor {
                    Some(s) => rpass.set_scissor_rect(s.x, s.y, s.width, s.height),
                    None => rpass.set_scissor_rect(0, 0, target.width.max(1), target.height.max(1)),
                }
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[(draw.uniform * align) as u32]);
                rpass.set_vertex_buffer(0, vbo.buffer.slice(draw.vertex_offset..));
                rpass.set_index_buffer(ibo.buffer.slice(..), wgpu::IndexFormat::Uint16);
                rpass.draw_indexed(
                    draw.first_index..draw.first_index + draw.index_count,
                    draw.base_vertex,
                    0..1,
                );
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl DrawBackend for WgpuBackend {
    fn caps(&self) -> BackendCaps {
        BackendCaps { indexed: true, quads: false, triangle_fans: false }
    }

    fn create_buffer(&mut self, size: usize, usage: BufferUsage) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        let size = (size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT).max(wgpu::COPY_BUFFER_ALIGNMENT);
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strata journal buffer"),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert(id, GpuBuffer { buffer, size });
        id
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        let Some(buf) = self.buffers.get(&buffer) else {
            log::warn!("wgpu backend: write to unknown buffer {buffer:?}");
            return;
        };
        if offset as u64 + data.len() as u64 > buf.size {
            log::warn!("wgpu backend: write of {} bytes overflows buffer {buffer:?}", data.len());
            return;
        }
        self.queue.write_buffer(&buf.buffer, offset as u64, data);
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        let tex = self.create_gpu_texture(width, height, "strata texture");
        self.textures.insert(texture, tex);
    }

    fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<()> {
        let tex = self.textures.get(texture).context("write_texture: unknown texture")?;
        let bounds = PixelBounds::new(0, 0, tex.width as i32, tex.height as i32);
        let expected = tex.width as usize * tex.height as usize * 4;
        if rgba.len() != expected {
            bail!("write_texture: expected {expected} bytes, got {}", rgba.len());
        }
        self.write_region(tex, bounds, rgba);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
    }

    fn clear(&mut self, target: TextureId, color: PackedColor, bounds: Option<PixelBounds>) {
        let Some(tex) = self.textures.get(target) else {
            log::warn!("wgpu backend: clear of unknown texture");
            return;
        };
        let full = PixelBounds::new(0, 0, tex.width as i32, tex.height as i32);
        let area = bounds.map_or(full, |b| b.intersect(full));
        if area.is_empty() {
            return;
        }
        let px = color.to_rgba8();
        let data: Vec<u8> = std::iter::repeat_n(px, (area.width() * area.height()) as usize)
            .flatten()
            .collect();
        self.write_region(tex, area, &data);
    }

    fn read_pixel(&mut self, target: TextureId, x: i32, y: i32) -> Result<PackedColor> {
        let tex = self.textures.get(target).context("read_pixel: unknown texture")?;
        if x < 0 || y < 0 || x as u32 >= tex.width || y as u32 >= tex.height {
            bail!("read_pixel: ({x}, {y}) outside {}x{}", tex.width, tex.height);
        }

        let readback = self.readback.get_or_insert_with(|| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("strata readback"),
                size: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("strata readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: x as u32, y: y as u32, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below.
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .context("device poll failed during readback")?;
        rx.recv()
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;

        let px = {
            let data = slice.get_mapped_range();
            [data[0], data[1], data[2], data[3]]
        };
        readback.unmap();
        Ok(PackedColor::from_rgba8(px))
    }

    fn begin_flush(&mut self, target: &FlushTarget) {
        debug_assert!(self.recording.is_none(), "nested flush");
        self.recording = Some(FlushRecording {
            target: *target,
            scissor: None,
            clipped_out: false,
            modelview: Matrix::IDENTITY,
            pipeline: None,
            layout: None,
            uniforms: Vec::new(),
            draws: Vec::new(),
        });
    }

    fn flush_clip(&mut self, clip: Option<&ClipStack>) {
        let Some(rec) = self.recording.as_mut() else { return };
        match clip {
            None => {
                rec.scissor = None;
                rec.clipped_out = false;
            }
            Some(clip) => {
                if !self.warned_clip_bounds && !clip.is_scissor_representable() {
                    log::debug!("wgpu backend: non-rectangular clip approximated by its bounds");
                    self.warned_clip_bounds = true;
                }
                rec.scissor = Self::scissor_for(clip, &rec.target);
                rec.clipped_out = rec.scissor.is_none();
            }
        }
    }

    fn flush_modelview(&mut self, modelview: &Matrix) {
        if let Some(rec) = self.recording.as_mut() {
            rec.modelview = *modelview;
        }
    }

    fn flush_pipeline(&mut self, pipeline: &Pipeline, n_layers: usize) {
        if !self.warned_extra_layers && n_layers > 1 {
            log::debug!("wgpu backend: only texture layer 0 is sampled");
            self.warned_extra_layers = true;
        }
        if !self.warned_user_program && pipeline.user_program().is_some() {
            log::debug!("wgpu backend: user programs are ignored");
            self.warned_user_program = true;
        }
        let Some(rec) = self.recording.as_mut() else { return };

        let layer = pipeline.layer(0).filter(|_| n_layers > 0);
        let binding = BindingKey {
            texture: layer.map(|l| l.texture),
            sampler: SamplerKey {
                filter: layer.map_or(Filter::Nearest, |l| l.filter),
                wrap: layer.map_or(Wrap::ClampToEdge, |l| l.wrap),
            },
        };
        let tex_matrix = layer.map_or(Matrix::IDENTITY, |l| l.matrix);
        rec.pipeline = Some((pipeline.blend(), binding, tex_matrix));
    }

    fn bind_vertices(&mut self, layout: &VertexLayout) {
        if let Some(rec) = self.recording.as_mut() {
            rec.layout = Some(*layout);
        }
    }

    fn draw(&mut self, call: DrawCall) {
        let DrawCall::IndexedTriangles { indices, base_vertex, first_index, index_count } = call else {
            if !self.warned_primitive {
                log::warn!("wgpu backend: only indexed triangles are supported, dropping {call:?}");
                self.warned_primitive = true;
            }
            return;
        };
        let Some(rec) = self.recording.as_mut() else { return };
        if rec.clipped_out {
            return;
        }
        let (Some(layout), Some((blend, binding, tex_matrix))) = (rec.layout, rec.pipeline) else {
            log::warn!("wgpu backend: draw without bound vertices or pipeline");
            return;
        };

        let uniforms = Uniforms {
            mvp: rec.target.projection.multiply(&rec.modelview).to_cols_array(),
            tex_matrix: tex_matrix.to_cols_array(),
        };
        let reuse = rec
            .uniforms
            .last()
            .is_some_and(|u| bytemuck::bytes_of(u) == bytemuck::bytes_of(&uniforms));
        if !reuse {
            rec.uniforms.push(uniforms);
        }

        rec.draws.push(PendingDraw {
            pipeline: PipelineKey {
                position_components: layout.position_components,
                stride: layout.stride as u64,
                blend,
            },
            binding,
            uniform: rec.uniforms.len() - 1,
            scissor: rec.scissor,
            vertices: layout.buffer,
            vertex_offset: layout.offset as u64,
            indices,
            first_index,
            index_count,
            base_vertex: base_vertex as i32,
        });
    }

    fn end_flush(&mut self) {
        let Some(rec) = self.recording.take() else { return };
        if rec.draws.is_empty() {
            return;
        }
        log::trace!("wgpu backend: encoding {} draws", rec.draws.len());
        self.encode(rec);
    }
}

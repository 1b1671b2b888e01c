// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-frame GPU resources and draw submission.
//!
//! Each item gets vertex/index buffers, an uploaded texture, and one small
//! uniform buffer per in-flight frame and eye so a frame still on the GPU
//! never sees the next frame's material state.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use wgpu::util::DeviceExt;

use crate::errors::Result;
use crate::gpu::context::GpuContext;
use crate::visual::item::{Eye, Item, ItemUniform};
use crate::visual::items::Items;
use crate::visual::observer::{Observer, ViewMode};
use crate::visual::Color;

/// Bounded CPU/GPU overlap: the CPU may run at most this many frames ahead.
pub(crate) const FRAMES_IN_FLIGHT: usize = 2;
const EYE_PASSES: usize = 2;

/// GPU residence for one item.
struct ItemBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    /// Identity of the model the buffers were built from.
    model_ptr: usize,
    texture: wgpu::Texture,
    texture_ptr: usize,
    texture_revision: u64,
    /// Indexed `frame_in_flight * EYE_PASSES + eye`.
    uniforms: Vec<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,
}

#[derive(Clone, Copy)]
struct DrawCall {
    key: usize,
    binding: usize,
}

pub struct Renderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    buffers: HashMap<usize, ItemBuffers>,
    in_flight: VecDeque<wgpu::SubmissionIndex>,
    frame_in_flight: usize,
}

impl Renderer {
    pub fn new(gpu: &GpuContext, surface_format: wgpu::TextureFormat) -> Renderer {
        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("item shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/item.wgsl").into()),
            });

        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("item bind group layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(
                                    std::mem::size_of::<ItemUniform>() as u64,
                                ),
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

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("item pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("item pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[crate::visual::model::Vertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // meshes are two-sided by index expansion, items are
                    // drawn back to front in collection order
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("item sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Renderer {
            pipeline,
            bind_group_layout,
            sampler,
            buffers: HashMap::new(),
            in_flight: VecDeque::new(),
            frame_in_flight: 0,
        }
    }

    /// Renders one frame into `target` and submits it, pacing the CPU
    /// against the in-flight frame budget.
    #[allow(clippy::too_many_arguments)]
    pub fn render_frame(
        &mut self,
        gpu: &GpuContext,
        target: &wgpu::TextureView,
        target_size: (u32, u32),
        items: &Items,
        observer: &Observer,
        t: f64,
        slot: u32,
        background: Color,
    ) -> Result<()> {
        let eyes: &[Eye] = match observer.mode() {
            ViewMode::Mono => &[Eye::Both],
            ViewMode::Stereo => &[Eye::Left, Eye::Right],
        };

        // phase 1: refresh GPU residence and stage this frame's uniforms
        let mut draws: Vec<Vec<DrawCall>> = vec![Vec::new(); eyes.len()];
        let mut live = Vec::with_capacity(items.len());
        for handle in items.iter() {
            let item = handle.borrow();
            let key = Rc::as_ptr(handle) as usize;
            live.push(key);
            self.ensure_buffers(gpu, key, &item);
            for (pass, &eye) in eyes.iter().enumerate() {
                if !item.renders_in(eye, slot, observer.mode()) {
                    continue;
                }
                let uniform = item.material(t, &observer.view_proj(eye));
                let binding = self.frame_in_flight * EYE_PASSES + pass;
                let entry = &self.buffers[&key];
                gpu.queue
                    .write_buffer(&entry.uniforms[binding], 0, bytemuck::bytes_of(&uniform));
                draws[pass].push(DrawCall { key, binding });
            }
        }
        self.buffers.retain(|key, _| live.contains(key));

        // phase 2: record and submit
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("item pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(background.into()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            let (w, h) = (target_size.0 as f32, target_size.1 as f32);
            for (pass_index, calls) in draws.iter().enumerate() {
                match observer.mode() {
                    ViewMode::Mono => pass.set_viewport(0.0, 0.0, w, h, 0.0, 1.0),
                    ViewMode::Stereo => {
                        let half = w / 2.0;
                        pass.set_viewport(pass_index as f32 * half, 0.0, half, h, 0.0, 1.0);
                    }
                }
                for call in calls {
                    let entry = &self.buffers[&call.key];
                    pass.set_bind_group(0, &entry.bind_groups[call.binding], &[]);
                    pass.set_vertex_buffer(0, entry.vertex_buffer.slice(..));
                    pass.set_index_buffer(entry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..entry.index_count, 0, 0..1);
                }
            }
        }

        let submission = gpu.queue.submit(Some(encoder.finish()));
        self.in_flight.push_back(submission);
        self.frame_in_flight = (self.frame_in_flight + 1) % FRAMES_IN_FLIGHT;

        // pace: block until the oldest frame beyond the budget has retired
        while self.in_flight.len() > FRAMES_IN_FLIGHT {
            if let Some(oldest) = self.in_flight.pop_front() {
                let _ = gpu
                    .device
                    .poll(wgpu::Maintain::WaitForSubmissionIndex(oldest));
            }
        }
        Ok(())
    }

    /// Waits for every outstanding submission. Run before tearing down
    /// resources in-flight work may reference.
    pub fn drain(&mut self, gpu: &GpuContext) {
        while let Some(submission) = self.in_flight.pop_front() {
            let _ = gpu
                .device
                .poll(wgpu::Maintain::WaitForSubmissionIndex(submission));
        }
    }

    pub fn has_work_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Creates or refreshes the GPU residence of one item: geometry when the
    /// model was swapped, texture when it was swapped or recolored.
    fn ensure_buffers(&mut self, gpu: &GpuContext, key: usize, item: &Item) {
        let model_ptr = Rc::as_ptr(item.model()) as usize;
        let texture_ptr = Rc::as_ptr(item.texture()) as usize;
        let texture_revision = item.texture().borrow().revision();

        let rebuild_all = !self.buffers.contains_key(&key);
        let rebuild_geometry =
            rebuild_all || self.buffers[&key].model_ptr != model_ptr;
        let rebuild_texture = rebuild_all
            || self.buffers[&key].texture_ptr != texture_ptr
            || self.buffers[&key].texture_revision != texture_revision;

        if !rebuild_geometry && !rebuild_texture {
            return;
        }

        if rebuild_all {
            let model = item.model();
            let vertex_buffer = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("item vertices"),
                    contents: bytemuck::cast_slice(model.vertices()),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let index_buffer = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("item indices"),
                    contents: bytemuck::cast_slice(model.indices()),
                    usage: wgpu::BufferUsages::INDEX,
                });
            let texture = upload_texture(gpu, &item.texture().borrow());
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let mut uniforms = Vec::new();
            let mut bind_groups = Vec::new();
            for _ in 0..FRAMES_IN_FLIGHT * EYE_PASSES {
                let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("item uniform"),
                    size: std::mem::size_of::<ItemUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                bind_groups.push(self.bind_group(gpu, &buffer, &view));
                uniforms.push(buffer);
            }
            self.buffers.insert(
                key,
                ItemBuffers {
                    vertex_buffer,
                    index_buffer,
                    index_count: model.indices().len() as u32,
                    model_ptr,
                    texture,
                    texture_ptr,
                    texture_revision,
                    uniforms,
                    bind_groups,
                },
            );
            return;
        }

        if rebuild_geometry {
            let model = item.model();
            let entry = self.buffers.get_mut(&key).unwrap();
            entry.vertex_buffer = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("item vertices"),
                    contents: bytemuck::cast_slice(model.vertices()),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            entry.index_buffer = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("item indices"),
                    contents: bytemuck::cast_slice(model.indices()),
                    usage: wgpu::BufferUsages::INDEX,
                });
            entry.index_count = model.indices().len() as u32;
            entry.model_ptr = model_ptr;
        }

        if rebuild_texture {
            let source = item.texture().borrow();
            let texture = upload_texture(gpu, &source);
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let entry = self.buffers.get_mut(&key).unwrap();
            let bind_groups: Vec<wgpu::BindGroup> = entry
                .uniforms
                .iter()
                .map(|buffer| build_bind_group(&self.bind_group_layout, &self.sampler, gpu, buffer, &view))
                .collect();
            entry.bind_groups = bind_groups;
            entry.texture = texture;
            entry.texture_ptr = texture_ptr;
            entry.texture_revision = texture_revision;
        }
    }

    fn bind_group(
        &self,
        gpu: &GpuContext,
        uniform: &wgpu::Buffer,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        build_bind_group(&self.bind_group_layout, &self.sampler, gpu, uniform, view)
    }
}

fn build_bind_group(
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    gpu: &GpuContext,
    uniform: &wgpu::Buffer,
    view: &wgpu::TextureView,
) -> wgpu::BindGroup {
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("item bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
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
    })
}

/// Uploads a CPU texture with its full mip chain as Rgba8Unorm.
fn upload_texture(gpu: &GpuContext, source: &crate::visual::Texture) -> wgpu::Texture {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("item texture"),
        size: wgpu::Extent3d {
            width: source.width(),
            height: source.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: source.mip_levels(),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (level, (width, height, data)) in source.mip_chain_rgba8().into_iter().enumerate() {
        gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
    texture
}

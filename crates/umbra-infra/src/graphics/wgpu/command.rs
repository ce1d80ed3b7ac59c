// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command encoding for the wgpu device.
//!
//! Dispatches are encoded immediately. Render passes are recorded first and
//! encoded when the pass is dropped, once every pipeline and bind group they
//! need has been resolved.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use umbra_core::renderer::{
    BindingKind, BufferId, BuiltinBuffer, BuiltinTexture, CommandBufferId, CommandEncoder,
    CullDispatch, CullTest, DepthCopyDispatch, GpuMesh, InstanceCount, InstanceView,
    MipReduceDispatch, ProgramReflection, QueryId, ReflectedBinding, RenderPass,
    RenderPassDescriptor, TextureId, UniformBlockSlot, MAX_COLOR_TARGETS,
};
use wgpu::util::DeviceExt;

use super::conversions::IntoWgpu;
use super::device::{RenderPipelineKey, WgpuDevice, CULL_ARGS_SIZE};
use crate::graphics::pass::{PassOp, PassSink, RecordedPass, RecordingPass};

const CULL_WORKGROUP_SIZE: u32 = 64;
const PYRAMID_TILE_SIZE: u32 = 8;

/// Per-dispatch parameters of the culling programs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CullParams {
    planes: [[f32; 4]; 6],
    view_projection: [[f32; 4]; 4],
    bounds: [f32; 4],
    viewport: [f32; 2],
    mip_count: u32,
    output_capacity: u32,
}

impl CullParams {
    fn new(dispatch: &CullDispatch) -> Self {
        let center = dispatch.bounds.center;
        let mut params = Self {
            planes: [[0.0; 4]; 6],
            view_projection: [[0.0; 4]; 4],
            bounds: [center.x, center.y, center.z, dispatch.bounds.radius],
            viewport: [0.0; 2],
            mip_count: 0,
            output_capacity: dispatch.output_capacity,
        };
        match dispatch.test {
            CullTest::Frustum { frustum } => {
                for (dst, plane) in params.planes.iter_mut().zip(frustum.planes.iter()) {
                    *dst = plane.coefficients.to_array();
                }
            }
            CullTest::HiZ {
                view_projection,
                mip_count,
                viewport,
                ..
            } => {
                params.view_projection = view_projection.to_cols_array_2d();
                params.viewport = [viewport.width as f32, viewport.height as f32];
                params.mip_count = mip_count.max(1);
            }
        }
        params
    }
}

enum BoundResource {
    Buffer(Arc<wgpu::Buffer>),
    View(Arc<wgpu::TextureView>),
    Sampler(Arc<wgpu::Sampler>),
}

fn fallback_resource(device: &WgpuDevice, kind: BindingKind) -> BoundResource {
    let fallbacks = device.fallbacks();
    match kind {
        BindingKind::Uniform => BoundResource::Buffer(Arc::clone(&fallbacks.uniform)),
        BindingKind::Storage { .. } => BoundResource::Buffer(Arc::clone(&fallbacks.storage)),
        BindingKind::Texture { depth: true } => {
            BoundResource::View(Arc::clone(&fallbacks.depth_view))
        }
        BindingKind::Texture { depth: false } => {
            BoundResource::View(Arc::clone(&fallbacks.float_view))
        }
        BindingKind::StorageTexture { .. } => {
            BoundResource::View(Arc::clone(&fallbacks.storage_view))
        }
        BindingKind::Sampler => BoundResource::Sampler(Arc::clone(&fallbacks.sampler)),
    }
}

/// Builds one bind group per layout. Bindings `resolve` leaves unanswered get
/// a fallback resource of the right kind.
fn create_bind_groups(
    device: &WgpuDevice,
    label: &str,
    layouts: &[Arc<wgpu::BindGroupLayout>],
    reflection: &ProgramReflection,
    mut resolve: impl FnMut(&ReflectedBinding) -> Option<BoundResource>,
) -> Vec<wgpu::BindGroup> {
    let mut groups = Vec::with_capacity(layouts.len());
    for (group, layout) in layouts.iter().enumerate() {
        let resources: Vec<(u32, BoundResource)> = reflection
            .bindings
            .iter()
            .filter(|b| b.location.group == group as u32)
            .map(|b| {
                let resource = resolve(b).unwrap_or_else(|| {
                    log::trace!("{label}: '{}' is unbound, using a fallback", b.name);
                    fallback_resource(device, b.kind)
                });
                (b.location.binding, resource)
            })
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = resources
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    BoundResource::Buffer(buffer) => buffer.as_entire_binding(),
                    BoundResource::View(view) => wgpu::BindingResource::TextureView(view.as_ref()),
                    BoundResource::Sampler(sampler) => {
                        wgpu::BindingResource::Sampler(sampler.as_ref())
                    }
                },
            })
            .collect();
        groups.push(
            device
                .wgpu_device()
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(label),
                    layout: layout.as_ref(),
                    entries: &entries,
                }),
        );
    }
    groups
}

fn encode_dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_groups: &[wgpu::BindGroup],
    workgroups: [u32; 2],
) {
    if workgroups[0] == 0 || workgroups[1] == 0 {
        return;
    }
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    for (index, group) in bind_groups.iter().enumerate() {
        pass.set_bind_group(index as u32, group, &[]);
    }
    pass.dispatch_workgroups(workgroups[0], workgroups[1], 1);
}

fn upload_words(device: &WgpuDevice, label: &str, words: &[u32], usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device
        .wgpu_device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(words),
            usage,
        })
}

enum DrawCount {
    Fixed(u32),
    Indirect(Arc<wgpu::Buffer>),
}

enum DrawGeometry {
    Fullscreen,
    Mesh {
        vertices: Arc<wgpu::Buffer>,
        indices: Option<Arc<wgpu::Buffer>>,
        instances: Arc<wgpu::Buffer>,
        elements: u32,
        count: DrawCount,
    },
}

/// A draw with everything it binds already resolved.
struct PreparedDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_groups: Vec<wgpu::BindGroup>,
    geometry: DrawGeometry,
}

/// Resources bound by name so far in a pass.
#[derive(Default)]
struct PassBindings {
    uniforms: HashMap<UniformBlockSlot, BufferId>,
    buffers: HashMap<BuiltinBuffer, BufferId>,
    textures: HashMap<BuiltinTexture, TextureId>,
}

impl PassBindings {
    fn resolve(&self, device: &WgpuDevice, binding: &ReflectedBinding) -> Option<BoundResource> {
        let name = binding.name.as_str();
        match binding.kind {
            BindingKind::Uniform => {
                let slot = UniformBlockSlot::ALL.into_iter().find(|s| s.name() == name)?;
                let id = self.uniforms.get(&slot)?;
                device.get_wgpu_buffer(*id).map(BoundResource::Buffer)
            }
            BindingKind::Storage { .. } => {
                let buffer = BuiltinBuffer::ALL.into_iter().find(|b| b.name() == name)?;
                let id = self.buffers.get(&buffer)?;
                device.get_wgpu_buffer(*id).map(BoundResource::Buffer)
            }
            BindingKind::Texture { .. } => {
                let texture = BuiltinTexture::ALL.into_iter().find(|t| t.name() == name)?;
                let id = self.textures.get(&texture)?;
                device
                    .get_texture(*id)
                    .map(|t| BoundResource::View(Arc::new(t.full_view())))
            }
            BindingKind::StorageTexture { .. } | BindingKind::Sampler => None,
        }
    }
}

/// Encodes commands into a `wgpu::CommandEncoder`.
pub struct WgpuCommandEncoder {
    encoder: Option<wgpu::CommandEncoder>,
    device: WgpuDevice,
    readbacks: Vec<QueryId>,
}

impl WgpuCommandEncoder {
    pub(crate) fn new(encoder: wgpu::CommandEncoder, device: WgpuDevice) -> Self {
        Self {
            encoder: Some(encoder),
            device,
            readbacks: Vec::new(),
        }
    }

    fn prepare_mesh(
        &self,
        mesh: &GpuMesh,
        instances: &InstanceView,
        count: InstanceCount,
    ) -> Option<DrawGeometry> {
        let count = match count {
            InstanceCount::Fixed(0) => return None,
            InstanceCount::Fixed(n) => DrawCount::Fixed(n),
            InstanceCount::Query(query) => DrawCount::Indirect(self.device.get_query_args(query)?),
        };
        let indices = match mesh.index_buffer {
            Some(id) => Some(self.device.get_wgpu_buffer(id)?),
            None => None,
        };
        Some(DrawGeometry::Mesh {
            vertices: self.device.get_wgpu_buffer(mesh.vertex_buffer)?,
            indices,
            instances: self.device.get_wgpu_buffer(instances.buffer)?,
            elements: mesh.element_count,
            count,
        })
    }

    fn encode_render_pass(&mut self, pass: RecordedPass) {
        let device = self.device.clone();
        let label = pass.label.as_deref().unwrap_or("Render Pass");

        let mut color_formats = [None; MAX_COLOR_TARGETS];
        let mut color_views = Vec::with_capacity(pass.colors.len());
        for (index, attachment) in pass.colors.iter().enumerate() {
            let Some(texture) = device.get_texture(attachment.texture) else {
                log::warn!("{label}: color attachment {:?} not found.", attachment.texture);
                return;
            };
            if let Some(slot) = color_formats.get_mut(index) {
                *slot = Some(texture.format);
            }
            color_views.push((texture.level_view(0), attachment.load));
        }
        let depth_target = match pass.depth {
            Some(attachment) => match device.get_texture(attachment.texture) {
                Some(texture) => Some((texture.format, texture.level_view(0), attachment.load)),
                None => {
                    log::warn!("{label}: depth attachment {:?} not found.", attachment.texture);
                    return;
                }
            },
            None => None,
        };

        let mut state = device.pipeline_state();
        let mut program = None;
        let mut bindings = PassBindings::default();
        let mut draws = Vec::new();
        for op in pass.ops {
            let geometry = match op {
                PassOp::SetProgram(id) => {
                    program = Some(id);
                    continue;
                }
                PassOp::SetBlend(target, blend) => {
                    match state.blend.get_mut(target) {
                        Some(slot) => *slot = blend,
                        None => log::warn!("{label}: blend target {target} out of range."),
                    }
                    continue;
                }
                PassOp::SetDepth(depth) => {
                    state.depth = depth;
                    continue;
                }
                PassOp::BindUniform(slot, id) => {
                    bindings.uniforms.insert(slot, id);
                    continue;
                }
                PassOp::BindBuffer(buffer, id) => {
                    bindings.buffers.insert(buffer, id);
                    continue;
                }
                PassOp::BindTexture(texture, id) => {
                    bindings.textures.insert(texture, id);
                    continue;
                }
                PassOp::Draw {
                    mesh,
                    instances,
                    count,
                } => match self.prepare_mesh(&mesh, &instances, count) {
                    Some(geometry) => geometry,
                    None => continue,
                },
                PassOp::DrawFullscreen => DrawGeometry::Fullscreen,
            };

            let Some(program_id) = program else {
                log::warn!("{label}: draw recorded without a program.");
                continue;
            };
            let key = RenderPipelineKey {
                colors: color_formats,
                depth: depth_target.as_ref().map(|(format, _, _)| *format),
                state,
                mesh_input: matches!(geometry, DrawGeometry::Mesh { .. }),
            };
            let Some(binding) = device.render_program(program_id, key) else {
                log::warn!("{label}: program {program_id:?} not found.");
                continue;
            };
            let bind_groups = create_bind_groups(
                &device,
                label,
                &binding.bind_group_layouts,
                &binding.reflection,
                |b| bindings.resolve(&device, b),
            );
            draws.push(PreparedDraw {
                pipeline: binding.pipeline,
                bind_groups,
                geometry,
            });
        }
        device.set_pipeline_state(state);

        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_views
            .iter()
            .map(|(view, load)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: (*load).into_wgpu(),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let depth_stencil_attachment =
            depth_target
                .as_ref()
                .map(|(_, view, load)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: (*load).into_wgpu(),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        for draw in &draws {
            render_pass.set_pipeline(&draw.pipeline);
            for (index, group) in draw.bind_groups.iter().enumerate() {
                render_pass.set_bind_group(index as u32, group, &[]);
            }
            match &draw.geometry {
                DrawGeometry::Fullscreen => render_pass.draw(0..3, 0..1),
                DrawGeometry::Mesh {
                    vertices,
                    indices,
                    instances,
                    elements,
                    count,
                } => {
                    render_pass.set_vertex_buffer(0, vertices.slice(..));
                    render_pass.set_vertex_buffer(1, instances.slice(..));
                    match (indices, count) {
                        (Some(indices), DrawCount::Fixed(n)) => {
                            render_pass
                                .set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                            render_pass.draw_indexed(0..*elements, 0, 0..*n);
                        }
                        (Some(indices), DrawCount::Indirect(args)) => {
                            render_pass
                                .set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                            render_pass.draw_indexed_indirect(args, 0);
                        }
                        (None, DrawCount::Fixed(n)) => render_pass.draw(0..*elements, 0..*n),
                        (None, DrawCount::Indirect(args)) => render_pass.draw_indirect(args, 0),
                    }
                }
            }
        }
        log::trace!("{label}: encoded {} draws", draws.len());
    }
}

impl PassSink for WgpuCommandEncoder {
    fn end_pass(&mut self, pass: RecordedPass) {
        self.encode_render_pass(pass);
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn cull_instances(&mut self, dispatch: &CullDispatch) {
        let device = self.device.clone();
        let Some(program) = device.compute_program(dispatch.program) else {
            log::warn!("WgpuCommandEncoder: cull program {:?} not found.", dispatch.program);
            return;
        };
        let (Some(input), Some(output), Some(args)) = (
            device.get_wgpu_buffer(dispatch.input),
            device.get_wgpu_buffer(dispatch.output),
            device.get_query_args(dispatch.counter),
        ) else {
            log::warn!("WgpuCommandEncoder: cull dispatch references a missing resource.");
            return;
        };
        let (input_args, workgroups) = match dispatch.input_count {
            InstanceCount::Fixed(count) => (
                Arc::new(upload_words(
                    &device,
                    "Cull Input Count",
                    &[0, count, 0, 0, 0],
                    wgpu::BufferUsages::STORAGE,
                )),
                count.div_ceil(CULL_WORKGROUP_SIZE),
            ),
            InstanceCount::Query(query) => {
                let Some(args) = device.get_query_args(query) else {
                    log::warn!("WgpuCommandEncoder: input counter {query:?} not found.");
                    return;
                };
                (args, dispatch.output_capacity.div_ceil(CULL_WORKGROUP_SIZE))
            }
        };
        let pyramid = match dispatch.test {
            CullTest::HiZ { pyramid, .. } => match device.get_texture(pyramid) {
                Some(texture) => Some(Arc::new(texture.full_view())),
                None => {
                    log::warn!("WgpuCommandEncoder: depth pyramid {pyramid:?} not found.");
                    return;
                }
            },
            CullTest::Frustum { .. } => None,
        };
        let params = Arc::new(device.wgpu_device().create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Cull Params"),
                contents: bytemuck::bytes_of(&CullParams::new(dispatch)),
                usage: wgpu::BufferUsages::UNIFORM,
            },
        ));
        let reset = upload_words(
            &device,
            "Cull Args Reset",
            &[dispatch.element_count, 0, 0, 0, 0],
            wgpu::BufferUsages::COPY_SRC,
        );
        let bind_groups = create_bind_groups(
            &device,
            "Cull",
            &program.bind_group_layouts,
            &program.reflection,
            |b| match b.name.as_str() {
                "instances_in" => Some(BoundResource::Buffer(Arc::clone(&input))),
                "instances_out" => Some(BoundResource::Buffer(Arc::clone(&output))),
                "cull_args" => Some(BoundResource::Buffer(Arc::clone(&args))),
                "cull_params" => Some(BoundResource::Buffer(Arc::clone(&params))),
                "input_args" => Some(BoundResource::Buffer(Arc::clone(&input_args))),
                "hiz_pyramid" => pyramid.clone().map(BoundResource::View),
                _ => None,
            },
        );

        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        encoder.copy_buffer_to_buffer(&reset, 0, &args, 0, CULL_ARGS_SIZE);
        encode_dispatch(encoder, "Cull", &program.pipeline, &bind_groups, [workgroups, 1]);
        if device.record_readback(dispatch.counter, encoder) {
            self.readbacks.push(dispatch.counter);
        }
    }

    fn copy_depth_to_pyramid(&mut self, dispatch: &DepthCopyDispatch) {
        let device = self.device.clone();
        let (Some(program), Some(depth), Some(pyramid)) = (
            device.compute_program(dispatch.program),
            device.get_texture(dispatch.depth),
            device.get_texture(dispatch.pyramid),
        ) else {
            log::warn!("WgpuCommandEncoder: depth copy references a missing resource.");
            return;
        };
        let source = Arc::new(depth.full_view());
        let target = Arc::new(pyramid.level_view(0));
        let bind_groups = create_bind_groups(
            &device,
            "HiZ Copy",
            &program.bind_group_layouts,
            &program.reflection,
            |b| match b.name.as_str() {
                "depth_source" => Some(BoundResource::View(Arc::clone(&source))),
                "pyramid_out" => Some(BoundResource::View(Arc::clone(&target))),
                _ => None,
            },
        );
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        encode_dispatch(
            encoder,
            "HiZ Copy",
            &program.pipeline,
            &bind_groups,
            [
                pyramid.size.width.div_ceil(PYRAMID_TILE_SIZE),
                pyramid.size.height.div_ceil(PYRAMID_TILE_SIZE),
            ],
        );
    }

    fn reduce_pyramid_level(&mut self, dispatch: &MipReduceDispatch) {
        if dispatch.target_level == 0 {
            log::warn!("WgpuCommandEncoder: level 0 has no level above it to reduce.");
            return;
        }
        let device = self.device.clone();
        let (Some(program), Some(pyramid)) = (
            device.compute_program(dispatch.program),
            device.get_texture(dispatch.pyramid),
        ) else {
            log::warn!("WgpuCommandEncoder: pyramid reduction references a missing resource.");
            return;
        };
        let source = Arc::new(pyramid.level_view(dispatch.target_level - 1));
        let target = Arc::new(pyramid.level_view(dispatch.target_level));
        let bind_groups = create_bind_groups(
            &device,
            "HiZ Reduce",
            &program.bind_group_layouts,
            &program.reflection,
            |b| match b.name.as_str() {
                "pyramid_in" => Some(BoundResource::View(Arc::clone(&source))),
                "pyramid_out" => Some(BoundResource::View(Arc::clone(&target))),
                _ => None,
            },
        );
        let size = pyramid.size.mip_level_size(dispatch.target_level);
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        encode_dispatch(
            encoder,
            "HiZ Reduce",
            &program.pipeline,
            &bind_groups,
            [
                size.width.div_ceil(PYRAMID_TILE_SIZE),
                size.height.div_ceil(PYRAMID_TILE_SIZE),
            ],
        );
    }

    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        Box::new(RecordingPass::new(descriptor, self))
    }

    fn finish(mut self: Box<Self>) -> CommandBufferId {
        let readbacks = std::mem::take(&mut self.readbacks);
        match self.encoder.take() {
            Some(encoder) => self.device.register_command_buffer(encoder.finish(), readbacks),
            None => {
                log::error!("WgpuCommandEncoder: finish called twice.");
                CommandBufferId(usize::MAX)
            }
        }
    }
}

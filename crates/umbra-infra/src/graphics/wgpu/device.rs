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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use umbra_core::renderer::{
    AdapterInfo, BindingKind, BufferDescriptor, BufferId, CommandBufferId, CommandEncoder,
    CompiledProgram, Extent2D, GraphicsDevice, InstanceData, PipelineState, ProgramId,
    ProgramReflection, ProgramSource, ProgramStage, QueryId, QueryResult, ResourceError,
    ShaderError, TextureDescriptor, TextureFormat, TextureId, MAX_COLOR_TARGETS,
};

use super::command::WgpuCommandEncoder;
use super::context::WgpuContext;
use super::conversions::{binding_type, depth_stencil_state, IntoWgpu};

/// Size of the indirect arguments a counter query owns.
pub(crate) const CULL_ARGS_SIZE: u64 = 20;
const FALLBACK_BUFFER_SIZE: u64 = 1024;

const MAP_PENDING: u8 = 0;
const MAP_DONE: u8 = 1;
const MAP_FAILED: u8 = 2;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4,
    7 => Uint32
];
const MESH_VERTEX_STRIDE: u64 = 32;

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
    pub(crate) size: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct WgpuTextureEntry {
    pub(crate) wgpu_texture: Arc<wgpu::Texture>,
    pub(crate) format: TextureFormat,
    pub(crate) size: Extent2D,
}

impl WgpuTextureEntry {
    /// A view over every level.
    pub(crate) fn full_view(&self) -> wgpu::TextureView {
        self.wgpu_texture
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// A view over a single level.
    pub(crate) fn level_view(&self, level: u32) -> wgpu::TextureView {
        self.wgpu_texture.create_view(&wgpu::TextureViewDescriptor {
            base_mip_level: level,
            mip_level_count: Some(1),
            ..Default::default()
        })
    }
}

/// Everything a pipeline needs besides the program itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RenderPipelineKey {
    pub(crate) colors: [Option<TextureFormat>; MAX_COLOR_TARGETS],
    pub(crate) depth: Option<TextureFormat>,
    pub(crate) state: PipelineState,
    pub(crate) mesh_input: bool,
}

#[derive(Debug)]
pub(crate) struct WgpuProgramEntry {
    label: String,
    module: Arc<wgpu::ShaderModule>,
    reflection: ProgramReflection,
    bind_group_layouts: Vec<Arc<wgpu::BindGroupLayout>>,
    pipeline_layout: Arc<wgpu::PipelineLayout>,
    compute_pipeline: Option<Arc<wgpu::ComputePipeline>>,
    render_pipelines: HashMap<RenderPipelineKey, Arc<wgpu::RenderPipeline>>,
}

/// What the encoder needs to bind a program.
#[derive(Debug, Clone)]
pub(crate) struct ProgramBinding<P> {
    pub(crate) pipeline: Arc<P>,
    pub(crate) bind_group_layouts: Vec<Arc<wgpu::BindGroupLayout>>,
    pub(crate) reflection: ProgramReflection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readback {
    Idle,
    Recorded,
    Mapping,
}

#[derive(Debug)]
pub(crate) struct WgpuQueryEntry {
    args: Arc<wgpu::Buffer>,
    staging: Arc<wgpu::Buffer>,
    map_state: Arc<AtomicU8>,
    readback: Readback,
    last: QueryResult,
}

/// Resources bound in place of anything a program declares but a pass
/// never bound.
#[derive(Debug)]
pub(crate) struct Fallbacks {
    pub(crate) uniform: Arc<wgpu::Buffer>,
    pub(crate) storage: Arc<wgpu::Buffer>,
    pub(crate) float_view: Arc<wgpu::TextureView>,
    pub(crate) depth_view: Arc<wgpu::TextureView>,
    pub(crate) storage_view: Arc<wgpu::TextureView>,
    pub(crate) sampler: Arc<wgpu::Sampler>,
}

impl Fallbacks {
    fn new(device: &wgpu::Device) -> Self {
        let buffer = |label: &str, usage: wgpu::BufferUsages| {
            Arc::new(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: FALLBACK_BUFFER_SIZE,
                usage,
                mapped_at_creation: false,
            }))
        };
        let view = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            });
            Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()))
        };
        Self {
            uniform: buffer("Fallback Uniform", wgpu::BufferUsages::UNIFORM),
            storage: buffer("Fallback Storage", wgpu::BufferUsages::STORAGE),
            float_view: view(
                "Fallback Texture",
                wgpu::TextureFormat::R32Float,
                wgpu::TextureUsages::TEXTURE_BINDING,
            ),
            depth_view: view(
                "Fallback Depth",
                wgpu::TextureFormat::Depth32Float,
                wgpu::TextureUsages::TEXTURE_BINDING,
            ),
            storage_view: view(
                "Fallback Storage Texture",
                wgpu::TextureFormat::R32Float,
                wgpu::TextureUsages::STORAGE_BINDING,
            ),
            sampler: Arc::new(device.create_sampler(&wgpu::SamplerDescriptor::default())),
        }
    }
}

/// A finished command buffer and the counters it copies out for readback.
#[derive(Debug)]
struct PendingCommandBuffer {
    buffer: wgpu::CommandBuffer,
    readbacks: Vec<QueryId>,
}

/// The internal, non-clonable state of the WgpuDevice.
/// This struct holds all the GPU resources and state, protected by an Arc.
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    context: WgpuContext,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    programs: Mutex<HashMap<ProgramId, WgpuProgramEntry>>,
    queries: Mutex<HashMap<QueryId, WgpuQueryEntry>>,
    fallbacks: Fallbacks,
    /// Blend and depth state carried from one pass to the next.
    pipeline_state: Mutex<PipelineState>,

    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_program_id: AtomicUsize,
    next_query_id: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, PendingCommandBuffer>>,
    /// A thread-safe counter to generate unique command buffer IDs.
    command_buffer_id_counter: AtomicUsize,
}

/// A clonable, thread-safe handle to the WGPU graphics device.
/// It wraps the actual device state (`WgpuDeviceInternal`) in an Arc,
/// allowing it to be shared across threads and with command encoders.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WgpuDevice {
    /// Wraps an initialized context.
    pub fn new(context: WgpuContext) -> Self {
        let fallbacks = Fallbacks::new(&context.device);
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                programs: Mutex::new(HashMap::new()),
                queries: Mutex::new(HashMap::new()),
                fallbacks,
                pipeline_state: Mutex::new(PipelineState::default()),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                next_program_id: AtomicUsize::new(0),
                next_query_id: AtomicUsize::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicUsize::new(0),
            }),
        }
    }

    /// Opens a headless context on the best available adapter.
    pub fn new_headless() -> anyhow::Result<Self> {
        Ok(Self::new(WgpuContext::new_headless()?))
    }

    /// The context this device runs on.
    pub fn context(&self) -> &WgpuContext {
        &self.internal.context
    }

    pub(crate) fn wgpu_device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    pub(crate) fn fallbacks(&self) -> &Fallbacks {
        &self.internal.fallbacks
    }

    pub(crate) fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        lock(&self.internal.buffers)
            .get(&id)
            .map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    pub(crate) fn get_texture(&self, id: TextureId) -> Option<WgpuTextureEntry> {
        lock(&self.internal.textures).get(&id).cloned()
    }

    pub(crate) fn get_query_args(&self, id: QueryId) -> Option<Arc<wgpu::Buffer>> {
        lock(&self.internal.queries)
            .get(&id)
            .map(|entry| Arc::clone(&entry.args))
    }

    pub(crate) fn pipeline_state(&self) -> PipelineState {
        *lock(&self.internal.pipeline_state)
    }

    pub(crate) fn set_pipeline_state(&self, state: PipelineState) {
        *lock(&self.internal.pipeline_state) = state;
    }

    pub(crate) fn compute_program(
        &self,
        id: ProgramId,
    ) -> Option<ProgramBinding<wgpu::ComputePipeline>> {
        let programs = lock(&self.internal.programs);
        let entry = programs.get(&id)?;
        Some(ProgramBinding {
            pipeline: Arc::clone(entry.compute_pipeline.as_ref()?),
            bind_group_layouts: entry.bind_group_layouts.clone(),
            reflection: entry.reflection.clone(),
        })
    }

    /// Returns the render pipeline of `id` for `key`, building it on first use.
    pub(crate) fn render_program(
        &self,
        id: ProgramId,
        key: RenderPipelineKey,
    ) -> Option<ProgramBinding<wgpu::RenderPipeline>> {
        let mut programs = lock(&self.internal.programs);
        let entry = programs.get_mut(&id)?;
        if !entry.render_pipelines.contains_key(&key) {
            let pipeline = Arc::new(self.build_render_pipeline(entry, &key)?);
            entry.render_pipelines.insert(key, pipeline);
        }
        Some(ProgramBinding {
            pipeline: Arc::clone(entry.render_pipelines.get(&key)?),
            bind_group_layouts: entry.bind_group_layouts.clone(),
            reflection: entry.reflection.clone(),
        })
    }

    fn build_render_pipeline(
        &self,
        entry: &WgpuProgramEntry,
        key: &RenderPipelineKey,
    ) -> Option<wgpu::RenderPipeline> {
        let Some(vertex_entry) = entry.reflection.entry_point(ProgramStage::Vertex) else {
            log::warn!("WgpuDevice: program '{}' has no vertex entry point.", entry.label);
            return None;
        };
        let fragment_entry = entry.reflection.entry_point(ProgramStage::Fragment);

        let vertex_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: MESH_VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &MESH_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: InstanceData::SIZE,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &INSTANCE_ATTRIBUTES,
            },
        ];
        let buffers: &[wgpu::VertexBufferLayout] = if key.mesh_input {
            &vertex_buffers
        } else {
            &[]
        };
        let color_targets: Vec<Option<wgpu::ColorTargetState>> = key
            .colors
            .iter()
            .zip(key.state.blend.iter())
            .map_while(|(format, blend)| {
                format.map(|format| {
                    Some(wgpu::ColorTargetState {
                        format: format.into_wgpu(),
                        blend: blend.map(|b| b.into_wgpu()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })
                })
            })
            .collect();

        let descriptor = wgpu::RenderPipelineDescriptor {
            label: Some(entry.label.as_str()),
            layout: Some(&entry.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &entry.module,
                entry_point: Some(vertex_entry.name.as_str()),
                buffers,
                compilation_options: Default::default(),
            },
            fragment: fragment_entry.map(|fragment| wgpu::FragmentState {
                module: &entry.module,
                entry_point: Some(fragment.name.as_str()),
                targets: &color_targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: key
                .depth
                .map(|format| depth_stencil_state(format, key.state.depth)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        };
        log::debug!(
            "WgpuDevice: building render pipeline for '{}' ({} color targets)",
            entry.label,
            color_targets.len()
        );
        Some(self.wgpu_device().create_render_pipeline(&descriptor))
    }

    /// Copies the counter of `id` to its staging buffer if no readback is in flight.
    ///
    /// Returns `true` when a copy was recorded.
    pub(crate) fn record_readback(&self, id: QueryId, encoder: &mut wgpu::CommandEncoder) -> bool {
        let mut queries = lock(&self.internal.queries);
        let Some(entry) = queries.get_mut(&id) else {
            return false;
        };
        if entry.readback != Readback::Idle {
            return false;
        }
        encoder.copy_buffer_to_buffer(&entry.args, 0, &entry.staging, 0, CULL_ARGS_SIZE);
        entry.readback = Readback::Recorded;
        true
    }

    fn start_readbacks(&self, ids: &[QueryId]) {
        let mut queries = lock(&self.internal.queries);
        for id in ids {
            let Some(entry) = queries.get_mut(id) else {
                continue;
            };
            if entry.readback != Readback::Recorded {
                continue;
            }
            let flag = Arc::clone(&entry.map_state);
            flag.store(MAP_PENDING, Ordering::SeqCst);
            entry
                .staging
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |res| {
                    if let Err(e) = res {
                        log::error!("Counter readback map_async failed: {:?}", e);
                        flag.store(MAP_FAILED, Ordering::SeqCst);
                    } else {
                        flag.store(MAP_DONE, Ordering::SeqCst);
                    }
                });
            entry.readback = Readback::Mapping;
        }
    }

    /// Polls the underlying wgpu::Device in a blocking manner.
    /// Used at shutdown and by tests that need counters resolved.
    pub fn poll_device_blocking(&self) {
        if let Err(e) = self.wgpu_device().poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("Failed to poll device: {:?}", e);
        }
    }

    /// Polls the underlying wgpu::Device in a non-blocking manner.
    /// This is what delivers pending `map_async` callbacks for counter readbacks.
    pub fn poll_device_non_blocking(&self) {
        if let Err(e) = self.wgpu_device().poll(wgpu::PollType::Poll) {
            log::warn!("Failed to poll device (non-blocking): {:?}", e);
        }
    }

    /// (crate-internal) Registers a finished wgpu::CommandBuffer, storing it
    /// in a map and returning an abstract ID for it.
    pub(crate) fn register_command_buffer(
        &self,
        buffer: wgpu::CommandBuffer,
        readbacks: Vec<QueryId>,
    ) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        lock(&self.internal.pending_command_buffers)
            .insert(id, PendingCommandBuffer { buffer, readbacks });
        id
    }

    fn create_bind_group_layouts(
        &self,
        label: &str,
        reflection: &ProgramReflection,
    ) -> Vec<Arc<wgpu::BindGroupLayout>> {
        let compute = reflection.entry_point(ProgramStage::Compute).is_some();
        (0..reflection.group_count())
            .map(|group| {
                let mut entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
                    .bindings
                    .iter()
                    .filter(|b| b.location.group == group)
                    .map(|b| wgpu::BindGroupLayoutEntry {
                        binding: b.location.binding,
                        visibility: stage_visibility(compute, b.kind),
                        ty: binding_type(b.kind),
                        count: None,
                    })
                    .collect();
                entries.sort_by_key(|e| e.binding);
                let layout_label = format!("{label}_Group{group}");
                Arc::new(
                    self.wgpu_device()
                        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some(&layout_label),
                            entries: &entries,
                        }),
                )
            })
            .collect()
    }
}

fn stage_visibility(compute: bool, kind: BindingKind) -> wgpu::ShaderStages {
    if compute {
        return wgpu::ShaderStages::COMPUTE;
    }
    match kind {
        BindingKind::Storage { read_only: false } | BindingKind::StorageTexture { .. } => {
            wgpu::ShaderStages::FRAGMENT
        }
        _ => wgpu::ShaderStages::VERTEX_FRAGMENT,
    }
}

impl GraphicsDevice for WgpuDevice {
    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let wgpu_buffer = self.wgpu_device().create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: false,
        });
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers).insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(wgpu_buffer),
                size: descriptor.size,
            },
        );
        log::debug!(
            "WgpuDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffers = lock(&self.internal.buffers);
        let entry = buffers.get(&id).ok_or(ResourceError::InvalidHandle)?;
        let len = data.len() as u64;
        if offset.saturating_add(len) > entry.size {
            return Err(ResourceError::OutOfBounds {
                offset,
                len,
                size: entry.size,
            });
        }
        self.internal
            .context
            .queue
            .write_buffer(&entry.wgpu_buffer, offset, data);
        log::trace!("WgpuDevice: Wrote {len} bytes to buffer {id:?} at offset {offset}");
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match lock(&self.internal.buffers).remove(&id) {
            Some(_) => {
                log::debug!("WgpuDevice: Destroyed buffer with ID: {id:?}");
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    // --- Texture Operations ---

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(ResourceError::BackendError(format!(
                "texture '{}' has an empty extent",
                descriptor.label.as_deref().unwrap_or_default()
            )));
        }
        let texture = self.wgpu_device().create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size.into_wgpu(),
            mip_level_count: descriptor.mip_level_count.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage: descriptor.usage.into_wgpu(),
            view_formats: &[],
        });
        let id = TextureId(self.internal.next_texture_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.textures).insert(
            id,
            WgpuTextureEntry {
                wgpu_texture: Arc::new(texture),
                format: descriptor.format,
                size: descriptor.size,
            },
        );
        log::debug!(
            "WgpuDevice: Created texture '{}' ({}x{}, {} levels) with ID: {:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size.width,
            descriptor.size.height,
            descriptor.mip_level_count,
            id
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        match lock(&self.internal.textures).remove(&id) {
            Some(_) => Ok(()),
            None => Err(ResourceError::InvalidHandle),
        }
    }

    // --- Counter Queries ---

    fn create_counter_query(&self, label: Option<&str>) -> Result<QueryId, ResourceError> {
        let device = self.wgpu_device();
        let args = device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: CULL_ARGS_SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Counter Readback"),
            size: CULL_ARGS_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = QueryId(self.internal.next_query_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.queries).insert(
            id,
            WgpuQueryEntry {
                args: Arc::new(args),
                staging: Arc::new(staging),
                map_state: Arc::new(AtomicU8::new(MAP_PENDING)),
                readback: Readback::Idle,
                last: QueryResult::Pending,
            },
        );
        Ok(id)
    }

    fn query_result(&self, id: QueryId) -> QueryResult {
        self.poll_device_non_blocking();
        let mut queries = lock(&self.internal.queries);
        let Some(entry) = queries.get_mut(&id) else {
            return QueryResult::Pending;
        };
        if entry.readback == Readback::Mapping {
            match entry.map_state.load(Ordering::SeqCst) {
                MAP_DONE => {
                    let data = entry.staging.slice(..).get_mapped_range();
                    let words: [u32; 5] = bytemuck::pod_read_unaligned(&data[..]);
                    drop(data);
                    entry.staging.unmap();
                    entry.last = QueryResult::Ready(words[1]);
                    entry.readback = Readback::Idle;
                }
                MAP_FAILED => entry.readback = Readback::Idle,
                _ => {}
            }
        }
        entry.last
    }

    fn destroy_query(&self, id: QueryId) -> Result<(), ResourceError> {
        match lock(&self.internal.queries).remove(&id) {
            Some(_) => Ok(()),
            None => Err(ResourceError::InvalidHandle),
        }
    }

    // --- Programs ---

    fn compile_program(&self, source: &ProgramSource) -> Result<CompiledProgram, ShaderError> {
        let label = source.label.to_string();
        let code = source.expanded_code();
        let reflection = ProgramReflection::from_wgsl(&label, &code)?;

        let device = self.wgpu_device();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(code.as_ref().into()),
        });
        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(ShaderError::CompilationError {
                label,
                details: errors.join("\n"),
            });
        }

        let bind_group_layouts = self.create_bind_group_layouts(&label, &reflection);
        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> =
            bind_group_layouts.iter().map(|l| Some(l.as_ref())).collect();
        let pipeline_layout_label = format!("{label}_Layout");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&pipeline_layout_label),
            bind_group_layouts: &layout_refs,
            ..Default::default()
        });

        let compute_pipeline = reflection.entry_point(ProgramStage::Compute).map(|entry| {
            Arc::new(
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&label),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some(entry.name.as_str()),
                    compilation_options: Default::default(),
                    cache: None,
                }),
            )
        });

        let id = ProgramId(self.internal.next_program_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.programs).insert(
            id,
            WgpuProgramEntry {
                label: label.clone(),
                module: Arc::new(module),
                reflection: reflection.clone(),
                bind_group_layouts,
                pipeline_layout: Arc::new(pipeline_layout),
                compute_pipeline,
                render_pipelines: HashMap::new(),
            },
        );
        log::info!("WgpuDevice: Compiled program '{label}' with ID: {id:?}");
        Ok(CompiledProgram {
            id,
            label,
            reflection,
        })
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        match lock(&self.internal.programs).remove(&id) {
            Some(entry) => {
                log::debug!("WgpuDevice: Destroyed program '{}'", entry.label);
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    // --- Commands ---

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = self
            .wgpu_device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuCommandEncoder::new(encoder, self.clone()))
    }

    fn submit_command_buffer(&self, command_buffer_id: CommandBufferId) {
        let pending = lock(&self.internal.pending_command_buffers).remove(&command_buffer_id);
        match pending {
            Some(pending) => {
                self.internal
                    .context
                    .queue
                    .submit(std::iter::once(pending.buffer));
                self.start_readbacks(&pending.readbacks);
            }
            None => log::error!(
                "Attempted to submit a CommandBufferId ({:?}) that does not exist.",
                command_buffer_id
            ),
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: self.internal.context.adapter_name.clone(),
            backend: format!("{:?}", self.internal.context.adapter_backend),
        }
    }
}

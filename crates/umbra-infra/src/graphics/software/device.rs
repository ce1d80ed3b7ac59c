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

use super::encoder::{Command, SoftwareCommandEncoder};
use super::resources::{SoftBuffer, SoftTexture};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use umbra_core::renderer::{
    AdapterInfo, BufferDescriptor, BufferId, BuiltinTexture, CommandBufferId, CommandEncoder,
    CompiledProgram, Extent2D, GraphicsDevice, InstanceData, PipelineState, ProgramId,
    ProgramReflection, ProgramSource, QueryId, QueryResult, ResourceError, ShaderError,
    TextureDescriptor, TextureId,
};

/// One command the device has executed, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedCommand {
    /// A culling dispatch and the survivor count it resolved.
    Cull {
        /// The program the dispatch ran.
        program: ProgramId,
        /// The counter that received the count.
        counter: QueryId,
        /// Records read from the input.
        tested: u32,
        /// Records written to the output.
        survivors: u32,
    },
    /// A depth target copied into pyramid level 0.
    CopyDepth {
        /// The pyramid written.
        pyramid: TextureId,
    },
    /// One pyramid level max-reduced from the level above.
    ReduceMip {
        /// The pyramid written.
        pyramid: TextureId,
        /// The level written.
        level: u32,
    },
    /// A render pass.
    RenderPass {
        /// The pass label.
        label: Option<String>,
        /// Draws recorded in the pass, full-screen triangles included.
        draws: usize,
    },
}

/// One draw the device has executed.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Label of the pass it ran in.
    pub pass: Option<String>,
    /// The program bound at the time.
    pub program: Option<ProgramId>,
    /// The label of that program.
    pub program_label: Option<String>,
    /// Resolved instance count; `1` for full-screen draws.
    pub instances: u32,
    /// `true` for [`draw_fullscreen`](umbra_core::renderer::RenderPass::draw_fullscreen).
    pub fullscreen: bool,
    /// Blend and depth state in effect.
    pub state: PipelineState,
    /// Textures bound by name in the pass.
    pub textures: Vec<(BuiltinTexture, TextureId)>,
    /// Depth texels the draw wrote.
    pub depth_written: usize,
}

#[derive(Debug, Default)]
pub(crate) struct SoftwareState {
    pub(crate) buffers: HashMap<BufferId, SoftBuffer>,
    pub(crate) textures: HashMap<TextureId, SoftTexture>,
    pub(crate) queries: HashMap<QueryId, QueryResult>,
    pub(crate) programs: HashMap<ProgramId, CompiledProgram>,
    pub(crate) pending: HashMap<CommandBufferId, Vec<Command>>,
    /// Blend and depth state persists across passes, like a GL context.
    pub(crate) pipeline: PipelineState,
    pub(crate) command_log: Vec<SubmittedCommand>,
    pub(crate) draw_log: Vec<DrawRecord>,
    failing_programs: HashSet<String>,
    failing_buffers: HashSet<String>,
}

#[derive(Debug, Default)]
struct SoftwareDeviceInternal {
    state: Mutex<SoftwareState>,
    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_query_id: AtomicUsize,
    next_program_id: AtomicUsize,
    next_command_buffer_id: AtomicUsize,
}

/// A deterministic CPU implementation of [`GraphicsDevice`].
///
/// Commands run on `submit_command_buffer`, so counter queries resolve at
/// submit and a stage that submits before the next one reads them sees
/// fresh values. Culling, depth pyramid construction and depth-only
/// rasterization are emulated; color targets only change through clears.
///
/// Every executed command and draw is logged for inspection.
#[derive(Clone, Debug, Default)]
pub struct SoftwareDevice {
    internal: Arc<SoftwareDeviceInternal>,
}

impl SoftwareDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        log::info!("SoftwareDevice: created");
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SoftwareState> {
        self.internal
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_command_buffer(&self, commands: Vec<Command>) -> CommandBufferId {
        let id = CommandBufferId(Self::next_id(&self.internal.next_command_buffer_id));
        self.state().pending.insert(id, commands);
        id
    }

    /// Makes every later compilation of the program labelled `label` fail,
    /// or lifts that again.
    pub fn set_program_failure(&self, label: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_programs.insert(label.to_string());
        } else {
            state.failing_programs.remove(label);
        }
    }

    /// Makes every later creation of a buffer labelled `label` fail, or lifts
    /// that again.
    pub fn set_buffer_failure(&self, label: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_buffers.insert(label.to_string());
        } else {
            state.failing_buffers.remove(label);
        }
    }

    /// A copy of a buffer's contents.
    pub fn read_buffer(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id).map(|b| b.data.clone())
    }

    /// The first `count` instance records of a buffer.
    pub fn read_instances(&self, id: BufferId, count: usize) -> Vec<InstanceData> {
        let state = self.state();
        let Some(buffer) = state.buffers.get(&id) else {
            return Vec::new();
        };
        buffer
            .bytes(0, count * InstanceData::SIZE as usize)
            .chunks_exact(InstanceData::SIZE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// A copy of one texture level, `channel_count` floats per texel.
    pub fn read_texture(&self, id: TextureId, level: u32) -> Option<Vec<f32>> {
        self.state()
            .textures
            .get(&id)
            .and_then(|t| t.levels.get(level as usize).cloned())
    }

    /// Overwrites one texture level.
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidHandle`] for an unknown texture or level,
    /// [`ResourceError::OutOfBounds`] if `data` is not the level's exact size.
    pub fn write_texture(&self, id: TextureId, level: u32, data: &[f32]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let texture = state
            .textures
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        let target = texture
            .levels
            .get_mut(level as usize)
            .ok_or(ResourceError::InvalidHandle)?;
        if target.len() != data.len() {
            return Err(ResourceError::OutOfBounds {
                offset: 0,
                len: data.len() as u64 * 4,
                size: target.len() as u64 * 4,
            });
        }
        target.copy_from_slice(data);
        Ok(())
    }

    /// Size of level 0 of a texture.
    pub fn texture_size(&self, id: TextureId) -> Option<Extent2D> {
        self.state().textures.get(&id).map(|t| t.size)
    }

    /// The blend and depth state left by the last executed pass.
    pub fn pipeline_state(&self) -> PipelineState {
        self.state().pipeline
    }

    /// Every command executed since the last [`clear_logs`](Self::clear_logs).
    pub fn command_log(&self) -> Vec<SubmittedCommand> {
        self.state().command_log.clone()
    }

    /// Every draw executed since the last [`clear_logs`](Self::clear_logs).
    pub fn draw_log(&self) -> Vec<DrawRecord> {
        self.state().draw_log.clone()
    }

    /// Empties the command and draw logs.
    pub fn clear_logs(&self) {
        let mut state = self.state();
        state.command_log.clear();
        state.draw_log.clear();
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    /// Number of live counter queries.
    pub fn live_queries(&self) -> usize {
        self.state().queries.len()
    }

    /// Number of live programs.
    pub fn live_programs(&self) -> usize {
        self.state().programs.len()
    }

    /// Command buffers finished but not yet submitted.
    pub fn pending_command_buffers(&self) -> usize {
        self.state().pending.len()
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let size = usize::try_from(descriptor.size)
            .map_err(|_| ResourceError::BackendError("buffer too large".into()))?;
        let label = descriptor.label.as_deref().unwrap_or("buffer").to_string();
        if self.state().failing_buffers.contains(&label) {
            return Err(ResourceError::BackendError(format!(
                "allocation of buffer '{label}' failed"
            )));
        }
        let id = BufferId(Self::next_id(&self.internal.next_buffer_id));
        log::trace!("SoftwareDevice: created buffer '{label}' ({size} bytes) as {id:?}");
        self.state().buffers.insert(
            id,
            SoftBuffer {
                label,
                data: vec![0; size],
            },
        );
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        let size = buffer.data.len() as u64;
        let end = offset.checked_add(data.len() as u64);
        match end {
            Some(end) if end <= size => {
                buffer.data[offset as usize..end as usize].copy_from_slice(data);
                Ok(())
            }
            _ => Err(ResourceError::OutOfBounds {
                offset,
                len: data.len() as u64,
                size,
            }),
        }
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.state().buffers.remove(&id) {
            Some(buffer) => {
                log::trace!("SoftwareDevice: destroyed buffer '{}'", buffer.label);
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(ResourceError::BackendError(format!(
                "texture {:?} has a zero dimension",
                descriptor.label
            )));
        }
        let id = TextureId(Self::next_id(&self.internal.next_texture_id));
        let texture = SoftTexture::new(descriptor);
        log::trace!(
            "SoftwareDevice: created texture '{}' {}x{} ({} levels) as {id:?}",
            texture.label,
            texture.size.width,
            texture.size.height,
            texture.levels.len()
        );
        self.state().textures.insert(id, texture);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        match self.state().textures.remove(&id) {
            Some(texture) => {
                log::trace!("SoftwareDevice: destroyed texture '{}'", texture.label);
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    fn create_counter_query(&self, _label: Option<&str>) -> Result<QueryId, ResourceError> {
        let id = QueryId(Self::next_id(&self.internal.next_query_id));
        self.state().queries.insert(id, QueryResult::Pending);
        Ok(id)
    }

    fn query_result(&self, id: QueryId) -> QueryResult {
        self.state()
            .queries
            .get(&id)
            .copied()
            .unwrap_or(QueryResult::Pending)
    }

    fn destroy_query(&self, id: QueryId) -> Result<(), ResourceError> {
        self.state()
            .queries
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn compile_program(&self, source: &ProgramSource) -> Result<CompiledProgram, ShaderError> {
        let label = source.label.to_string();
        if self.state().failing_programs.contains(&label) {
            return Err(ShaderError::CompilationError {
                label,
                details: "compilation disabled for this program".into(),
            });
        }
        let reflection = ProgramReflection::from_wgsl(&label, &source.expanded_code())?;
        let program = CompiledProgram {
            id: ProgramId(Self::next_id(&self.internal.next_program_id)),
            label,
            reflection,
        };
        log::debug!(
            "SoftwareDevice: compiled program '{}' as {:?} ({} bindings)",
            program.label,
            program.id,
            program.reflection.bindings.len()
        );
        self.state().programs.insert(program.id, program.clone());
        Ok(program)
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        self.state()
            .programs
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::Shader(ShaderError::NotFound { id }))
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(SoftwareCommandEncoder {
            label: label.map(str::to_string),
            commands: Vec::new(),
            device: self.clone(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let mut state = self.state();
        let Some(commands) = state.pending.remove(&command_buffer) else {
            log::error!(
                "Attempted to submit a CommandBufferId ({command_buffer:?}) that does not exist."
            );
            return;
        };
        for command in commands {
            state.execute(command);
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Umbra Software Rasterizer".into(),
            backend: "Software".into(),
        }
    }
}

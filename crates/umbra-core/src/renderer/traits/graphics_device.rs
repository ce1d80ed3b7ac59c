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

use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// Describes the adapter a device runs on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    /// The adapter's name as reported by the driver.
    pub name: String,
    /// The backend API, e.g. `"Vulkan"` or `"Software"`.
    pub backend: String,
}

/// The main interface for creating and managing GPU resources.
///
/// Only the render thread calls methods that record or submit work. Resource
/// destruction requested elsewhere goes through a
/// [`DisposalQueue`](crate::renderer::api::DisposalQueue).
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - The buffer's label, size and usage.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer.
    /// ## Errors
    /// * `ResourceError` - If the backend cannot allocate the buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Writes data to a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The byte offset in the buffer where the data will be written.
    /// * `data` - The bytes to write.
    /// ## Errors
    /// * `ResourceError::InvalidHandle` - If the buffer does not exist.
    /// * `ResourceError::OutOfBounds` - If the write does not fit.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Creates a new GPU texture with all of its mip levels.
    /// ## Arguments
    /// * `descriptor` - The texture's size, level count, format and usage.
    /// ## Returns
    /// A `Result` containing the ID of the created texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a GPU texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a counter query that a culling dispatch can record a survivor
    /// count into.
    fn create_counter_query(&self, label: Option<&str>) -> Result<QueryId, ResourceError>;

    /// Returns the last resolved value of a counter query without blocking.
    ///
    /// A query whose value has not reached the CPU yet reports
    /// [`QueryResult::Pending`].
    fn query_result(&self, id: QueryId) -> QueryResult;

    /// Destroys a counter query.
    fn destroy_query(&self, id: QueryId) -> Result<(), ResourceError>;

    /// Compiles a program and reflects its bindings.
    /// ## Arguments
    /// * `source` - The program source and its macro definitions.
    /// ## Returns
    /// The compiled program with its reflection data.
    /// ## Errors
    /// * `ShaderError` - If the source does not compile or lacks an entry point.
    fn compile_program(&self, source: &ProgramSource) -> Result<CompiledProgram, ShaderError>;

    /// Destroys a compiled program and the pipelines derived from it.
    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    /// ## Arguments
    /// * `label` - An optional label for the command encoder.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a previously recorded command buffer to the GPU for execution.
    /// ## Arguments
    /// * `command_buffer` - The ID of the command buffer to submit.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);

    /// Get the adapter information of the device.
    fn adapter_info(&self) -> AdapterInfo;
}

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

//! Command recording for the software device.
//!
//! Nothing executes while recording. The encoder collects [`Command`]s and
//! hands them to the device on `finish`; the device runs them on submit.

use super::device::SoftwareDevice;
use crate::graphics::pass::{PassSink, RecordedPass, RecordingPass};
use umbra_core::renderer::{
    CommandBufferId, CommandEncoder, CullDispatch, DepthCopyDispatch, MipReduceDispatch,
    RenderPass, RenderPassDescriptor,
};

#[derive(Debug, Clone)]
pub(crate) enum Command {
    Cull(CullDispatch),
    CopyDepth(DepthCopyDispatch),
    ReduceMip(MipReduceDispatch),
    Render(RecordedPass),
}

impl PassSink for Vec<Command> {
    fn end_pass(&mut self, pass: RecordedPass) {
        self.push(Command::Render(pass));
    }
}

/// Records commands for later execution by a [`SoftwareDevice`].
pub struct SoftwareCommandEncoder {
    pub(crate) label: Option<String>,
    pub(crate) commands: Vec<Command>,
    pub(crate) device: SoftwareDevice,
}

impl SoftwareCommandEncoder {
    /// Number of commands recorded so far.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandEncoder for SoftwareCommandEncoder {
    fn cull_instances(&mut self, dispatch: &CullDispatch) {
        self.commands.push(Command::Cull(*dispatch));
    }

    fn copy_depth_to_pyramid(&mut self, dispatch: &DepthCopyDispatch) {
        self.commands.push(Command::CopyDepth(*dispatch));
    }

    fn reduce_pyramid_level(&mut self, dispatch: &MipReduceDispatch) {
        self.commands.push(Command::ReduceMip(*dispatch));
    }

    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        Box::new(RecordingPass::new(descriptor, &mut self.commands))
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let encoder = *self;
        log::trace!(
            "SoftwareCommandEncoder '{}': finished with {} commands",
            encoder.label.as_deref().unwrap_or("unlabelled"),
            encoder.commands.len()
        );
        encoder.device.register_command_buffer(encoder.commands)
    }
}

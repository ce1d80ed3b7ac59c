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

//! Render pass recording shared by both devices.
//!
//! A pass is captured as a list of [`PassOp`]s and handed to a [`PassSink`]
//! when the pass is dropped. What the sink does with it is backend-specific.

use umbra_core::renderer::{
    BlendState, BufferId, BuiltinBuffer, BuiltinTexture, ColorAttachment, DepthAttachment,
    DepthState, DrawInstanced, GpuMesh, InstanceCount, InstanceView, ProgramId, RenderPass,
    RenderPassDescriptor, TextureId, UniformBlockSlot,
};

#[derive(Debug, Clone)]
pub(crate) enum PassOp {
    SetProgram(ProgramId),
    SetBlend(usize, Option<BlendState>),
    SetDepth(DepthState),
    BindUniform(UniformBlockSlot, BufferId),
    BindBuffer(BuiltinBuffer, BufferId),
    BindTexture(BuiltinTexture, TextureId),
    Draw {
        mesh: GpuMesh,
        instances: InstanceView,
        count: InstanceCount,
    },
    DrawFullscreen,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordedPass {
    pub(crate) label: Option<String>,
    pub(crate) colors: Vec<ColorAttachment>,
    pub(crate) depth: Option<DepthAttachment>,
    pub(crate) ops: Vec<PassOp>,
}

impl RecordedPass {
    pub(crate) fn new(descriptor: &RenderPassDescriptor<'_>) -> Self {
        Self {
            label: descriptor.label.map(str::to_string),
            colors: descriptor.color_attachments.to_vec(),
            depth: descriptor.depth_attachment,
            ops: Vec::new(),
        }
    }
}

/// Receives a pass once recording ends.
pub(crate) trait PassSink {
    fn end_pass(&mut self, pass: RecordedPass);
}

/// A render pass being recorded. Dropping it hands the pass to its sink.
pub(crate) struct RecordingPass<'a, S: PassSink> {
    pass: RecordedPass,
    sink: &'a mut S,
}

impl<'a, S: PassSink> RecordingPass<'a, S> {
    pub(crate) fn new(descriptor: &RenderPassDescriptor<'_>, sink: &'a mut S) -> Self {
        Self {
            pass: RecordedPass::new(descriptor),
            sink,
        }
    }
}

impl<S: PassSink> RenderPass for RecordingPass<'_, S> {
    fn set_program(&mut self, program: ProgramId) {
        self.pass.ops.push(PassOp::SetProgram(program));
    }

    fn set_blend_state(&mut self, target: usize, blend: Option<BlendState>) {
        self.pass.ops.push(PassOp::SetBlend(target, blend));
    }

    fn set_depth_state(&mut self, depth: DepthState) {
        self.pass.ops.push(PassOp::SetDepth(depth));
    }

    fn bind_uniform_block(&mut self, slot: UniformBlockSlot, buffer: BufferId) {
        self.pass.ops.push(PassOp::BindUniform(slot, buffer));
    }

    fn bind_buffer(&mut self, buffer: BuiltinBuffer, id: BufferId) {
        self.pass.ops.push(PassOp::BindBuffer(buffer, id));
    }

    fn bind_texture(&mut self, texture: BuiltinTexture, id: TextureId) {
        self.pass.ops.push(PassOp::BindTexture(texture, id));
    }

    fn draw_instanced(&mut self, draw: &DrawInstanced) {
        self.pass.ops.push(PassOp::Draw {
            mesh: *draw.mesh,
            instances: draw.instances,
            count: draw.count,
        });
    }

    fn draw_fullscreen(&mut self) {
        self.pass.ops.push(PassOp::DrawFullscreen);
    }
}

impl<S: PassSink> Drop for RecordingPass<'_, S> {
    fn drop(&mut self) {
        self.sink.end_pass(std::mem::take(&mut self.pass));
    }
}

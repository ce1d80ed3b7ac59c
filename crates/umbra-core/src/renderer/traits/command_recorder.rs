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

/// A trait representing an active render pass, used for recording drawing commands.
///
/// Pipeline state set on a pass persists until changed, like the state of a
/// classic graphics context. Stages that change it restore it before the pass
/// ends.
pub trait RenderPass {
    /// Sets the program used by subsequent draws.
    fn set_program(&mut self, program: ProgramId);

    /// Sets (or disables, with `None`) blending for one color target.
    fn set_blend_state(&mut self, target: usize, blend: Option<BlendState>);

    /// Sets the depth test and depth write state.
    fn set_depth_state(&mut self, depth: DepthState);

    /// Binds a uniform buffer to one of the fixed uniform block slots.
    fn bind_uniform_block(&mut self, slot: UniformBlockSlot, buffer: BufferId);

    /// Binds one of the built-in storage buffers.
    fn bind_buffer(&mut self, buffer: BuiltinBuffer, id: BufferId);

    /// Binds one of the built-in textures.
    fn bind_texture(&mut self, texture: BuiltinTexture, id: TextureId);

    /// Records an instanced mesh draw. An instance count that resolves to
    /// zero draws nothing.
    fn draw_instanced(&mut self, draw: &DrawInstanced);

    /// Records a draw of one triangle covering the whole target.
    fn draw_fullscreen(&mut self);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` is the main tool for building a [`CommandBufferId`]. It
/// records culling and pyramid dispatches directly, and creates render passes
/// for draws.
pub trait CommandEncoder: Send {
    /// Records a culling dispatch over one instance group.
    ///
    /// The dispatch resets its counter query, compacts the surviving records
    /// into `output` and counts them.
    fn cull_instances(&mut self, dispatch: &CullDispatch);

    /// Records the copy of a depth target into level 0 of a depth pyramid.
    fn copy_depth_to_pyramid(&mut self, dispatch: &DepthCopyDispatch);

    /// Records the max-reduction of one depth pyramid level from the level above it.
    fn reduce_pyramid_level(&mut self, dispatch: &MipReduceDispatch);

    /// Begins a new render pass.
    ///
    /// The returned `RenderPass` borrows the encoder mutably, so only one pass
    /// can be active at a time. Dropping it ends the pass.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder>;

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    ///
    /// This method consumes the encoder. The returned [`CommandBufferId`] can then
    /// be submitted to the [`GraphicsDevice`](crate::renderer::GraphicsDevice).
    fn finish(self: Box<Self>) -> CommandBufferId;
}

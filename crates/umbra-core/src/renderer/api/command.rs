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

//! Descriptors for the commands a [`CommandEncoder`](crate::renderer::CommandEncoder) records.

use super::buffer::BufferId;
use super::instance::{GpuMesh, InstanceView};
use super::program::ProgramId;
use super::query::QueryId;
use super::texture::{Extent2D, TextureId};
use crate::math::{Frustum, LinearRgba, Mat4, Sphere};

/// An opaque handle to a finished, not yet submitted, command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub usize);

/// Where an instance count comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceCount {
    /// A count known on the CPU.
    Fixed(u32),
    /// The survivor count recorded by a culling dispatch, read on the device.
    Query(QueryId),
}

/// The visibility test a culling dispatch applies to each instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CullTest {
    /// Bounding sphere against the six frustum planes.
    Frustum {
        /// The camera frustum in world space.
        frustum: Frustum,
    },
    /// Bounding sphere against the hierarchical depth pyramid.
    HiZ {
        /// Projects world space to clip space.
        view_projection: Mat4,
        /// The max-reduced depth pyramid.
        pyramid: TextureId,
        /// Number of levels in the pyramid.
        mip_count: u32,
        /// Size of pyramid level 0.
        viewport: Extent2D,
    },
}

/// Culls one instance group into a compacted survivor buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullDispatch {
    /// The culling program.
    pub program: ProgramId,
    /// The test to apply.
    pub test: CullTest,
    /// The mesh's object-space bounding sphere.
    pub bounds: Sphere,
    /// The input [`InstanceData`](super::instance::InstanceData) records.
    pub input: BufferId,
    /// How many input records are live.
    pub input_count: InstanceCount,
    /// Receives the surviving records, compacted from index 0.
    pub output: BufferId,
    /// Capacity of `output` in records.
    pub output_capacity: u32,
    /// Receives the survivor count.
    pub counter: QueryId,
    /// The mesh's index or vertex count, recorded next to the survivor count
    /// so the query can drive an indirect draw.
    pub element_count: u32,
}

/// Copies the depth target into level 0 of the depth pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthCopyDispatch {
    /// The copy program.
    pub program: ProgramId,
    /// The depth target.
    pub depth: TextureId,
    /// The pyramid.
    pub pyramid: TextureId,
}

/// Max-reduces pyramid level `target_level - 1` into `target_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipReduceDispatch {
    /// The reduction program.
    pub program: ProgramId,
    /// The pyramid.
    pub pyramid: TextureId,
    /// The level being written; always at least 1.
    pub target_level: u32,
}

/// What an attachment holds when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<T> {
    /// Keep the existing contents.
    Load,
    /// Clear to the value.
    Clear(T),
}

/// A color target of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// The target texture.
    pub texture: TextureId,
    /// What to do with the existing contents.
    pub load: LoadOp<LinearRgba>,
}

/// The depth target of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    /// The depth texture.
    pub texture: TextureId,
    /// What to do with the existing contents.
    pub load: LoadOp<f32>,
}

/// Describes a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Color targets, in fragment output order.
    pub color_attachments: &'a [ColorAttachment],
    /// The depth target, if any.
    pub depth_attachment: Option<DepthAttachment>,
}

/// An instanced mesh draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstanced<'a> {
    /// The mesh to draw.
    pub mesh: &'a GpuMesh,
    /// The per-instance stream.
    pub instances: InstanceView,
    /// How many instances to draw.
    pub count: InstanceCount,
}

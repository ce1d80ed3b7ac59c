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

//! Per-instance data layout and mesh descriptions.
//!
//! The per-instance vertex stream carries the model matrix as four row vectors
//! followed by an integer layer mask. It starts at
//! [`INSTANCE_ATTRIBUTE_OFFSET`], right after the per-vertex attributes of
//! [`MeshVertex`].

use super::buffer::BufferId;
use crate::math::{Mat4, Sphere};

/// Number of per-vertex attributes in [`MeshVertex`].
pub const MESH_ATTRIBUTE_COUNT: u32 = 3;

/// First attribute location of the per-instance stream.
pub const INSTANCE_ATTRIBUTE_OFFSET: u32 = MESH_ATTRIBUTE_COUNT;

/// Number of attribute locations used by the per-instance stream.
pub const INSTANCE_ATTRIBUTE_COUNT: u32 = 5;

/// Layer mask value meaning "visible on every layer".
pub const ALL_LAYERS: u32 = u32::MAX;

/// One vertex of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct MeshVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

/// The per-instance record streamed into, and out of, the culling stages.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct InstanceData {
    /// The model matrix, row by row.
    pub model_rows: [[f32; 4]; 4],
    /// Bitmask of the layers the instance is visible on.
    pub layer_mask: u32,
    /// Keeps the record 16-byte aligned for storage-buffer access.
    pub _padding: [u32; 3],
}

impl InstanceData {
    /// Size of one record in bytes.
    pub const SIZE: u64 = std::mem::size_of::<InstanceData>() as u64;

    /// Builds a record from a model matrix.
    pub fn new(model: &Mat4, layer_mask: u32) -> Self {
        Self {
            model_rows: model.to_rows_array(),
            layer_mask,
            _padding: [0; 3],
        }
    }

    /// The model matrix.
    pub fn model(&self) -> Mat4 {
        Mat4::from_rows_array(&self.model_rows)
    }
}

impl Default for InstanceData {
    fn default() -> Self {
        Self::new(&Mat4::IDENTITY, ALL_LAYERS)
    }
}

/// Identifies a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Identifies a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// A mesh resident on the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuMesh {
    /// The [`MeshVertex`] buffer.
    pub vertex_buffer: BufferId,
    /// The `u32` index buffer, if the mesh is indexed.
    pub index_buffer: Option<BufferId>,
    /// Index count for indexed meshes, vertex count otherwise.
    pub element_count: u32,
    /// Object-space bounding sphere used by culling.
    pub bounds: Sphere,
}

/// The buffer binding a draw reads its per-instance stream from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceView {
    /// The buffer holding [`InstanceData`] records.
    pub buffer: BufferId,
    /// First attribute location of the stream.
    pub first_attribute: u32,
    /// Distance between records in bytes.
    pub stride: u32,
}

impl InstanceView {
    /// A view over a buffer of [`InstanceData`].
    pub const fn new(buffer: BufferId) -> Self {
        Self {
            buffer,
            first_attribute: INSTANCE_ATTRIBUTE_OFFSET,
            stride: InstanceData::SIZE as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn test_instance_record_layout() {
        assert_eq!(InstanceData::SIZE, 80);
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
    }

    #[test]
    fn test_instance_stores_model_rows() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let data = InstanceData::new(&model, 0b10);
        assert_eq!(data.model_rows[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(data.model_rows[2][3], 3.0);
        assert_eq!(data.model(), model);
    }
}

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

use std::collections::BTreeMap;
use umbra_core::math::{Aabb, Sphere, Vec3};
use umbra_core::renderer::{
    BufferDescriptor, BufferUsage, DeferredDisposal, DisposalSender, GpuMesh, GraphicsDevice,
    MeshId, MeshVertex, ResourceError,
};

/// Owns the device-resident meshes.
#[derive(Debug)]
pub struct MeshRegistry {
    meshes: BTreeMap<MeshId, GpuMesh>,
    next_id: u32,
    disposal: DisposalSender,
}

impl MeshRegistry {
    /// Creates an empty registry that releases buffers through `disposal`.
    pub fn new(disposal: DisposalSender) -> Self {
        Self {
            meshes: BTreeMap::new(),
            next_id: 0,
            disposal,
        }
    }

    /// Uploads vertex and index data and registers the resulting mesh.
    ///
    /// An empty `indices` slice registers a non-indexed mesh. The bounding
    /// sphere is derived from the vertex positions.
    /// ## Errors
    /// * `ResourceError` - If a buffer cannot be created or written.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        label: &str,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> Result<MeshId, ResourceError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_buffer = device.create_buffer(&BufferDescriptor::new(
            format!("{label}_vertices"),
            vertex_bytes.len() as u64,
            BufferUsage::VERTEX | BufferUsage::STORAGE | BufferUsage::COPY_DST,
        ))?;
        device.write_buffer(vertex_buffer, 0, vertex_bytes)?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            let index_bytes: &[u8] = bytemuck::cast_slice(indices);
            let buffer = device.create_buffer(&BufferDescriptor::new(
                format!("{label}_indices"),
                index_bytes.len() as u64,
                BufferUsage::INDEX | BufferUsage::STORAGE | BufferUsage::COPY_DST,
            ))?;
            device.write_buffer(buffer, 0, index_bytes)?;
            Some(buffer)
        };

        let bounds = if vertices.is_empty() {
            Sphere::new(Vec3::ZERO, 0.0)
        } else {
            Aabb::from_points(vertices.iter().map(|v| v.position.into())).bounding_sphere()
        };
        let element_count = if indices.is_empty() {
            vertices.len()
        } else {
            indices.len()
        } as u32;

        log::debug!(
            "Uploaded mesh '{}' ({} vertices, {} indices)",
            label,
            vertices.len(),
            indices.len()
        );
        Ok(self.insert(GpuMesh {
            vertex_buffer,
            index_buffer,
            element_count,
            bounds,
        }))
    }

    /// Registers a mesh whose buffers already exist.
    pub fn insert(&mut self, mesh: GpuMesh) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.meshes.insert(id, mesh);
        id
    }

    /// The mesh with `id`.
    pub fn get(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }

    /// Unregisters a mesh and hands its buffers to the disposal queue.
    pub fn remove(&mut self, id: MeshId) -> Option<GpuMesh> {
        let mesh = self.meshes.remove(&id)?;
        self.disposal
            .dispose(DeferredDisposal::Buffer(mesh.vertex_buffer));
        if let Some(indices) = mesh.index_buffer {
            self.disposal.dispose(DeferredDisposal::Buffer(indices));
        }
        Some(mesh)
    }

    /// Number of meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Returns `true` if no mesh is registered.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::{BufferId, DisposalQueue};

    #[test]
    fn test_remove_disposes_buffers() {
        let queue = DisposalQueue::new();
        let mut registry = MeshRegistry::new(queue.sender());
        let id = registry.insert(GpuMesh {
            vertex_buffer: BufferId(1),
            index_buffer: Some(BufferId(2)),
            element_count: 3,
            bounds: Sphere::new(Vec3::ZERO, 1.0),
        });
        assert!(registry.remove(id).is_some());
        assert_eq!(queue.pending(), 2);
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }
}

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

use super::error::InstanceError;
use super::mapped_buffer::MappedBuffer;
use crate::entity::EntityId;
use umbra_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, DeferredDisposal, DisposalSender, GraphicsDevice,
    InstanceData, InstanceView, MaterialId, MeshId, QueryId, ResourceError,
};

/// Identifies an instance group: every instance sharing a mesh and a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// The mesh drawn by the group.
    pub mesh: MeshId,
    /// The material the group is shaded with.
    pub material: MaterialId,
}

impl GroupKey {
    /// Creates a new key.
    pub const fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self { mesh, material }
    }
}

/// The three drawable views of a group's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupViews {
    /// Every live instance.
    pub unculled: InstanceView,
    /// Instances that passed the frustum test, compacted.
    pub frustum: InstanceView,
    /// Frustum survivors that passed the HiZ test, compacted.
    pub hiz: InstanceView,
}

/// Device resources of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupGpu {
    /// Capacity of each buffer, in instances.
    pub capacity: u32,
    /// Current views over the buffers.
    pub views: GroupViews,
    /// Survivor count of the frustum stage.
    pub frustum_query: QueryId,
    /// Survivor count of the HiZ stage.
    pub hiz_query: QueryId,
    generation: u64,
}

impl GroupViews {
    fn dispose(&self, disposal: &DisposalSender) {
        for buffer in [self.unculled.buffer, self.frustum.buffer, self.hiz.buffer] {
            disposal.dispose(DeferredDisposal::Buffer(buffer));
        }
    }
}

impl GroupGpu {
    fn dispose(&self, disposal: &DisposalSender) {
        self.views.dispose(disposal);
        disposal.dispose(DeferredDisposal::Query(self.frustum_query));
        disposal.dispose(DeferredDisposal::Query(self.hiz_query));
    }
}

/// All instances of one (mesh, material) pair, drawn with a single batched call.
///
/// Instance records are contiguous: indices `[0, count)` are always live.
/// `owners[i]` is the entity that owns record `i`.
#[derive(Debug)]
pub struct InstanceGroup {
    key: GroupKey,
    instances: MappedBuffer<InstanceData>,
    owners: Vec<EntityId>,
    gpu: Option<GroupGpu>,
}

impl InstanceGroup {
    /// Creates an empty group.
    pub fn new(key: GroupKey) -> Self {
        Self {
            key,
            instances: MappedBuffer::new(),
            owners: Vec::new(),
            gpu: None,
        }
    }

    /// The group's key.
    #[inline]
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Number of live instances.
    #[inline]
    pub fn count(&self) -> usize {
        self.instances.len()
    }

    /// Number of instances the storage can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.instances.capacity()
    }

    /// The live instance records.
    #[inline]
    pub fn instances(&self) -> &[InstanceData] {
        self.instances.as_slice()
    }

    /// The owner of each live record.
    #[inline]
    pub fn owners(&self) -> &[EntityId] {
        &self.owners
    }

    /// The device resources, once the group has been synchronized.
    #[inline]
    pub fn gpu(&self) -> Option<&GroupGpu> {
        self.gpu.as_ref()
    }

    /// The drawable views, once the group has been synchronized.
    #[inline]
    pub fn views(&self) -> Option<GroupViews> {
        self.gpu.map(|gpu| gpu.views)
    }

    /// Grows the storage to hold at least `requested` instances.
    pub fn ensure_capacity(&mut self, requested: usize) -> bool {
        self.instances.ensure_capacity(requested)
    }

    /// Appends an instance and returns its index.
    pub fn add(&mut self, owner: EntityId, data: InstanceData) -> usize {
        self.owners.push(owner);
        self.instances.push(data)
    }

    /// Removes the instance at `index` by moving the last instance into it.
    ///
    /// Returns the entity whose instance moved into `index`, if any.
    pub fn remove(&mut self, index: usize) -> Result<Option<EntityId>, InstanceError> {
        let count = self.count();
        if self.instances.swap_remove(index).is_none() {
            return Err(InstanceError::IndexOutOfBounds { index, count });
        }
        self.owners.swap_remove(index);
        Ok(self.owners.get(index).copied())
    }

    /// Overwrites the instance at `index`.
    pub fn update(&mut self, index: usize, data: InstanceData) -> Result<(), InstanceError> {
        if index >= self.count() {
            return Err(InstanceError::IndexOutOfBounds {
                index,
                count: self.count(),
            });
        }
        self.instances[index] = data;
        Ok(())
    }

    /// Applies pending writes to the device.
    ///
    /// When the storage has grown since the last sync, the device buffers are
    /// reallocated at the new capacity and all three views are rebound before
    /// any live data is uploaded. The old buffers are handed to `disposal` only
    /// once every replacement exists; on failure the group keeps its previous
    /// resources and nothing partially created is left alive.
    pub fn sync(
        &mut self,
        device: &dyn GraphicsDevice,
        disposal: &DisposalSender,
    ) -> Result<(), ResourceError> {
        let generation = self.instances.generation();
        let reallocated = match self.gpu {
            Some(gpu) if gpu.generation == generation => false,
            Some(gpu) => {
                let capacity = self.device_capacity()?;
                let views = self.create_views(device, disposal)?;
                gpu.views.dispose(disposal);
                self.gpu = Some(GroupGpu {
                    capacity,
                    views,
                    generation,
                    ..gpu
                });
                true
            }
            None => {
                let capacity = self.device_capacity()?;
                let views = self.create_views(device, disposal)?;
                let frustum_query = match device.create_counter_query(Some("frustum_survivors")) {
                    Ok(query) => query,
                    Err(err) => {
                        views.dispose(disposal);
                        return Err(err);
                    }
                };
                let hiz_query = match device.create_counter_query(Some("hiz_survivors")) {
                    Ok(query) => query,
                    Err(err) => {
                        views.dispose(disposal);
                        disposal.dispose(DeferredDisposal::Query(frustum_query));
                        return Err(err);
                    }
                };
                self.gpu = Some(GroupGpu {
                    capacity,
                    views,
                    frustum_query,
                    hiz_query,
                    generation,
                });
                true
            }
        };

        let dirty = self.instances.take_dirty();
        let range = if reallocated {
            (!self.instances.is_empty()).then_some(0..self.count())
        } else {
            dirty
        };
        if let (Some(range), Some(gpu)) = (range, self.gpu.as_ref()) {
            let bytes: &[u8] = bytemuck::cast_slice(&self.instances.as_slice()[range.clone()]);
            let offset = range.start as u64 * InstanceData::SIZE;
            device.write_buffer(gpu.views.unculled.buffer, offset, bytes)?;
            log::trace!(
                "Group {:?}: uploaded instances {}..{}",
                self.key,
                range.start,
                range.end
            );
        }
        Ok(())
    }

    /// Hands every device resource of the group to `disposal`.
    pub fn release(&mut self, disposal: &DisposalSender) {
        if let Some(gpu) = self.gpu.take() {
            gpu.dispose(disposal);
        }
    }

    fn device_capacity(&self) -> Result<u32, ResourceError> {
        u32::try_from(self.capacity()).map_err(|_| {
            ResourceError::BackendError(format!(
                "instance group capacity {} exceeds u32",
                self.capacity()
            ))
        })
    }

    fn create_views(
        &self,
        device: &dyn GraphicsDevice,
        disposal: &DisposalSender,
    ) -> Result<GroupViews, ResourceError> {
        let size = self.capacity() as u64 * InstanceData::SIZE;
        let usage = BufferUsage::VERTEX | BufferUsage::STORAGE | BufferUsage::COPY_DST;
        let mut created: Vec<BufferId> = Vec::with_capacity(3);
        for label in ["instances_unculled", "instances_frustum", "instances_hiz"] {
            match device.create_buffer(&BufferDescriptor::new(label, size, usage)) {
                Ok(buffer) => created.push(buffer),
                Err(err) => {
                    for buffer in created {
                        disposal.dispose(DeferredDisposal::Buffer(buffer));
                    }
                    return Err(err);
                }
            }
        }
        Ok(GroupViews {
            unculled: InstanceView::new(created[0]),
            frustum: InstanceView::new(created[1]),
            hiz: InstanceView::new(created[2]),
        })
    }
}

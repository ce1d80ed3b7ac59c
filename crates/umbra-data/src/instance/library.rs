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
use super::group::{GroupKey, InstanceGroup};
use crate::entity::EntityId;
use ahash::AHashMap;
use std::collections::BTreeMap;
use umbra_core::math::Mat4;
use umbra_core::renderer::{
    DisposalSender, GraphicsDevice, InstanceData, MaterialId, MeshId, ResourceError,
};

/// Where an entity's instance record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceLocation {
    /// The group holding the record.
    pub key: GroupKey,
    /// The record's index inside the group.
    pub index: usize,
}

/// Owns every instance group and the entity index that points into them.
///
/// Groups are created on the first instance of a (mesh, material) pair and
/// released as soon as their last instance is removed. Device resources of
/// released or reallocated groups go through the disposal queue, so the
/// library can be mutated from the update thread.
#[derive(Debug)]
pub struct InstanceLibrary {
    groups: BTreeMap<GroupKey, InstanceGroup>,
    locations: AHashMap<EntityId, InstanceLocation>,
    disposal: DisposalSender,
}

impl InstanceLibrary {
    /// Creates an empty library that disposes device resources through `disposal`.
    pub fn new(disposal: DisposalSender) -> Self {
        Self {
            groups: BTreeMap::new(),
            locations: AHashMap::new(),
            disposal,
        }
    }

    /// Adds a render instance for `entity`.
    ///
    /// ## Errors
    /// * `InstanceError::DuplicateEntity` - If the entity already has an instance.
    pub fn add(
        &mut self,
        entity: EntityId,
        mesh: MeshId,
        material: MaterialId,
        transform: &Mat4,
        layer_mask: u32,
    ) -> Result<InstanceLocation, InstanceError> {
        if self.locations.contains_key(&entity) {
            return Err(InstanceError::DuplicateEntity(entity));
        }
        let key = GroupKey::new(mesh, material);
        let group = self.groups.entry(key).or_insert_with(|| {
            log::debug!("Creating instance group {:?}", key);
            InstanceGroup::new(key)
        });
        let index = group.add(entity, InstanceData::new(transform, layer_mask));
        let location = InstanceLocation { key, index };
        self.locations.insert(entity, location);
        Ok(location)
    }

    /// Removes the render instance of `entity`.
    ///
    /// The last instance of the group moves into the freed slot and its owner's
    /// location is updated. An emptied group is released.
    ///
    /// ## Errors
    /// * `InstanceError::UnknownEntity` - If the entity has no instance.
    pub fn remove(&mut self, entity: EntityId) -> Result<(), InstanceError> {
        let location = self
            .locations
            .remove(&entity)
            .ok_or(InstanceError::UnknownEntity(entity))?;
        let group = self
            .groups
            .get_mut(&location.key)
            .ok_or(InstanceError::UnknownEntity(entity))?;

        if let Some(moved) = group.remove(location.index)? {
            if let Some(moved_location) = self.locations.get_mut(&moved) {
                moved_location.index = location.index;
            }
        }

        if group.count() == 0 {
            if let Some(mut group) = self.groups.remove(&location.key) {
                log::debug!("Releasing empty instance group {:?}", location.key);
                group.release(&self.disposal);
            }
        }
        Ok(())
    }

    /// Replaces the transform of `entity`'s instance, keeping its layer mask.
    ///
    /// ## Errors
    /// * `InstanceError::UnknownEntity` - If the entity has no instance.
    pub fn update(&mut self, entity: EntityId, transform: &Mat4) -> Result<(), InstanceError> {
        let location = self.location(entity).ok_or(InstanceError::UnknownEntity(entity))?;
        let group = self
            .groups
            .get_mut(&location.key)
            .ok_or(InstanceError::UnknownEntity(entity))?;
        let layer_mask = group.instances()[location.index].layer_mask;
        group.update(location.index, InstanceData::new(transform, layer_mask))
    }

    /// The location of `entity`'s instance.
    #[inline]
    pub fn location(&self, entity: EntityId) -> Option<InstanceLocation> {
        self.locations.get(&entity).copied()
    }

    /// The group for `key`, if it has any instance.
    #[inline]
    pub fn group(&self, key: GroupKey) -> Option<&InstanceGroup> {
        self.groups.get(&key)
    }

    /// All groups, ordered by key.
    pub fn groups(&self) -> impl Iterator<Item = &InstanceGroup> {
        self.groups.values()
    }

    /// Number of groups.
    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of live instances across all groups.
    #[inline]
    pub fn instance_count(&self) -> usize {
        self.locations.len()
    }

    /// Applies every group's pending writes to the device. Called once per
    /// frame by the render thread before any stage runs.
    pub fn sync(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        for group in self.groups.values_mut() {
            group.sync(device, &self.disposal)?;
        }
        Ok(())
    }
}

impl Drop for InstanceLibrary {
    fn drop(&mut self) {
        for group in self.groups.values_mut() {
            group.release(&self.disposal);
        }
    }
}

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

//! Light storage with stable light indices.

use std::sync::Arc;
use umbra_core::renderer::{GpuLight, Light};

/// A stable light index, assigned at creation and independent of cluster
/// membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightHandle(pub u32);

/// Owns every light of the scene.
///
/// Each light occupies one slot of the light parameter buffer for its whole
/// lifetime. Destroyed slots are recycled by later creations and are never
/// reported as live in between.
#[derive(Debug, Default, Clone)]
pub struct LightStore {
    slots: Vec<Option<Light>>,
    free: Vec<u32>,
    live: usize,
}

impl LightStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light and returns its stable index.
    pub fn create(&mut self, light: Light) -> LightHandle {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(light);
                LightHandle(index)
            }
            None => {
                self.slots.push(Some(light));
                LightHandle(self.slots.len() as u32 - 1)
            }
        }
    }

    /// Removes a light, returning it if it was live.
    pub fn destroy(&mut self, handle: LightHandle) -> Option<Light> {
        let light = self.slots.get_mut(handle.0 as usize)?.take()?;
        self.free.push(handle.0);
        self.live -= 1;
        Some(light)
    }

    /// The light at `handle`, if live.
    pub fn get(&self, handle: LightHandle) -> Option<&Light> {
        self.slots.get(handle.0 as usize)?.as_ref()
    }

    /// Replaces a live light. Returns `false` if `handle` is not live.
    pub fn set(&mut self, handle: LightHandle, light: Light) -> bool {
        match self.slots.get_mut(handle.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = Some(light);
                true
            }
            _ => false,
        }
    }

    /// Number of live lights.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no light is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, live or free.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Takes an immutable copy of the live lights for this frame.
    pub fn snapshot(&self) -> Arc<LightSnapshot> {
        let lights = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|light| (LightHandle(i as u32), light)))
            .collect();
        Arc::new(LightSnapshot {
            lights,
            slot_count: self.slots.len(),
        })
    }
}

/// The live lights of one frame, shared read-only with the clustering workers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSnapshot {
    lights: Vec<(LightHandle, Light)>,
    slot_count: usize,
}

impl LightSnapshot {
    /// The live lights with their stable indices, in index order.
    #[inline]
    pub fn lights(&self) -> &[(LightHandle, Light)] {
        &self.lights
    }

    /// Number of live lights.
    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Returns `true` if there are no live lights.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Number of slots in the light parameter buffer.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// The light parameter buffer contents. Free slots are zeroed and not live.
    pub fn gpu_parameters(&self) -> Vec<GpuLight> {
        let mut parameters = vec![GpuLight::default(); self.slot_count.max(1)];
        for (handle, light) in &self.lights {
            parameters[handle.0 as usize] = light.to_gpu();
        }
        parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::{LinearRgba, Vec3};

    fn point(x: f32) -> Light {
        Light::point(Vec3::new(x, 0.0, 0.0), 1.0, LinearRgba::WHITE, 1.0)
    }

    #[test]
    fn test_freed_slots_are_not_live() {
        let mut store = LightStore::new();
        let a = store.create(point(0.0));
        let b = store.create(point(1.0));
        let c = store.create(point(2.0));
        assert_eq!(store.destroy(b).map(|l| l.position.x), Some(1.0));
        assert!(store.get(b).is_none());
        assert!(store.destroy(b).is_none());
        assert!(!store.set(b, point(9.0)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.slot_count(), 3);
        let params = snapshot.gpu_parameters();
        assert_eq!(params[a.0 as usize].live, 1);
        assert_eq!(params[b.0 as usize].live, 0);
        assert_eq!(params[c.0 as usize].live, 1);
    }

    #[test]
    fn test_slot_reuse_keeps_other_indices() {
        let mut store = LightStore::new();
        let a = store.create(point(0.0));
        let b = store.create(point(1.0));
        store.destroy(a);
        let d = store.create(point(5.0));
        assert_eq!(d, a);
        assert_eq!(store.get(b).map(|l| l.position.x), Some(1.0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.slot_count(), 2);
    }
}

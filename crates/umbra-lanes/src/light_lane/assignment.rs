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

//! Assignment of lights to clusters.

use super::grid::{ClusterConfig, ClusterGrid};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use umbra_core::math::{Mat4, Sphere, Vec3};
use umbra_core::renderer::LightKind;
use umbra_data::LightSnapshot;

/// Per-cluster light lists filled concurrently by the clustering workers.
///
/// Each list is appended to through a capped atomic counter: once a list is
/// full, further lights are dropped and the count stays at the cap. The same
/// holds for the global list. Slot order inside a list depends on thread
/// timing; only the set of lights is deterministic.
#[derive(Debug)]
pub struct ClusterAssignment {
    counts: Vec<AtomicU32>,
    indices: Vec<AtomicU32>,
    global_count: AtomicU32,
    global_indices: Vec<AtomicU32>,
    clustered: AtomicU32,
    max_per_cluster: u32,
}

fn atomics(len: usize) -> Vec<AtomicU32> {
    (0..len).map(|_| AtomicU32::new(0)).collect()
}

// Reserves a slot below `cap`, or returns `None` when the counter is saturated.
fn reserve(counter: &AtomicU32, cap: u32) -> Option<u32> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < cap).then_some(n + 1))
        .ok()
}

impl ClusterAssignment {
    /// Allocates empty lists for every cluster of `config`.
    pub fn new(config: &ClusterConfig) -> Self {
        let clusters = config.cluster_count();
        Self {
            counts: atomics(clusters),
            indices: atomics(clusters * config.max_lights_per_cluster as usize),
            global_count: AtomicU32::new(0),
            global_indices: atomics(config.max_global_lights as usize),
            clustered: AtomicU32::new(0),
            max_per_cluster: config.max_lights_per_cluster,
        }
    }

    /// Empties every list. Called once per frame before the workers start.
    pub fn clear(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
        self.global_count.store(0, Ordering::Relaxed);
        self.clustered.store(0, Ordering::Relaxed);
    }

    /// Appends a light to a cluster's list. Returns `false` if the list is full.
    pub fn push(&self, cluster: usize, light: u32) -> bool {
        match reserve(&self.counts[cluster], self.max_per_cluster) {
            Some(slot) => {
                let offset = cluster * self.max_per_cluster as usize + slot as usize;
                self.indices[offset].store(light, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Appends a light to the global list. Returns `false` if the list is full.
    pub fn push_global(&self, light: u32) -> bool {
        match reserve(&self.global_count, self.global_indices.len() as u32) {
            Some(slot) => {
                self.global_indices[slot as usize].store(light, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Number of clusters.
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.counts.len()
    }

    /// Capacity of each cluster's list.
    #[inline]
    pub fn max_per_cluster(&self) -> u32 {
        self.max_per_cluster
    }

    /// Number of lights in a cluster's list, never above the cap.
    #[inline]
    pub fn count(&self, cluster: usize) -> u32 {
        self.counts[cluster].load(Ordering::Acquire)
    }

    /// The lights in a cluster's list, in slot order.
    pub fn lights(&self, cluster: usize) -> Vec<u32> {
        let base = cluster * self.max_per_cluster as usize;
        (0..self.count(cluster) as usize)
            .map(|slot| self.indices[base + slot].load(Ordering::Acquire))
            .collect()
    }

    /// Number of global lights, never above the cap.
    #[inline]
    pub fn global_count(&self) -> u32 {
        self.global_count.load(Ordering::Acquire)
    }

    /// The global lights, in slot order.
    pub fn global_lights(&self) -> Vec<u32> {
        (0..self.global_count() as usize)
            .map(|slot| self.global_indices[slot].load(Ordering::Acquire))
            .collect()
    }

    /// Number of local lights that touched at least one cluster.
    #[inline]
    pub fn clustered_lights(&self) -> u32 {
        self.clustered.load(Ordering::Acquire)
    }

    /// Number of clusters whose list is full.
    pub fn saturated_clusters(&self) -> usize {
        self.counts
            .iter()
            .filter(|c| c.load(Ordering::Acquire) >= self.max_per_cluster)
            .count()
    }

    /// All counts, for upload.
    pub fn counts_snapshot(&self) -> Vec<u32> {
        self.counts.iter().map(|c| c.load(Ordering::Acquire)).collect()
    }

    /// All list slots, `max_per_cluster` per cluster, for upload. Slots past a
    /// cluster's count hold stale values and are never read.
    pub fn indices_snapshot(&self) -> Vec<u32> {
        self.indices.iter().map(|i| i.load(Ordering::Acquire)).collect()
    }

    /// The global list padded to its capacity, for upload.
    pub fn global_snapshot(&self) -> Vec<u32> {
        self.global_indices
            .iter()
            .map(|i| i.load(Ordering::Acquire))
            .collect()
    }
}

/// Tests a cone against a sphere.
///
/// `direction` must be normalized; `angle` is the half angle of the cone.
pub fn cone_intersects_sphere(
    origin: Vec3,
    direction: Vec3,
    range: f32,
    angle: f32,
    sphere: &Sphere,
) -> bool {
    let v = sphere.center - origin;
    let v_len_sq = v.dot(v);
    let v1_len = v.dot(direction);
    let closest = angle.cos() * (v_len_sq - v1_len * v1_len).max(0.0).sqrt() - v1_len * angle.sin();
    let angle_cull = closest > sphere.radius;
    let front_cull = v1_len > sphere.radius + range;
    let back_cull = v1_len < -sphere.radius;
    !(angle_cull || front_cull || back_cull)
}

/// Assigns the snapshot lights in `range` to clusters.
///
/// Unbounded lights go to the global list. Bounded lights are rejected by
/// depth and screen extent, then tested against every candidate cluster:
/// sphere against box for point lights, and additionally cone against the
/// box's bounding sphere for spot lights.
pub fn assign_lights(
    range: Range<usize>,
    snapshot: &LightSnapshot,
    view: &Mat4,
    grid: &ClusterGrid,
    assignment: &ClusterAssignment,
) {
    let Some(lights) = snapshot.lights().get(range) else {
        log::warn!("Cluster assignment range exceeds the light snapshot");
        return;
    };

    for (handle, light) in lights {
        if light.is_global() {
            if !assignment.push_global(handle.0) {
                log::trace!("Global light list full; light {} dropped", handle.0);
            }
            continue;
        }

        let center = view.transform_point3(light.position);
        let radius = light.range;
        let Some(candidates) = grid.candidate_range(center, radius) else {
            continue;
        };
        let bounds = Sphere::new(center, radius);
        let cone = (light.kind == LightKind::Spot)
            .then(|| (view.transform_vector3(light.direction).normalize(), light.outer_cone_angle));
        let mut touched = false;

        for z in candidates.min[2]..=candidates.max[2] {
            let ([x0, x1], [y0, y1]) = grid.widen_at_slice(&candidates, z, center, radius);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let cluster = grid.cluster_index(x, y, z);
                    let aabb = grid.aabb(cluster);
                    if !aabb.intersects_sphere(&bounds) {
                        continue;
                    }
                    if let Some((direction, angle)) = cone {
                        if !cone_intersects_sphere(center, direction, radius, angle, &aabb.bounding_sphere()) {
                            continue;
                        }
                    }
                    touched = true;
                    assignment.push(cluster, handle.0);
                }
            }
        }
        if touched {
            assignment.clustered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_push_saturates() {
        let config = ClusterConfig {
            max_lights_per_cluster: 2,
            max_global_lights: 1,
            ..ClusterConfig::with_grid(1, 1, 1)
        };
        let assignment = ClusterAssignment::new(&config);
        assert!(assignment.push(0, 5));
        assert!(assignment.push(0, 6));
        assert!(!assignment.push(0, 7));
        assert_eq!(assignment.count(0), 2);
        assert_eq!(assignment.lights(0), vec![5, 6]);
        assert_eq!(assignment.saturated_clusters(), 1);

        assert!(assignment.push_global(1));
        assert!(!assignment.push_global(2));
        assert_eq!(assignment.global_count(), 1);

        assignment.clear();
        assert_eq!(assignment.count(0), 0);
        assert_eq!(assignment.global_count(), 0);
    }

    #[test]
    fn test_cone_sphere() {
        let origin = Vec3::ZERO;
        let forward = Vec3::NEG_Z;
        let angle = 0.3;
        let ahead = Sphere::new(Vec3::new(0.0, 0.0, -5.0), 0.5);
        let behind = Sphere::new(Vec3::new(0.0, 0.0, 5.0), 0.5);
        let beside = Sphere::new(Vec3::new(5.0, 0.0, -1.0), 0.5);
        let too_far = Sphere::new(Vec3::new(0.0, 0.0, -20.0), 0.5);
        assert!(cone_intersects_sphere(origin, forward, 10.0, angle, &ahead));
        assert!(!cone_intersects_sphere(origin, forward, 10.0, angle, &behind));
        assert!(!cone_intersects_sphere(origin, forward, 10.0, angle, &beside));
        assert!(!cone_intersects_sphere(origin, forward, 10.0, angle, &too_far));
    }
}

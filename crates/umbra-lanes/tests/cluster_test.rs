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

use std::collections::BTreeSet;
use std::sync::Arc;
use umbra_core::math::{LinearRgba, Sphere, Vec3, FRAC_PI_2};
use umbra_core::renderer::{Extent2D, Light};
use umbra_data::camera::Projection;
use umbra_data::{CameraState, LightHandle, LightSnapshot, LightStore};
use umbra_lanes::light_lane::{
    assign_lights, ClusterAssignment, ClusterFrame, ClusterGrid, MAX_GLOBAL_LIGHTS,
};
use umbra_lanes::{ClusterConfig, ClusterLightsLane, ClusterWorkerPool};

fn camera(near: f32, far: f32) -> CameraState {
    CameraState::new(
        Projection {
            fov_y: FRAC_PI_2,
            aspect: 1.0,
            near,
            far,
        },
        Extent2D::new(64, 64),
    )
    .unwrap()
}

fn point(position: Vec3, range: f32) -> Light {
    Light::point(position, range, LinearRgba::WHITE, 1.0)
}

fn sun() -> Light {
    Light::directional(Vec3::new(0.2, -1.0, -0.3), LinearRgba::WHITE, 1.0)
}

/// Deterministic pseudo random lights spread over and around the frustum.
fn scattered_lights(count: usize) -> Vec<Light> {
    let mut state = 0x2545_f491_u32;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state as f32 / u32::MAX as f32
    };
    (0..count)
        .map(|_| {
            let depth = 0.5 + next() * 60.0;
            let x = (next() * 2.4 - 1.2) * depth;
            let y = (next() * 2.4 - 1.2) * depth;
            point(Vec3::new(x, y, -depth), 0.5 + next() * 6.0)
        })
        .collect()
}

fn light_store(lights: &[Light]) -> (LightStore, Vec<LightHandle>) {
    let mut store = LightStore::new();
    let handles = lights.iter().map(|light| store.create(*light)).collect();
    (store, handles)
}

/// Every cluster whose bounds lie within the light's range, by exhaustive search.
fn reference_clusters(grid: &ClusterGrid, light: &Light) -> BTreeSet<usize> {
    let sphere = Sphere::new(light.position, light.range);
    grid.aabbs()
        .iter()
        .enumerate()
        .filter(|(_, aabb)| aabb.intersects_sphere(&sphere))
        .map(|(index, _)| index)
        .collect()
}

/// The clusters whose list holds `handle`.
fn assigned_clusters(assignment: &ClusterAssignment, handle: LightHandle) -> BTreeSet<usize> {
    (0..assignment.cluster_count())
        .filter(|&cluster| assignment.lights(cluster).contains(&handle.0))
        .collect()
}

#[test]
fn test_assignment_matches_exhaustive_reference() {
    let cam = camera(0.5, 80.0);
    let config = ClusterConfig::with_grid(8, 6, 12);
    let grid = ClusterGrid::new(config, &cam);
    let lights = scattered_lights(48);
    let (store, handles) = light_store(&lights);
    let snapshot = store.snapshot();

    let assignment = ClusterAssignment::new(&config);
    assign_lights(0..snapshot.len(), &snapshot, &cam.view(), &grid, &assignment);

    assert_eq!(assignment.saturated_clusters(), 0);
    for (light, handle) in lights.iter().zip(&handles) {
        assert_eq!(
            assigned_clusters(&assignment, *handle),
            reference_clusters(&grid, light),
            "light {} at {:?} range {}",
            handle.0,
            light.position,
            light.range
        );
    }
}

#[test]
fn test_off_screen_lights_reach_only_overlapping_clusters() {
    let cam = camera(0.5, 80.0);
    let config = ClusterConfig::with_grid(8, 6, 12);
    let grid = ClusterGrid::new(config, &cam);
    // The right edge of the frustum sits at x = 10 at depth 10.
    let lights = [
        point(Vec3::new(50.0, 0.0, -10.0), 1.0),
        point(Vec3::new(10.5, 0.0, -10.0), 1.0),
        point(Vec3::new(0.0, -40.0, -10.0), 2.0),
    ];
    let (store, handles) = light_store(&lights);
    let snapshot = store.snapshot();

    let assignment = ClusterAssignment::new(&config);
    assign_lights(0..snapshot.len(), &snapshot, &cam.view(), &grid, &assignment);

    assert!(assigned_clusters(&assignment, handles[0]).is_empty());
    assert!(assigned_clusters(&assignment, handles[2]).is_empty());
    let grazing = assigned_clusters(&assignment, handles[1]);
    assert!(!grazing.is_empty());
    assert_eq!(grazing, reference_clusters(&grid, &lights[1]));
}

#[test]
fn test_assignment_is_independent_of_worker_count() {
    let cam = camera(0.5, 80.0);
    let config = ClusterConfig::with_grid(8, 6, 12);
    let lights = scattered_lights(64);
    let (store, _) = light_store(&lights);
    let snapshot = store.snapshot();

    let lists = |workers: usize| -> Vec<BTreeSet<u32>> {
        let mut lane = ClusterLightsLane::new(config, workers).unwrap();
        lane.cluster(&cam, &snapshot).unwrap();
        let assignment = lane.assignment();
        (0..assignment.cluster_count())
            .map(|cluster| assignment.lights(cluster).into_iter().collect())
            .collect()
    };

    let inline = lists(0);
    assert!(inline.iter().any(|list| !list.is_empty()));
    for workers in [1, 3, 8] {
        assert_eq!(lists(workers), inline, "{workers} workers");
    }
}

#[test]
fn test_pool_fills_shared_assignment() {
    let cam = camera(1.0, 50.0);
    let config = ClusterConfig::with_grid(4, 4, 4);
    let (store, handles) = light_store(&scattered_lights(20));
    let frame = Arc::new(ClusterFrame {
        snapshot: store.snapshot(),
        grid: Arc::new(ClusterGrid::new(config, &cam)),
        view: cam.view(),
        assignment: Arc::new(ClusterAssignment::new(&config)),
    });

    let pool = ClusterWorkerPool::new(3).unwrap();
    pool.dispatch_and_wait(Arc::clone(&frame)).unwrap();

    let expected = ClusterAssignment::new(&config);
    assign_lights(0..handles.len(), &frame.snapshot, &frame.view, &frame.grid, &expected);
    for cluster in 0..expected.cluster_count() {
        let got: BTreeSet<u32> = frame.assignment.lights(cluster).into_iter().collect();
        let want: BTreeSet<u32> = expected.lights(cluster).into_iter().collect();
        assert_eq!(got, want, "cluster {cluster}");
    }
    assert_eq!(frame.assignment.clustered_lights(), expected.clustered_lights());
}

#[test]
fn test_unbounded_lights_are_global_only() {
    let cam = camera(0.5, 80.0);
    let mut lights = scattered_lights(10);
    lights.push(sun());
    lights.push(Light::ambient(LinearRgba::WHITE, 0.1));
    let (store, handles) = light_store(&lights);

    let mut lane = ClusterLightsLane::new(ClusterConfig::with_grid(8, 6, 12), 2).unwrap();
    let summary = lane.cluster(&cam, &store.snapshot()).unwrap();

    let globals = &handles[10..];
    assert_eq!(summary.global_lights, 2);
    let global_list: BTreeSet<u32> = lane.assignment().global_lights().into_iter().collect();
    assert_eq!(global_list, globals.iter().map(|h| h.0).collect());
    for handle in globals {
        assert!(assigned_clusters(lane.assignment(), *handle).is_empty());
    }
}

#[test]
fn test_global_list_saturates_at_cap() {
    let cam = camera(0.5, 80.0);
    let lights: Vec<Light> = (0..MAX_GLOBAL_LIGHTS + 5).map(|_| sun()).collect();
    let (store, _) = light_store(&lights);

    let mut lane = ClusterLightsLane::new(ClusterConfig::with_grid(4, 4, 4), 3).unwrap();
    let summary = lane.cluster(&cam, &store.snapshot()).unwrap();

    assert_eq!(summary.global_lights, MAX_GLOBAL_LIGHTS);
    assert_eq!(lane.assignment().global_lights().len(), MAX_GLOBAL_LIGHTS as usize);
    assert_eq!(summary.lights_clustered, 0);
    for cluster in 0..lane.assignment().cluster_count() {
        assert_eq!(lane.assignment().count(cluster), 0);
    }
}

#[test]
fn test_cluster_list_saturates_at_cap() {
    let cam = camera(1.0, 10.0);
    let config = ClusterConfig {
        max_lights_per_cluster: 4,
        ..ClusterConfig::with_grid(1, 1, 1)
    };
    let lights: Vec<Light> = (0..7)
        .map(|i| point(Vec3::new(0.0, 0.0, -2.0 - i as f32 * 0.5), 1.0))
        .collect();
    let (store, _) = light_store(&lights);

    let mut lane = ClusterLightsLane::new(config, 2).unwrap();
    let summary = lane.cluster(&cam, &store.snapshot()).unwrap();

    assert_eq!(lane.assignment().count(0), 4);
    assert_eq!(summary.saturated_clusters, 1);
    assert_eq!(summary.lights_clustered, 7);
}

#[test]
fn test_three_light_scenario() {
    // Three columns across one slice: x0 spans [-10, -1/3], x1 [-10/3, 10/3], x2 [1/3, 10].
    let cam = camera(1.0, 10.0);
    let config = ClusterConfig::with_grid(3, 1, 1);
    let mut store = LightStore::new();
    let a = store.create(point(Vec3::new(-2.0, 0.0, -5.0), 0.5));
    let b = store.create(point(Vec3::new(2.0, 0.0, -5.0), 0.5));
    let c = store.create(sun());
    let snapshot: Arc<LightSnapshot> = store.snapshot();

    let mut lane = ClusterLightsLane::new(config, 2).unwrap();
    let summary = lane.cluster(&cam, &snapshot).unwrap();
    let assignment = lane.assignment();

    let set = |cluster: usize| -> BTreeSet<u32> { assignment.lights(cluster).into_iter().collect() };
    assert_eq!(set(0), BTreeSet::from([a.0]));
    assert_eq!(set(1), BTreeSet::from([a.0, b.0]));
    assert_eq!(set(2), BTreeSet::from([b.0]));
    assert_eq!(assignment.global_lights(), vec![c.0]);
    assert_eq!(summary.lights_clustered, 2);
    assert_eq!(summary.global_lights, 1);
}

#[test]
fn test_grid_follows_projection_changes() {
    let mut cam = camera(1.0, 10.0);
    let (store, _) = light_store(&[point(Vec3::new(0.0, 0.0, -5.0), 1.0)]);
    let snapshot = store.snapshot();
    let mut lane = ClusterLightsLane::new(ClusterConfig::with_grid(2, 2, 2), 0).unwrap();

    lane.cluster(&cam, &snapshot).unwrap();
    let first = lane.grid().unwrap().version();
    lane.cluster(&cam, &snapshot).unwrap();
    assert_eq!(lane.grid().unwrap().version(), first);

    cam.set_projection(Projection {
        far: 20.0,
        ..*cam.projection()
    });
    lane.cluster(&cam, &snapshot).unwrap();
    assert!(lane.grid().unwrap().version() > first);
    assert_eq!(lane.grid().unwrap().far(), 20.0);
}

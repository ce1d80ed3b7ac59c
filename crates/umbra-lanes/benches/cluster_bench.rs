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

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use umbra_core::math::{LinearRgba, Vec3, FRAC_PI_2};
use umbra_core::renderer::{Extent2D, Light};
use umbra_data::camera::Projection;
use umbra_data::{CameraState, LightStore};
use umbra_lanes::{ClusterConfig, ClusterLightsLane};

fn camera() -> CameraState {
    CameraState::new(
        Projection {
            fov_y: FRAC_PI_2,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 200.0,
        },
        Extent2D::new(1920, 1080),
    )
    .expect("valid projection")
}

// Point lights on a regular lattice in front of the camera.
fn lattice(count: usize) -> LightStore {
    let mut store = LightStore::new();
    let side = (count as f32).cbrt().ceil() as usize;
    for i in 0..count {
        let (x, y, z) = (i % side, (i / side) % side, i / (side * side));
        let position = Vec3::new(
            (x as f32 - side as f32 * 0.5) * 4.0,
            (y as f32 - side as f32 * 0.5) * 3.0,
            -2.0 - z as f32 * 6.0,
        );
        store.create(Light::point(position, 5.0, LinearRgba::WHITE, 1.0));
    }
    store
}

fn bench_clustering(c: &mut Criterion) {
    let camera = camera();
    let mut group = c.benchmark_group("Light Clustering");

    for lights in [256, 1024, 4096] {
        let snapshot = lattice(lights).snapshot();
        group.throughput(Throughput::Elements(lights as u64));

        for workers in [0, 4] {
            let mut lane = ClusterLightsLane::new(ClusterConfig::default(), workers)
                .expect("worker threads");
            group.bench_with_input(
                BenchmarkId::new(format!("{workers} workers"), lights),
                &snapshot,
                |b, snapshot| {
                    b.iter(|| black_box(lane.cluster(&camera, snapshot).expect("clustering")));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_clustering);
criterion_main!(benches);

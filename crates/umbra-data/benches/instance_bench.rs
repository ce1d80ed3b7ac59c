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

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use umbra_core::math::{Mat4, Vec3};
use umbra_core::renderer::{DisposalQueue, MaterialId, MeshId, ALL_LAYERS};
use umbra_data::{EntityId, InstanceLibrary};

fn bench_instance_library(c: &mut Criterion) {
    let queue = DisposalQueue::new();
    let mut group = c.benchmark_group("Instance Library");

    group.bench_function("add 10k", |b| {
        b.iter(|| {
            let mut library = InstanceLibrary::new(queue.sender());
            for i in 0..10_000u32 {
                let t = Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0));
                library
                    .add(EntityId::new(i, 0), MeshId(i % 8), MaterialId(0), &t, ALL_LAYERS)
                    .unwrap();
            }
            black_box(library.instance_count());
        });
    });

    let mut library = InstanceLibrary::new(queue.sender());
    for i in 0..10_000u32 {
        library
            .add(EntityId::new(i, 0), MeshId(i % 8), MaterialId(0), &Mat4::IDENTITY, ALL_LAYERS)
            .unwrap();
    }
    group.bench_function("update 10k", |b| {
        let mut x = 0.0f32;
        b.iter(|| {
            x += 1.0;
            let t = Mat4::from_translation(Vec3::new(x, 0.0, 0.0));
            for i in 0..10_000u32 {
                library.update(EntityId::new(i, 0), &t).unwrap();
            }
        });
    });

    group.bench_function("churn remove/add", |b| {
        let mut next = 10_000u32;
        b.iter(|| {
            let victim = EntityId::new(next - 10_000, 0);
            library.remove(victim).unwrap();
            library
                .add(EntityId::new(next, 0), MeshId(next % 8), MaterialId(0), &Mat4::IDENTITY, ALL_LAYERS)
                .unwrap();
            next += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_instance_library);
criterion_main!(benches);

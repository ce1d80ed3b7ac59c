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

use std::collections::HashMap;
use umbra_core::math::{Mat4, Vec3};
use umbra_core::renderer::{DisposalQueue, MaterialId, MeshId, ALL_LAYERS};
use umbra_data::instance::MappedBuffer;
use umbra_data::{EntityId, GroupKey, InstanceLibrary};

/// Small deterministic generator so the churn sequence is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }
}

fn transform_for(entity: EntityId) -> Mat4 {
    Mat4::from_translation(Vec3::new(entity.index as f32, entity.generation as f32, -1.0))
}

fn check_library(library: &InstanceLibrary, expected: &HashMap<EntityId, GroupKey>) {
    assert_eq!(library.instance_count(), expected.len());
    let mut seen = 0;
    for group in library.groups() {
        assert!(group.count() > 0, "empty group {:?} kept alive", group.key());
        assert_eq!(group.owners().len(), group.count());
        for (index, owner) in group.owners().iter().enumerate() {
            assert_eq!(expected.get(owner), Some(&group.key()));
            let location = library.location(*owner).unwrap();
            assert_eq!(location.key, group.key());
            assert_eq!(location.index, index);
            let record = group.instances()[index];
            assert_eq!(record.model(), transform_for(*owner));
            seen += 1;
        }
    }
    assert_eq!(seen, expected.len());
}

#[test]
fn test_random_churn_keeps_groups_dense() {
    let queue = DisposalQueue::new();
    let mut library = InstanceLibrary::new(queue.sender());
    let mut expected: HashMap<EntityId, GroupKey> = HashMap::new();
    let mut live: Vec<EntityId> = Vec::new();
    let mut rng = Lcg(0x5eed);

    for step in 0..2_000u32 {
        let roll = rng.next() % 10;
        if roll < 6 || live.is_empty() {
            let entity = EntityId::new(step, rng.next() % 4);
            let mesh = MeshId(rng.next() % 3);
            let material = MaterialId(rng.next() % 2);
            let location = library
                .add(entity, mesh, material, &transform_for(entity), ALL_LAYERS)
                .unwrap();
            expected.insert(entity, location.key);
            live.push(entity);
        } else {
            let victim = live.swap_remove(rng.next() as usize % live.len());
            library.remove(victim).unwrap();
            expected.remove(&victim);
        }
        check_library(&library, &expected);
    }

    while let Some(entity) = live.pop() {
        library.remove(entity).unwrap();
        expected.remove(&entity);
    }
    check_library(&library, &expected);
    assert_eq!(library.group_count(), 0);
}

#[test]
fn test_growth_keeps_entries_at_their_indices() {
    let mut buffer = MappedBuffer::<[u32; 4]>::new();
    let mut capacities = vec![buffer.capacity()];
    for i in 0..200u32 {
        buffer.push([i, !i, i.rotate_left(7), i ^ 0xA5A5_A5A5]);
        if *capacities.last().unwrap() != buffer.capacity() {
            capacities.push(buffer.capacity());
            for j in 0..=i {
                assert_eq!(buffer[j as usize], [j, !j, j.rotate_left(7), j ^ 0xA5A5_A5A5]);
            }
        }
    }
    assert_eq!(&capacities[..4], &[1, 7, 14, 28]);
}

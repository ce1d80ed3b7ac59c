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

//! Helpers shared by the draw stages.

use super::context::{FrameInputs, FrameResources};
use umbra_core::math::Vec3;
use umbra_core::renderer::{
    CompiledProgram, DrawInstanced, GpuMesh, GraphicsDevice, InstanceCount, InstanceView, QueryId,
    RenderPass, RenderStats, UniformBlockSlot,
};
use umbra_data::assets::{AlphaMode, Material};
use umbra_data::instance::GroupGpu;
use umbra_data::{GroupKey, InstanceGroup};

/// Which compacted survivor list a draw consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurvivorSource {
    /// Output of the frustum stage.
    Frustum,
    /// Output of the HiZ stage.
    HiZ,
}

impl SurvivorSource {
    /// HiZ survivors when the HiZ cull stage ran this frame, frustum
    /// survivors otherwise.
    pub fn for_frame(resources: &FrameResources) -> Self {
        if resources.hiz_culled() {
            SurvivorSource::HiZ
        } else {
            SurvivorSource::Frustum
        }
    }

    /// The view over the survivor buffer.
    pub fn view(self, gpu: &GroupGpu) -> InstanceView {
        match self {
            SurvivorSource::Frustum => gpu.views.frustum,
            SurvivorSource::HiZ => gpu.views.hiz,
        }
    }

    /// The survivor counter.
    pub fn query(self, gpu: &GroupGpu) -> QueryId {
        match self {
            SurvivorSource::Frustum => gpu.frustum_query,
            SurvivorSource::HiZ => gpu.hiz_query,
        }
    }
}

/// A group that has device buffers, a mesh and a material.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    /// The group's key.
    pub key: GroupKey,
    /// The group.
    pub group: &'a InstanceGroup,
    /// Its device buffers.
    pub gpu: GroupGpu,
    /// Its mesh.
    pub mesh: &'a GpuMesh,
    /// Its material.
    pub material: &'a Material,
}

impl DrawItem<'_> {
    /// Mean world position of the group's instances.
    pub fn centroid(&self) -> Vec3 {
        let instances = self.group.instances();
        let sum = instances
            .iter()
            .fold(Vec3::ZERO, |acc, data| acc + data.model().translation());
        sum / instances.len().max(1) as f32
    }
}

/// The drawable groups whose material matches `alpha_mode`.
///
/// Groups that were never synced, or whose mesh or material is gone, are
/// left out.
pub fn collect_draws<'a>(frame: &FrameInputs<'a>, alpha_mode: AlphaMode) -> Vec<DrawItem<'a>> {
    frame
        .instances
        .groups()
        .filter_map(|group| {
            let key = group.key();
            let gpu = *group.gpu()?;
            let material = frame.materials.get(key.material)?;
            if material.alpha_mode != alpha_mode {
                return None;
            }
            let Some(mesh) = frame.meshes.get(key.mesh) else {
                log::trace!("Group {:?} has no uploaded mesh", key);
                return None;
            };
            Some(DrawItem {
                key,
                group,
                gpu,
                mesh,
                material,
            })
        })
        .collect()
}

/// Binds the pipeline and camera blocks and the cluster tables the program
/// declares.
pub fn bind_frame_blocks(pass: &mut dyn RenderPass, program: &CompiledProgram, resources: &FrameResources) {
    if program.uniform_block(UniformBlockSlot::Pipeline).is_some() {
        pass.bind_uniform_block(UniformBlockSlot::Pipeline, resources.pipeline_uniform);
    }
    if program.uniform_block(UniformBlockSlot::Camera).is_some() {
        pass.bind_uniform_block(UniformBlockSlot::Camera, resources.camera_uniform);
    }
    if let Some(clusters) = &resources.clusters {
        clusters.bind(pass, program);
    }
}

/// Binds the material block of `item` if the program declares one.
pub fn bind_material(
    pass: &mut dyn RenderPass,
    program: &CompiledProgram,
    resources: &FrameResources,
    item: &DrawItem<'_>,
) {
    if program.uniform_block(UniformBlockSlot::Material).is_none() {
        return;
    }
    if let Some(buffer) = resources.material_uniform(item.key.material) {
        pass.bind_uniform_block(UniformBlockSlot::Material, buffer);
    }
}

/// Draws a group's survivors with a device-side count.
///
/// A group whose last resolved survivor count is zero, or not resolved yet,
/// is skipped without a draw call. Returns `true` if a draw was recorded.
pub fn draw_survivors(
    pass: &mut dyn RenderPass,
    device: &dyn GraphicsDevice,
    stats: &mut RenderStats,
    item: &DrawItem<'_>,
    source: SurvivorSource,
) -> bool {
    let query = source.query(&item.gpu);
    if device.query_result(query).count_or_zero() == 0 {
        stats.groups_skipped += 1;
        return false;
    }
    pass.draw_instanced(&DrawInstanced {
        mesh: item.mesh,
        instances: source.view(&item.gpu),
        count: InstanceCount::Query(query),
    });
    stats.draw_calls += 1;
    true
}

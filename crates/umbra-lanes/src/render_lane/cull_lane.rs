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

//! GPU culling stages.
//!
//! Both stages compact an instance list on the device and count the
//! survivors into a query. Nothing is read back: later draws consume the
//! survivor count directly.

use super::context::RenderContext;
use super::programs::{FRUSTUM_CULL, HIZ_CULL};
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::math::Frustum;
use umbra_core::renderer::{CullDispatch, CullTest, InstanceCount};

/// Culls every instance group against the camera frustum.
///
/// Input is the group's full instance buffer; output is the frustum survivor
/// buffer and its counter.
#[derive(Debug, Default)]
pub struct FrustumCullLane;

impl FrustumCullLane {
    /// Creates a new frustum culling stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for FrustumCullLane {
    fn strategy_name(&self) -> &'static str {
        "FrustumCull"
    }
}

impl RenderStage for FrustumCullLane {
    fn stage_id(&self) -> StageId {
        StageId::FrustumCull
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let frame = ctx.frame;
        let Some((camera, _)) = frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        let Some(program) = ctx.programs.get(FRUSTUM_CULL) else {
            return Ok(StageOutcome::Skipped);
        };
        let frustum = Frustum::from_view_projection(&camera.view_projection());

        let mut groups = 0usize;
        let mut instances = 0usize;
        for group in frame.instances.groups() {
            let (Some(gpu), Some(mesh)) = (group.gpu(), frame.meshes.get(group.key().mesh)) else {
                continue;
            };
            ctx.encoder.cull_instances(&CullDispatch {
                program: program.id,
                test: CullTest::Frustum { frustum },
                bounds: mesh.bounds,
                input: gpu.views.unculled.buffer,
                input_count: InstanceCount::Fixed(group.count() as u32),
                output: gpu.views.frustum.buffer,
                output_capacity: gpu.capacity,
                counter: gpu.frustum_query,
                element_count: mesh.element_count,
            });
            groups += 1;
            instances += group.count();
        }
        ctx.stats.instances_total = instances as u32;

        if groups == 0 {
            return Ok(StageOutcome::Idle);
        }
        log::trace!("Frustum cull: {} groups dispatched", groups);
        Ok(StageOutcome::Executed)
    }
}

/// Re-tests the frustum survivors against the depth pyramid.
///
/// Every group is dispatched whatever its last resolved frustum count: the
/// input count is read on the device from the frustum counter.
#[derive(Debug, Default)]
pub struct HiZCullLane;

impl HiZCullLane {
    /// Creates a new HiZ culling stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for HiZCullLane {
    fn strategy_name(&self) -> &'static str {
        "HiZCull"
    }
}

impl RenderStage for HiZCullLane {
    fn stage_id(&self) -> StageId {
        StageId::HiZCull
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let frame = ctx.frame;
        let Some((camera, settings)) = frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        if !settings.hiz_culling {
            return Ok(StageOutcome::Skipped);
        }
        let (Some(program), Some(pyramid)) = (ctx.programs.get(HIZ_CULL), ctx.resources.hiz.texture()) else {
            return Ok(StageOutcome::Skipped);
        };
        let test = CullTest::HiZ {
            view_projection: camera.view_projection(),
            pyramid,
            mip_count: ctx.resources.hiz.level_count(),
            viewport: ctx.resources.hiz.size(),
        };

        let mut groups = 0usize;
        for group in frame.instances.groups() {
            let (Some(gpu), Some(mesh)) = (group.gpu(), frame.meshes.get(group.key().mesh)) else {
                continue;
            };
            ctx.encoder.cull_instances(&CullDispatch {
                program: program.id,
                test,
                bounds: mesh.bounds,
                input: gpu.views.frustum.buffer,
                input_count: InstanceCount::Query(gpu.frustum_query),
                output: gpu.views.hiz.buffer,
                output_capacity: gpu.capacity,
                counter: gpu.hiz_query,
                element_count: mesh.element_count,
            });
            groups += 1;
        }

        Ok(if groups == 0 {
            StageOutcome::Idle
        } else {
            ctx.resources.mark_hiz_culled();
            StageOutcome::Executed
        })
    }
}

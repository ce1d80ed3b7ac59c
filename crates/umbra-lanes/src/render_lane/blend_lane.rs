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

//! Sorted alpha blending.

use super::context::RenderContext;
use super::draw::{bind_frame_blocks, bind_material, collect_draws, draw_survivors, SurvivorSource};
use super::stage::{RenderStage, StageId, StageOutcome};
use std::cmp::Ordering;
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{
    BlendState, ColorAttachment, DepthAttachment, DepthState, LoadOp, RenderPassDescriptor,
};
use umbra_data::assets::AlphaMode;

/// Draws blended materials over the scene, ordered by render queue and then
/// back to front by group centroid.
#[derive(Debug, Default)]
pub struct BlendLane;

impl BlendLane {
    /// Creates a new blend stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for BlendLane {
    fn strategy_name(&self) -> &'static str {
        "SortedBlend"
    }
}

impl RenderStage for BlendLane {
    fn stage_id(&self) -> StageId {
        StageId::Blend
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let frame = ctx.frame;
        let Some((camera, _)) = frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        let source = SurvivorSource::for_frame(ctx.resources);
        let programs = ctx.programs;
        let device = ctx.device;
        let view = camera.view();
        let mut items: Vec<_> = collect_draws(frame, AlphaMode::Blend)
            .into_iter()
            .filter(|item| programs.get(&item.material.program).is_some())
            .map(|item| {
                // View space looks down -Z: more negative is farther.
                let depth = view.transform_point3(item.centroid()).z;
                (item, depth)
            })
            .collect();
        if items.is_empty() {
            return Ok(StageOutcome::Idle);
        }
        let mut draws = 0u32;
        items.sort_by(|(a, a_depth), (b, b_depth)| {
            a.material
                .render_queue
                .cmp(&b.material.render_queue)
                .then_with(|| a_depth.partial_cmp(b_depth).unwrap_or(Ordering::Equal))
        });

        let resources = &*ctx.resources;
        let color = [ColorAttachment {
            texture: resources.framebuffer.back_color(),
            load: LoadOp::Load,
        }];
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("blend"),
            color_attachments: &color,
            depth_attachment: Some(DepthAttachment {
                texture: resources.framebuffer.depth(),
                load: LoadOp::Load,
            }),
        });
        pass.set_depth_state(DepthState::READ_ONLY);
        pass.set_blend_state(0, Some(BlendState::ALPHA_BLENDING));
        for (item, _) in &items {
            let Some(program) = programs.get(&item.material.program) else {
                continue;
            };
            pass.set_program(program.id);
            bind_frame_blocks(pass.as_mut(), program, resources);
            bind_material(pass.as_mut(), program, resources, item);
            if draw_survivors(pass.as_mut(), device, ctx.stats, item, source) {
                draws += 1;
            }
        }
        pass.set_blend_state(0, None);
        pass.set_depth_state(DepthState::DEFAULT);
        log::trace!("{}: {} draws", self.strategy_name(), draws);
        Ok(StageOutcome::Executed)
    }
}

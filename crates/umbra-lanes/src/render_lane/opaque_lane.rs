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

//! Lit opaque geometry.

use super::context::RenderContext;
use super::draw::{bind_frame_blocks, bind_material, collect_draws, draw_survivors, SurvivorSource};
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{
    ColorAttachment, DepthAttachment, DepthState, LoadOp, ProgramId, RenderPassDescriptor,
};
use umbra_data::assets::AlphaMode;

/// Shades the opaque survivors with clustered lighting.
///
/// Clears the back color target, tests against the pre-pass depth without
/// writing it, and draws each group's HiZ survivors (or frustum survivors
/// when the HiZ cull stage did not run this frame). Groups whose material program is not
/// loaded are skipped.
#[derive(Debug, Default)]
pub struct OpaqueLane;

impl OpaqueLane {
    /// Creates a new opaque stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for OpaqueLane {
    fn strategy_name(&self) -> &'static str {
        "ClusteredOpaque"
    }
}

impl RenderStage for OpaqueLane {
    fn stage_id(&self) -> StageId {
        StageId::Opaque
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let frame = ctx.frame;
        let Some((_, settings)) = frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        let source = SurvivorSource::for_frame(ctx.resources);
        let mut items = collect_draws(frame, AlphaMode::Opaque);
        items.sort_by(|a, b| {
            a.material
                .render_queue
                .cmp(&b.material.render_queue)
                .then_with(|| a.material.program.cmp(&b.material.program))
        });

        let programs = ctx.programs;
        let resources = &*ctx.resources;
        let color = [ColorAttachment {
            texture: resources.framebuffer.back_color(),
            load: LoadOp::Clear(settings.clear_color),
        }];
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("opaque"),
            color_attachments: &color,
            depth_attachment: Some(DepthAttachment {
                texture: resources.framebuffer.depth(),
                load: LoadOp::Load,
            }),
        });
        pass.set_depth_state(DepthState::READ_ONLY);
        pass.set_blend_state(0, None);

        let mut draws = 0u32;
        let mut bound: Option<ProgramId> = None;
        for item in &items {
            let Some(program) = programs.get(&item.material.program) else {
                log::trace!("Opaque group {:?}: program '{}' not loaded", item.key, item.material.program);
                ctx.stats.groups_skipped += 1;
                continue;
            };
            if bound != Some(program.id) {
                pass.set_program(program.id);
                bind_frame_blocks(pass.as_mut(), program, resources);
                bound = Some(program.id);
            }
            bind_material(pass.as_mut(), program, resources, item);
            if draw_survivors(pass.as_mut(), ctx.device, ctx.stats, item, source) {
                draws += 1;
            }
        }
        pass.set_depth_state(DepthState::DEFAULT);
        drop(pass);
        log::trace!("{}: {} draws", self.strategy_name(), draws);
        Ok(StageOutcome::Executed)
    }
}

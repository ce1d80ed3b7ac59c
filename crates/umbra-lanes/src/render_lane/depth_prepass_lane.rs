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

//! Depth pre-pass over the frustum survivors of opaque groups.

use super::context::RenderContext;
use super::draw::{bind_frame_blocks, collect_draws, draw_survivors, SurvivorSource};
use super::programs::DEPTH_PREPASS;
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{DepthAttachment, DepthState, LoadOp, RenderPassDescriptor};
use umbra_data::assets::AlphaMode;

/// Clears depth and writes it for every opaque frustum survivor.
///
/// The result feeds the HiZ pyramid and lets the opaque stage shade each
/// pixel once. The depth target is cleared even with nothing to draw.
#[derive(Debug, Default)]
pub struct DepthPrePassLane;

impl DepthPrePassLane {
    /// Creates a new depth pre-pass stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for DepthPrePassLane {
    fn strategy_name(&self) -> &'static str {
        "DepthPrePass"
    }
}

impl RenderStage for DepthPrePassLane {
    fn stage_id(&self) -> StageId {
        StageId::DepthPrePass
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let frame = ctx.frame;
        if frame.camera_and_settings().is_none() {
            return Ok(StageOutcome::Skipped);
        }
        let Some(program) = ctx.programs.get(DEPTH_PREPASS) else {
            return Ok(StageOutcome::Skipped);
        };
        let items = collect_draws(frame, AlphaMode::Opaque);
        let resources = &*ctx.resources;

        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("depth_prepass"),
            color_attachments: &[],
            depth_attachment: Some(DepthAttachment {
                texture: resources.framebuffer.depth(),
                load: LoadOp::Clear(1.0),
            }),
        });
        pass.set_program(program.id);
        pass.set_depth_state(DepthState::DEFAULT);
        bind_frame_blocks(pass.as_mut(), program, resources);

        let mut draws = 0u32;
        for item in &items {
            if draw_survivors(pass.as_mut(), ctx.device, ctx.stats, item, SurvivorSource::Frustum) {
                draws += 1;
            }
        }
        drop(pass);
        log::trace!("{}: {} draws", self.strategy_name(), draws);
        Ok(StageOutcome::Executed)
    }
}

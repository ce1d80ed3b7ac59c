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

//! Background gradient.

use super::context::RenderContext;
use super::draw::bind_frame_blocks;
use super::programs::SKYBOX;
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{
    ColorAttachment, DepthAttachment, DepthState, LoadOp, RenderPassDescriptor,
};

/// Draws the sky at the far plane, behind every opaque pixel.
///
/// Uses a `LessEqual` test against the cleared depth and never writes depth.
#[derive(Debug, Default)]
pub struct SkyboxLane;

impl SkyboxLane {
    /// Creates a new skybox stage.
    pub fn new() -> Self {
        Self
    }
}

impl Lane for SkyboxLane {
    fn strategy_name(&self) -> &'static str {
        "GradientSkybox"
    }
}

impl RenderStage for SkyboxLane {
    fn stage_id(&self) -> StageId {
        StageId::Skybox
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let Some((_, settings)) = ctx.frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        if settings.skybox.is_none() {
            return Ok(StageOutcome::Skipped);
        }
        let Some(program) = ctx.programs.get(SKYBOX) else {
            return Ok(StageOutcome::Skipped);
        };

        let resources = &*ctx.resources;
        let color = [ColorAttachment {
            texture: resources.framebuffer.back_color(),
            load: LoadOp::Load,
        }];
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("skybox"),
            color_attachments: &color,
            depth_attachment: Some(DepthAttachment {
                texture: resources.framebuffer.depth(),
                load: LoadOp::Load,
            }),
        });
        pass.set_program(program.id);
        pass.set_depth_state(DepthState::READ_ONLY);
        bind_frame_blocks(pass.as_mut(), program, resources);
        pass.draw_fullscreen();
        pass.set_depth_state(DepthState::DEFAULT);
        Ok(StageOutcome::Executed)
    }
}

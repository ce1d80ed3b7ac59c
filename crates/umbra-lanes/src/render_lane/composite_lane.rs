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

//! Final copy to the presentation target.

use super::context::RenderContext;
use super::programs::COMPOSITE_COPY;
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{
    BuiltinTexture, ColorAttachment, DepthState, LoadOp, RenderPassDescriptor,
};

/// Tonemaps the back color target into the frame's output texture.
///
/// Idle when the frame has no output; the agent swaps the framebuffer after
/// this stage either way.
#[derive(Debug, Default)]
pub struct CompositeLane;

impl CompositeLane {
    /// Creates a new composite stage.
    pub fn new() -> Self {
        Self
    }
}

impl Lane for CompositeLane {
    fn strategy_name(&self) -> &'static str {
        "TonemapCopy"
    }
}

impl RenderStage for CompositeLane {
    fn stage_id(&self) -> StageId {
        StageId::Composite
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        if ctx.frame.camera_and_settings().is_none() {
            return Ok(StageOutcome::Skipped);
        }
        let Some(output) = ctx.frame.output else {
            return Ok(StageOutcome::Idle);
        };
        let Some(program) = ctx.programs.get(COMPOSITE_COPY) else {
            return Ok(StageOutcome::Skipped);
        };

        let source = ctx.resources.framebuffer.back_color();
        let color = [ColorAttachment {
            texture: output,
            load: LoadOp::Load,
        }];
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("composite"),
            color_attachments: &color,
            depth_attachment: None,
        });
        pass.set_program(program.id);
        pass.set_depth_state(DepthState::DISABLED);
        pass.bind_texture(BuiltinTexture::SourceColor, source);
        pass.draw_fullscreen();
        pass.set_depth_state(DepthState::DEFAULT);
        Ok(StageOutcome::Executed)
    }
}

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

//! Weighted blended order-independent transparency.
//!
//! Two passes. The accumulate pass draws every transparent survivor into the
//! accumulation target (additive) and the reveal target (multiplied by
//! `1 - alpha`) against the opaque depth, without writing depth. The
//! composite pass then blends the resolved color over the back color target
//! with `(One, OneMinusSrcAlpha)`.
//!
//! With nothing to draw the stage records no command at all, so the targets
//! and the pipeline state stay exactly as the previous stage left them.

use super::context::RenderContext;
use super::draw::{bind_frame_blocks, bind_material, collect_draws, draw_survivors, SurvivorSource};
use super::programs::WBOIT_COMPOSITE;
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    BlendState, BuiltinTexture, ColorAttachment, DepthAttachment, DepthState, LoadOp, ProgramId,
    RenderPassDescriptor,
};
use umbra_data::assets::AlphaMode;

/// Clear value of the accumulation target.
pub const ACCUMULATION_CLEAR: LinearRgba = LinearRgba::new(0.0, 0.0, 0.0, 0.0);

/// Clear value of the reveal target: full transmittance.
pub const REVEAL_CLEAR: LinearRgba = LinearRgba::new(1.0, 1.0, 1.0, 1.0);

/// Draws transparent materials with weighted blended OIT.
#[derive(Debug, Default)]
pub struct TransparencyLane;

impl TransparencyLane {
    /// Creates a new transparency stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for TransparencyLane {
    fn strategy_name(&self) -> &'static str {
        "WeightedBlendedOit"
    }
}

impl RenderStage for TransparencyLane {
    fn stage_id(&self) -> StageId {
        StageId::Transparent
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let frame = ctx.frame;
        let Some((_, settings)) = frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        if !settings.transparency {
            return Ok(StageOutcome::Skipped);
        }
        let Some(composite) = ctx.programs.get(WBOIT_COMPOSITE) else {
            return Ok(StageOutcome::Skipped);
        };

        let source = SurvivorSource::for_frame(ctx.resources);
        let programs = ctx.programs;
        let device = ctx.device;
        let items: Vec<_> = collect_draws(frame, AlphaMode::Transparent)
            .into_iter()
            .filter(|item| device.query_result(source.query(&item.gpu)).count_or_zero() > 0)
            .filter(|item| programs.get(&item.material.program).is_some())
            .collect();
        if items.is_empty() {
            return Ok(StageOutcome::Idle);
        }
        let mut draws = 0u32;

        let resources = &*ctx.resources;
        let framebuffer = &resources.framebuffer;
        let depth = Some(DepthAttachment {
            texture: framebuffer.depth(),
            load: LoadOp::Load,
        });

        {
            let targets = [
                ColorAttachment {
                    texture: framebuffer.accumulation(),
                    load: LoadOp::Clear(ACCUMULATION_CLEAR),
                },
                ColorAttachment {
                    texture: framebuffer.reveal(),
                    load: LoadOp::Clear(REVEAL_CLEAR),
                },
            ];
            let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("wboit_accumulate"),
                color_attachments: &targets,
                depth_attachment: depth,
            });
            pass.set_depth_state(DepthState::READ_ONLY);
            pass.set_blend_state(0, Some(BlendState::ADDITIVE));
            pass.set_blend_state(1, Some(BlendState::REVEAL));

            let mut bound: Option<ProgramId> = None;
            for item in &items {
                let Some(program) = programs.get(&item.material.program) else {
                    continue;
                };
                if bound != Some(program.id) {
                    pass.set_program(program.id);
                    bind_frame_blocks(pass.as_mut(), program, resources);
                    bound = Some(program.id);
                }
                bind_material(pass.as_mut(), program, resources, item);
                if draw_survivors(pass.as_mut(), device, ctx.stats, item, source) {
                    draws += 1;
                }
            }
        }
        ctx.stats.transparent_draws += draws;

        let back = [ColorAttachment {
            texture: framebuffer.back_color(),
            load: LoadOp::Load,
        }];
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("wboit_composite"),
            color_attachments: &back,
            depth_attachment: depth,
        });
        pass.set_program(composite.id);
        pass.set_depth_state(DepthState::DISABLED);
        pass.set_blend_state(0, Some(BlendState::PREMULTIPLIED_OVER));
        pass.set_blend_state(1, None);
        bind_frame_blocks(pass.as_mut(), composite, resources);
        pass.bind_texture(BuiltinTexture::Accumulation, framebuffer.accumulation());
        pass.bind_texture(BuiltinTexture::Reveal, framebuffer.reveal());
        pass.draw_fullscreen();
        pass.set_depth_state(DepthState::DEFAULT);
        pass.set_blend_state(0, None);
        Ok(StageOutcome::Executed)
    }
}

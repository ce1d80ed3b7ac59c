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

//! Depth pyramid generation.

use super::context::RenderContext;
use super::programs::{HIZ_COPY, HIZ_REDUCE};
use super::stage::{RenderStage, StageId, StageOutcome};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{DepthCopyDispatch, MipReduceDispatch};

/// Copies the pre-pass depth into pyramid level 0, then max-reduces each
/// level from the one above it.
#[derive(Debug, Default)]
pub struct HiZGenerateLane {
    last_levels: u32,
}

impl HiZGenerateLane {
    /// Creates a new pyramid generation stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lane for HiZGenerateLane {
    fn strategy_name(&self) -> &'static str {
        "HiZGenerate"
    }
}

impl RenderStage for HiZGenerateLane {
    fn stage_id(&self) -> StageId {
        StageId::HiZGenerate
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let Some((_, settings)) = ctx.frame.camera_and_settings() else {
            return Ok(StageOutcome::Skipped);
        };
        if !settings.hiz_culling {
            return Ok(StageOutcome::Skipped);
        }
        let (Some(copy), Some(reduce)) = (ctx.programs.get(HIZ_COPY), ctx.programs.get(HIZ_REDUCE)) else {
            return Ok(StageOutcome::Skipped);
        };
        let Some(pyramid) = ctx.resources.hiz.texture() else {
            return Ok(StageOutcome::Skipped);
        };

        ctx.encoder.copy_depth_to_pyramid(&DepthCopyDispatch {
            program: copy.id,
            depth: ctx.resources.framebuffer.depth(),
            pyramid,
        });
        self.last_levels = ctx.resources.hiz.level_count();
        for target_level in 1..self.last_levels {
            ctx.encoder.reduce_pyramid_level(&MipReduceDispatch {
                program: reduce.id,
                pyramid,
                target_level,
            });
        }
        Ok(StageOutcome::Executed)
    }
}

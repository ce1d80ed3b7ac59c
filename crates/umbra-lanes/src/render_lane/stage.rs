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

//! The render stage contract and the fixed stage order.

use super::context::RenderContext;
use std::fmt;
use thiserror::Error;
use umbra_core::lane::{Lane, LaneError};

/// Identifies a stage of the frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    /// Assigns lights to clusters and uploads the cluster tables.
    ClusterLights,
    /// Culls every group against the camera frustum.
    FrustumCull,
    /// Writes depth for the frustum survivors.
    DepthPrePass,
    /// Builds the max-depth pyramid from the pre-pass depth.
    HiZGenerate,
    /// Culls the frustum survivors against the depth pyramid.
    HiZCull,
    /// Draws opaque geometry with clustered lighting.
    Opaque,
    /// Draws the background behind all geometry.
    Skybox,
    /// Weighted blended order-independent transparency.
    Transparent,
    /// Sorted alpha-blended geometry.
    Blend,
    /// Copies the back color target to the presentation target.
    Composite,
}

impl StageId {
    /// The default pipeline, in execution order.
    pub const PIPELINE: [StageId; 10] = [
        StageId::ClusterLights,
        StageId::FrustumCull,
        StageId::DepthPrePass,
        StageId::HiZGenerate,
        StageId::HiZCull,
        StageId::Opaque,
        StageId::Skybox,
        StageId::Transparent,
        StageId::Blend,
        StageId::Composite,
    ];

    /// Stages that must have run earlier in the same frame.
    pub const fn depends_on(self) -> &'static [StageId] {
        match self {
            StageId::ClusterLights | StageId::FrustumCull => &[],
            StageId::DepthPrePass => &[StageId::FrustumCull],
            StageId::HiZGenerate => &[StageId::DepthPrePass],
            StageId::HiZCull => &[StageId::FrustumCull, StageId::HiZGenerate],
            StageId::Opaque => &[StageId::ClusterLights, StageId::HiZCull],
            StageId::Skybox => &[StageId::Opaque],
            StageId::Transparent => &[StageId::Skybox],
            StageId::Blend => &[StageId::Transparent],
            StageId::Composite => &[StageId::Blend],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a stage list cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageOrderError {
    /// A stage appears twice.
    #[error("stage {0} appears more than once")]
    Duplicate(StageId),
    /// A stage runs before one of its dependencies, or without it.
    #[error("stage {stage} requires {dependency} to run first")]
    MissingDependency {
        /// The dependent stage.
        stage: StageId,
        /// The dependency that does not precede it.
        dependency: StageId,
    },
}

/// Checks that every stage's dependencies appear before it, exactly once.
pub fn validate_stage_order(stages: &[StageId]) -> Result<(), StageOrderError> {
    for (position, stage) in stages.iter().enumerate() {
        if stages[..position].contains(stage) {
            return Err(StageOrderError::Duplicate(*stage));
        }
        for dependency in stage.depends_on() {
            if !stages[..position].contains(dependency) {
                return Err(StageOrderError::MissingDependency {
                    stage: *stage,
                    dependency: *dependency,
                });
            }
        }
    }
    Ok(())
}

/// What a stage did this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Commands were recorded.
    Executed,
    /// The inputs were present but there was nothing to draw; no device work
    /// was recorded.
    Idle,
    /// An input (camera, settings, a program) was missing; no device work was
    /// recorded.
    Skipped,
}

/// A stage of the frame pipeline.
///
/// Stages record into the context's encoder; the agent submits the encoder
/// after each stage. A stage whose inputs are missing returns
/// [`StageOutcome::Skipped`] instead of failing.
pub trait RenderStage: Lane {
    /// The stage's position in the pipeline.
    fn stage_id(&self) -> StageId;

    /// Records the stage's work for this frame.
    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError>;
}

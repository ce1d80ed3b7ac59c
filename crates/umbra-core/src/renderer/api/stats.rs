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

//! Per-frame statistics.

/// Counters collected while rendering one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// Draw calls encoded.
    pub draw_calls: u32,
    /// Instance groups skipped because no instance survived culling.
    pub groups_skipped: u32,
    /// Live instances across all groups.
    pub instances_total: u32,
    /// Instances surviving the frustum stage, as last resolved.
    pub frustum_survivors: u32,
    /// Instances surviving the HiZ stage, as last resolved.
    pub hiz_survivors: u32,
    /// Local lights assigned to at least one cluster.
    pub lights_clustered: u32,
    /// Lights in the global list (after clamping).
    pub global_lights: u32,
    /// Clusters whose light list hit the per-cluster cap.
    pub saturated_clusters: u32,
    /// Transparent draws recorded by the WBOIT stage.
    pub transparent_draws: u32,
    /// Stages that skipped for a missing input.
    pub stages_skipped: u32,
    /// CPU time spent clustering lights, in milliseconds.
    pub cluster_time_ms: f32,
    /// CPU time spent encoding and submitting the frame, in milliseconds.
    pub frame_time_ms: f32,
}

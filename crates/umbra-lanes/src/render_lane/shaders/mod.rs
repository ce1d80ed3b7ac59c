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

//! Built-in WGSL sources of the render stages.
//!
//! Draw programs are assembled from [`COMMON_WGSL`], optionally
//! [`LIGHTING_WGSL`], and a program body. The culling programs share
//! [`CULL_COMMON_WGSL`]. Every binding follows the fixed slot contract of
//! `umbra_core::renderer::UniformBlockSlot` and `BuiltinBuffer`.

/// Camera and pipeline blocks, vertex layouts, fullscreen helper.
pub const COMMON_WGSL: &str = include_str!("common.wgsl");

/// Light cluster bindings and the clustered shading function.
///
/// Expects the `MAX_LIGHTS_PER_CLUSTER` and `MAX_GLOBAL_LIGHTS` macros.
pub const LIGHTING_WGSL: &str = include_str!("lighting.wgsl");

/// Lit opaque geometry.
pub const LIT_OPAQUE_WGSL: &str = include_str!("lit_opaque.wgsl");

/// Weighted blended accumulation into the accumulation and reveal targets.
pub const LIT_TRANSPARENT_WGSL: &str = include_str!("lit_transparent.wgsl");

/// Lit alpha-blended geometry.
pub const LIT_BLEND_WGSL: &str = include_str!("lit_blend.wgsl");

/// Depth-only vertex program.
pub const DEPTH_PREPASS_WGSL: &str = include_str!("depth_prepass.wgsl");

/// Full-screen sky gradient at the far plane.
pub const SKYBOX_WGSL: &str = include_str!("skybox.wgsl");

/// Resolve of the weighted blended targets.
pub const WBOIT_COMPOSITE_WGSL: &str = include_str!("wboit_composite.wgsl");

/// Tonemapped copy of the scene color to the output target.
pub const COMPOSITE_COPY_WGSL: &str = include_str!("composite_copy.wgsl");

/// Instance record, indirect arguments and cull parameters.
pub const CULL_COMMON_WGSL: &str = include_str!("cull_common.wgsl");

/// Frustum test of every input instance.
pub const FRUSTUM_CULL_WGSL: &str = include_str!("frustum_cull.wgsl");

/// Depth pyramid test of the frustum survivors.
pub const HIZ_CULL_WGSL: &str = include_str!("hiz_cull.wgsl");

/// Copy of the depth target into pyramid level 0.
pub const HIZ_COPY_WGSL: &str = include_str!("hiz_copy.wgsl");

/// Max-reduction of one pyramid level.
pub const HIZ_REDUCE_WGSL: &str = include_str!("hiz_reduce.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_programs_have_both_stages() {
        for body in [LIT_OPAQUE_WGSL, LIT_TRANSPARENT_WGSL, LIT_BLEND_WGSL, SKYBOX_WGSL] {
            assert!(body.contains("@vertex"));
            assert!(body.contains("@fragment"));
        }
    }

    #[test]
    fn test_cull_programs_are_compute() {
        for body in [FRUSTUM_CULL_WGSL, HIZ_CULL_WGSL, HIZ_COPY_WGSL, HIZ_REDUCE_WGSL] {
            assert!(body.contains("@compute"));
        }
    }

    #[test]
    fn test_lighting_uses_builtin_names() {
        for name in [
            "light_clusters",
            "light_parameters",
            "cluster_light_indices",
            "cluster_light_counts",
            "global_light_indices",
        ] {
            assert!(LIGHTING_WGSL.contains(name), "{name}");
        }
    }
}

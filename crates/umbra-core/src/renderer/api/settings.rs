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

//! Runtime render settings.

use crate::math::LinearRgba;
use serde::Deserialize;

/// A two-color vertical gradient drawn behind all geometry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SkyboxSettings {
    /// Color at the top of the screen.
    pub zenith: LinearRgba,
    /// Color at the horizon.
    pub horizon: LinearRgba,
}

/// Per-frame toggles read by the render stages.
///
/// Grid resolution and light caps are compile-time constants and do not
/// appear here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// The color the back buffer is cleared to.
    pub clear_color: LinearRgba,
    /// Whether the HiZ occlusion stage runs. When disabled, draws consume the
    /// frustum survivors directly.
    pub hiz_culling: bool,
    /// Whether transparent materials are drawn.
    pub transparency: bool,
    /// Number of light-clustering worker threads; `0` clusters on the render thread.
    pub cluster_workers: usize,
    /// The skybox, if any.
    pub skybox: Option<SkyboxSettings>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: LinearRgba::new(0.02, 0.02, 0.03, 1.0),
            hiz_culling: true,
            transparency: true,
            cluster_workers: 4,
            skybox: None,
        }
    }
}

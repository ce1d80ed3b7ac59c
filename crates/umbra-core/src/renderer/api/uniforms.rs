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

//! Byte layouts of the fixed uniform blocks every program may declare.

use crate::math::{LinearRgba, Mat4, Vec3};
use bytemuck::{Pod, Zeroable};

/// The `camera` uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    /// World to view space.
    pub view: [[f32; 4]; 4],
    /// View to clip space.
    pub projection: [[f32; 4]; 4],
    /// World to clip space.
    pub view_projection: [[f32; 4]; 4],
    /// Clip to view space.
    pub inverse_projection: [[f32; 4]; 4],
    /// Camera position in world space, `w = 1`.
    pub position: [f32; 4],
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Target size in pixels.
    pub viewport: [f32; 2],
}

impl CameraUniform {
    /// Builds the block from camera matrices and planes.
    pub fn new(
        view: &Mat4,
        projection: &Mat4,
        position: Vec3,
        near: f32,
        far: f32,
        viewport: [f32; 2],
    ) -> Self {
        let inverse_projection = projection.inverse().unwrap_or(Mat4::IDENTITY);
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (*projection * *view).to_cols_array_2d(),
            inverse_projection: inverse_projection.to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
            near,
            far,
            viewport,
        }
    }

    /// The world to clip matrix.
    pub fn view_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_projection)
    }
}

/// The `light_clusters` uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct LightClusterUniform {
    /// Grid size `x, y, z` and the per-cluster light cap in `w`.
    pub grid: [u32; 4],
    /// Depth slice multiplier, subtractor, near and far.
    pub depth_slicing: [f32; 4],
    /// Number of entries in the global light list.
    pub global_count: u32,
    /// Number of light parameter slots.
    pub light_slots: u32,
    /// Keeps the block 16-byte aligned.
    pub _padding: [u32; 2],
}

/// The `pipeline` uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PipelineUniform {
    /// Background color.
    pub clear_color: [f32; 4],
    /// Skybox color straight up.
    pub skybox_zenith: [f32; 4],
    /// Skybox color at the horizon.
    pub skybox_horizon: [f32; 4],
    /// Frame counter.
    pub frame: u32,
    /// Keeps the block 16-byte aligned.
    pub _padding: [u32; 3],
}

/// The `material` uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Linear base color; alpha is the coverage used by blending.
    pub base_color: [f32; 4],
}

impl From<LinearRgba> for MaterialUniform {
    fn from(color: LinearRgba) -> Self {
        Self {
            base_color: color.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 288);
        assert_eq!(std::mem::size_of::<LightClusterUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<PipelineUniform>(), 64);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 16);
    }
}

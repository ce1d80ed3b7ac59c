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

//! Light descriptions and their GPU-visible layout.

use crate::math::{LinearRgba, Vec3};

/// The shape of a light's influence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Parallel rays from an infinitely distant source; always global.
    Directional,
    /// Omnidirectional emission from a point, bounded by `range`.
    Point,
    /// A cone of emission from a point, bounded by `range` and the outer angle.
    Spot,
    /// Uniform, directionless light; always global.
    Ambient,
}

impl LightKind {
    /// The discriminant stored in [`GpuLight::kind`].
    pub const fn gpu_code(self) -> u32 {
        match self {
            LightKind::Directional => 0,
            LightKind::Point => 1,
            LightKind::Spot => 2,
            LightKind::Ambient => 3,
        }
    }
}

/// The parameters of one light.
///
/// A light whose `range` is not finite is *global*: it affects every pixel,
/// lives in the global light list, and never appears in a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// The shape of the light.
    pub kind: LightKind,
    /// World-space position (point and spot lights).
    pub position: Vec3,
    /// World-space direction the light points at (directional and spot lights).
    pub direction: Vec3,
    /// Radius of influence; `f32::INFINITY` for unbounded lights.
    pub range: f32,
    /// Inner cone half-angle in radians, full intensity inside.
    pub inner_cone_angle: f32,
    /// Outer cone half-angle in radians, zero intensity outside.
    pub outer_cone_angle: f32,
    /// Linear color.
    pub color: LinearRgba,
    /// Intensity multiplier.
    pub intensity: f32,
}

impl Light {
    /// A point light.
    pub fn point(position: Vec3, range: f32, color: LinearRgba, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Z,
            range,
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
            color,
            intensity,
        }
    }

    /// A spot light. The direction is normalized.
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        range: f32,
        inner_cone_angle: f32,
        outer_cone_angle: f32,
        color: LinearRgba,
        intensity: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize(),
            range,
            inner_cone_angle,
            outer_cone_angle: outer_cone_angle.max(inner_cone_angle),
            color,
            intensity,
        }
    }

    /// A directional light. The direction is normalized.
    pub fn directional(direction: Vec3, color: LinearRgba, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize(),
            range: f32::INFINITY,
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
            color,
            intensity,
        }
    }

    /// An ambient light.
    pub fn ambient(color: LinearRgba, intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            range: f32::INFINITY,
            ..Self::directional(Vec3::NEG_Z, color, intensity)
        }
    }

    /// Returns `true` for lights with unbounded range.
    #[inline]
    pub fn is_global(&self) -> bool {
        !self.range.is_finite()
    }

    /// The GPU record for this light.
    pub fn to_gpu(&self) -> GpuLight {
        GpuLight {
            position: self.position.to_array(),
            range: if self.is_global() { -1.0 } else { self.range },
            color: [self.color.r, self.color.g, self.color.b],
            intensity: self.intensity,
            direction: self.direction.to_array(),
            kind: self.kind.gpu_code(),
            cos_inner: self.inner_cone_angle.cos(),
            cos_outer: self.outer_cone_angle.cos(),
            live: 1,
            _padding: 0,
        }
    }
}

/// A light as stored in the light parameter buffer.
///
/// Global lights store a negative range. Freed slots store `live == 0` and are
/// never referenced by the cluster or global lists.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    /// World-space position.
    pub position: [f32; 3],
    /// Radius of influence, or a negative value for global lights.
    pub range: f32,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Intensity multiplier.
    pub intensity: f32,
    /// World-space direction.
    pub direction: [f32; 3],
    /// [`LightKind::gpu_code`].
    pub kind: u32,
    /// Cosine of the inner cone angle.
    pub cos_inner: f32,
    /// Cosine of the outer cone angle.
    pub cos_outer: f32,
    /// `1` for a live slot, `0` for a freed one.
    pub live: u32,
    /// Keeps the record 16-byte aligned.
    pub _padding: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_light_size() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
    }

    #[test]
    fn test_directional_and_ambient_lights_are_global() {
        assert!(Light::directional(Vec3::new(0.0, -1.0, 0.0), LinearRgba::WHITE, 1.0).is_global());
        assert!(Light::ambient(LinearRgba::WHITE, 0.1).is_global());
        assert!(!Light::point(Vec3::ZERO, 5.0, LinearRgba::WHITE, 1.0).is_global());
        let unbounded_point = Light::point(Vec3::ZERO, f32::INFINITY, LinearRgba::WHITE, 1.0);
        assert!(unbounded_point.is_global());
    }

    #[test]
    fn test_spot_light_gpu_record() {
        let light = Light::spot(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -2.0),
            10.0,
            0.2,
            0.1,
            LinearRgba::WHITE,
            3.0,
        );
        assert_eq!(light.direction, Vec3::NEG_Z);
        assert_eq!(light.outer_cone_angle, 0.2, "outer angle never narrower than inner");
        let gpu = light.to_gpu();
        assert_eq!(gpu.kind, 2);
        assert_eq!(gpu.live, 1);
        assert_eq!(gpu.range, 10.0);
    }
}

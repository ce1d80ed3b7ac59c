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

//! Math primitives for the visibility and lighting pipeline.
//!
//! All angular functions operate in **radians**. Matrices are column-major,
//! view space is right-handed looking down `-Z`, and clip-space depth is `[0, 1]`.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

pub mod color;
pub mod geometry;
pub mod matrix;
pub mod vector;

pub use self::color::LinearRgba;
pub use self::geometry::{Aabb, Frustum, Plane, Sphere};
pub use self::matrix::Mat4;
pub use self::vector::{Vec2, Vec3, Vec4};

/// Converts degrees to radians.
#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * (PI / 180.0)
}

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

//! Column-major 4x4 matrices for transforms, views, and projections.

use super::{Vec3, Vec4, EPSILON};
use std::ops::Mul;

/// A column-major 4x4 matrix.
///
/// Conventions: right-handed view space looking down `-Z`, clip-space depth in
/// `[0, 1]` (the "ZO" convention used by every modern graphics API).
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a matrix from four columns.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns row `index` (`0..4`).
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// A translation matrix.
    #[inline]
    pub fn from_translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = t.extend(1.0);
        m
    }

    /// A non-uniform scale matrix.
    #[inline]
    pub fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::W,
        )
    }

    /// A rotation around the Y axis.
    #[inline]
    pub fn from_rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(c, 0.0, -s, 0.0),
            Vec4::Y,
            Vec4::new(s, 0.0, c, 0.0),
            Vec4::W,
        )
    }

    /// A right-handed perspective projection mapping depth to `[0, 1]`.
    ///
    /// Returns `None` when `z_near <= 0`, `z_far <= z_near`, or the aspect ratio
    /// is not positive.
    pub fn perspective_rh_zo(
        fov_y_radians: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    ) -> Option<Self> {
        if z_near <= 0.0 || z_far <= z_near || aspect_ratio <= 0.0 {
            return None;
        }
        let f = 1.0 / (fov_y_radians * 0.5).tan();
        let range = z_far / (z_near - z_far);
        Some(Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, -1.0),
            Vec4::new(0.0, 0.0, range * z_near, 0.0),
        ))
    }

    /// A right-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` if `eye == target` or `up` is parallel to the view direction.
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let f = (target - eye).normalize();
        let s = f.cross(up).normalize();
        if f == Vec3::ZERO || s == Vec3::ZERO {
            return None;
        }
        let u = s.cross(f);
        Some(Self::from_cols(
            Vec4::new(s.x, u.x, -f.x, 0.0),
            Vec4::new(s.y, u.y, -f.y, 0.0),
            Vec4::new(s.z, u.z, -f.z, 0.0),
            Vec4::new(-s.dot(eye), -u.dot(eye), f.dot(eye), 1.0),
        ))
    }

    /// The transpose.
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2), self.row(3))
    }

    /// The general inverse, computed from 2x2 sub-determinants.
    ///
    /// Returns `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let [a, b, c, d] = self.cols;

        let s0 = a.x * b.y - b.x * a.y;
        let s1 = a.x * b.z - b.x * a.z;
        let s2 = a.x * b.w - b.x * a.w;
        let s3 = a.y * b.z - b.y * a.z;
        let s4 = a.y * b.w - b.y * a.w;
        let s5 = a.z * b.w - b.z * a.w;

        let c5 = c.z * d.w - d.z * c.w;
        let c4 = c.y * d.w - d.y * c.w;
        let c3 = c.y * d.z - d.y * c.z;
        let c2 = c.x * d.w - d.x * c.w;
        let c1 = c.x * d.z - d.x * c.z;
        let c0 = c.x * d.y - d.x * c.y;

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() < EPSILON * EPSILON {
            return None;
        }
        let inv = 1.0 / det;

        Some(Self::from_cols(
            Vec4::new(
                (b.y * c5 - b.z * c4 + b.w * c3) * inv,
                (-a.y * c5 + a.z * c4 - a.w * c3) * inv,
                (d.y * s5 - d.z * s4 + d.w * s3) * inv,
                (-c.y * s5 + c.z * s4 - c.w * s3) * inv,
            ),
            Vec4::new(
                (-b.x * c5 + b.z * c2 - b.w * c1) * inv,
                (a.x * c5 - a.z * c2 + a.w * c1) * inv,
                (-d.x * s5 + d.z * s2 - d.w * s1) * inv,
                (c.x * s5 - c.z * s2 + c.w * s1) * inv,
            ),
            Vec4::new(
                (b.x * c4 - b.y * c2 + b.w * c0) * inv,
                (-a.x * c4 + a.y * c2 - a.w * c0) * inv,
                (d.x * s4 - d.y * s2 + d.w * s0) * inv,
                (-c.x * s4 + c.y * s2 - c.w * s0) * inv,
            ),
            Vec4::new(
                (-b.x * c3 + b.y * c1 - b.z * c0) * inv,
                (a.x * c3 - a.y * c1 + a.z * c0) * inv,
                (-d.x * s3 + d.y * s1 - d.z * s0) * inv,
                (c.x * s3 - c.y * s1 + c.z * s0) * inv,
            ),
        ))
    }

    /// Transforms a point (`w = 1`) and performs the perspective divide.
    #[inline]
    pub fn project_point3(&self, p: Vec3) -> Vec3 {
        (*self * p.extend(1.0)).project()
    }

    /// Transforms a point as an affine transform (`w = 1`, no divide).
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        (*self * p.extend(1.0)).truncate()
    }

    /// Transforms a direction (`w = 0`).
    #[inline]
    pub fn transform_vector3(&self, v: Vec3) -> Vec3 {
        (*self * v.extend(0.0)).truncate()
    }

    /// The largest axis scale of the upper 3x3 block, used to scale bounding spheres.
    #[inline]
    pub fn max_axis_scale(&self) -> f32 {
        let sx = self.cols[0].truncate().length_squared();
        let sy = self.cols[1].truncate().length_squared();
        let sz = self.cols[2].truncate().length_squared();
        sx.max(sy).max(sz).sqrt()
    }

    /// The translation column.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }

    /// The matrix as a flat column-major array.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        bytemuck::cast(*self)
    }

    /// The four columns as arrays, the layout of matrices in uniform blocks.
    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        bytemuck::cast(*self)
    }

    /// Rebuilds a matrix from the layout produced by [`Mat4::to_cols_array_2d`].
    #[inline]
    pub fn from_cols_array_2d(cols: &[[f32; 4]; 4]) -> Self {
        bytemuck::cast(*cols)
    }

    /// The four rows as arrays, the layout used by per-instance vertex attributes.
    #[inline]
    pub fn to_rows_array(&self) -> [[f32; 4]; 4] {
        [
            self.row(0).to_array(),
            self.row(1).to_array(),
            self.row(2).to_array(),
            self.row(3).to_array(),
        ]
    }

    /// Rebuilds a matrix from the row layout produced by [`Mat4::to_rows_array`].
    #[inline]
    pub fn from_rows_array(rows: &[[f32; 4]; 4]) -> Self {
        let r = |i: usize| Vec4::new(rows[i][0], rows[i][1], rows[i][2], rows[i][3]);
        Self::from_cols(r(0), r(1), r(2), r(3)).transpose()
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

impl approx::AbsDiffEq for Mat4 {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.cols
            .iter()
            .zip(other.cols.iter())
            .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_inverse_round_trips_affine_transform() {
        let m = Mat4::from_translation(Vec3::new(1.0, -2.0, 3.0))
            * Mat4::from_rotation_y(0.7)
            * Mat4::from_scale(Vec3::new(2.0, 3.0, 0.5));
        let inv = m.inverse().unwrap();
        assert_abs_diff_eq!(m * inv, Mat4::IDENTITY, epsilon = 1e-4);
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        assert!(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)).inverse().is_none());
    }

    #[test]
    fn test_perspective_maps_near_and_far_to_zero_and_one() {
        let p = Mat4::perspective_rh_zo(1.0, 1.5, 0.5, 100.0).unwrap();
        let near = p.project_point3(Vec3::new(0.0, 0.0, -0.5));
        let far = p.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert_abs_diff_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_rejects_invalid_planes() {
        assert!(Mat4::perspective_rh_zo(1.0, 1.0, 0.0, 10.0).is_none());
        assert!(Mat4::perspective_rh_zo(1.0, 1.0, 5.0, 1.0).is_none());
    }

    #[test]
    fn test_look_at_moves_target_onto_negative_z() {
        let eye = Vec3::new(0.0, 2.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).unwrap();
        let t = view.transform_point3(Vec3::ZERO);
        assert_abs_diff_eq!(t.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(t.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(t.z, -eye.length(), epsilon = 1e-4);
    }

    #[test]
    fn test_rows_array_round_trip() {
        let m = Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0)) * Mat4::from_rotation_y(0.3);
        assert_abs_diff_eq!(Mat4::from_rows_array(&m.to_rows_array()), m);
        assert_eq!(m.to_rows_array()[0][3], 4.0);
    }

    #[test]
    fn test_max_axis_scale() {
        let m = Mat4::from_scale(Vec3::new(1.0, 4.0, 2.0)) * Mat4::from_rotation_y(1.1);
        assert_abs_diff_eq!(m.max_axis_scale(), 4.0, epsilon = 1e-5);
    }
}

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

//! Bounding volumes and the view frustum.

use super::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// The minimum corner.
    pub min: Vec3,
    /// The maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any `grow` call will replace.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a box from two corners, sorting their components.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The smallest box containing every point.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut acc, p| {
            acc.grow(p);
            acc
        })
    }

    /// Expands the box to contain `p`.
    #[inline]
    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// The center point.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half of the size along each axis.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The closest point inside the box to `p`.
    #[inline]
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    /// Squared distance from `p` to the box, zero when `p` is inside.
    #[inline]
    pub fn distance_squared(&self, p: Vec3) -> f32 {
        self.closest_point(p).distance_squared(p)
    }

    /// The bounding sphere of the box: its center and half diagonal.
    #[inline]
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.center(), self.half_extents().length())
    }

    /// Returns `true` if the sphere touches or overlaps the box.
    #[inline]
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.distance_squared(sphere.center) <= sphere.radius * sphere.radius
    }
}

/// A bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sphere {
    /// The center.
    pub center: Vec3,
    /// The radius.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere.
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Transforms a local-space sphere by an affine model matrix.
    ///
    /// The radius is scaled by the largest axis scale, so the result stays
    /// conservative under non-uniform scaling.
    #[inline]
    pub fn transformed(&self, model: &Mat4) -> Self {
        Self {
            center: model.transform_point3(self.center),
            radius: self.radius * model.max_axis_scale(),
        }
    }
}

/// A plane in the form `normal . p + d = 0`, with the normal pointing inwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Plane {
    /// `xyz` is the normal, `w` the distance term.
    pub coefficients: Vec4,
}

impl Plane {
    /// Builds a normalized plane from raw coefficients.
    pub fn from_coefficients(v: Vec4) -> Self {
        let len = v.truncate().length();
        let coefficients = if len > 0.0 { v * (1.0 / len) } else { v };
        Self { coefficients }
    }

    /// Signed distance from `p` to the plane, positive on the inner side.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.coefficients.truncate().dot(p) + self.coefficients.w
    }
}

/// The six inward-facing planes of a view frustum.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the frustum planes from a view-projection matrix using a `[0, 1]`
    /// clip depth range.
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Returns `true` unless the sphere lies entirely outside one of the planes.
    #[inline]
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(sphere.center) >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum() -> Frustum {
        let proj = Mat4::perspective_rh_zo(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0).unwrap();
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y).unwrap();
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_frustum_accepts_visible_and_rejects_hidden_spheres() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -200.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(50.0, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn test_frustum_keeps_sphere_straddling_a_plane() {
        let frustum = camera_frustum();
        // The right plane passes through x = 10 at depth 10.
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(10.5, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn test_aabb_sphere_distance() {
        let aabb = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.intersects_sphere(&Sphere::new(Vec3::new(1.5, 0.5, 0.5), 0.5)));
        assert!(!aabb.intersects_sphere(&Sphere::new(Vec3::new(1.6, 0.5, 0.5), 0.5)));
        assert_eq!(aabb.distance_squared(Vec3::splat(0.5)), 0.0);
    }

    #[test]
    fn test_sphere_transform_uses_largest_scale() {
        let model = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))
            * Mat4::from_scale(Vec3::new(1.0, 3.0, 2.0));
        let s = Sphere::new(Vec3::ZERO, 1.0).transformed(&model);
        assert_eq!(s.center, Vec3::new(0.0, 1.0, 0.0));
        assert!((s.radius - 3.0).abs() < 1e-5);
    }
}

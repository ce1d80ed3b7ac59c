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

//! CPU reference of the culling tests run by the culling programs.
//!
//! The WGSL culling programs implement exactly these functions; the software
//! device calls them directly.

use crate::math::{Frustum, Mat4, Sphere, Vec2, Vec3, EPSILON};
use crate::renderer::api::texture::Extent2D;

/// Number of levels of a depth pyramid for a target of `size`:
/// `1 + floor(log2(max(width, height)))`.
pub fn hiz_mip_count(size: Extent2D) -> u32 {
    let largest = size.width.max(size.height).max(1);
    32 - largest.leading_zeros()
}

/// Returns `true` if an instance's bounding sphere touches the frustum.
#[inline]
pub fn frustum_visible(frustum: &Frustum, bounds: &Sphere, model: &Mat4) -> bool {
    frustum.intersects_sphere(&bounds.transformed(model))
}

/// The screen-space rectangle covered by a projected bounding volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenFootprint {
    /// Top-left corner in texture coordinates (`y` down), clamped to `[0, 1]`.
    pub min_uv: Vec2,
    /// Bottom-right corner in texture coordinates, clamped to `[0, 1]`.
    pub max_uv: Vec2,
    /// Smallest clip-space depth of the volume.
    pub nearest_depth: f32,
}

/// Projects a world-space sphere through `view_projection`.
///
/// Returns `None` if the sphere's bounding box crosses the camera plane; such
/// an instance cannot be proven occluded.
pub fn project_sphere(sphere: &Sphere, view_projection: &Mat4) -> Option<ScreenFootprint> {
    let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    let mut nearest_depth = f32::INFINITY;
    let r = sphere.radius;
    for corner in 0..8u32 {
        let offset = Vec3::new(
            if corner & 1 == 0 { -r } else { r },
            if corner & 2 == 0 { -r } else { r },
            if corner & 4 == 0 { -r } else { r },
        );
        let clip = *view_projection * (sphere.center + offset).extend(1.0);
        if clip.w <= EPSILON {
            return None;
        }
        let ndc = clip.project();
        let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
        min = min.min(uv);
        max = max.max(uv);
        nearest_depth = nearest_depth.min(ndc.z);
    }
    let clamp = |v: Vec2| Vec2::new(v.x.clamp(0.0, 1.0), v.y.clamp(0.0, 1.0));
    Some(ScreenFootprint {
        min_uv: clamp(min),
        max_uv: clamp(max),
        nearest_depth: nearest_depth.max(0.0),
    })
}

/// Picks the pyramid level at which the footprint spans at most two texels on
/// each axis.
pub fn select_hiz_mip(footprint: &ScreenFootprint, viewport: Extent2D, mip_count: u32) -> u32 {
    let width_px = (footprint.max_uv.x - footprint.min_uv.x) * viewport.width as f32;
    let height_px = (footprint.max_uv.y - footprint.min_uv.y) * viewport.height as f32;
    let extent = width_px.max(height_px).max(1.0);
    let level = extent.log2().ceil() as u32;
    level.min(mip_count.saturating_sub(1))
}

/// Returns `true` if the footprint lies entirely behind the farthest occluder
/// stored in pyramid level `level`.
///
/// `sample(level, x, y)` reads one texel of the max-reduced pyramid.
pub fn hiz_occluded(
    footprint: &ScreenFootprint,
    viewport: Extent2D,
    level: u32,
    sample: impl Fn(u32, u32, u32) -> f32,
) -> bool {
    let size = viewport.mip_level_size(level);
    let to_texel = |uv: f32, extent: u32| ((uv * extent as f32) as u32).min(extent - 1);
    let x0 = to_texel(footprint.min_uv.x, size.width);
    let x1 = to_texel(footprint.max_uv.x, size.width);
    let y0 = to_texel(footprint.min_uv.y, size.height);
    let y1 = to_texel(footprint.max_uv.y, size.height);

    let mut farthest = 0.0f32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            farthest = farthest.max(sample(level, x, y));
        }
    }
    footprint.nearest_depth > farthest
}

/// The full HiZ test for one instance: `true` if it may be visible.
pub fn hiz_visible(
    bounds: &Sphere,
    model: &Mat4,
    view_projection: &Mat4,
    viewport: Extent2D,
    mip_count: u32,
    sample: impl Fn(u32, u32, u32) -> f32,
) -> bool {
    let world = bounds.transformed(model);
    match project_sphere(&world, view_projection) {
        None => true,
        Some(footprint) => {
            let level = select_hiz_mip(&footprint, viewport, mip_count);
            !hiz_occluded(&footprint, viewport, level, sample)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_2;

    fn view_projection() -> Mat4 {
        let proj = Mat4::perspective_rh_zo(FRAC_PI_2, 1.0, 0.1, 100.0).unwrap();
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y).unwrap();
        proj * view
    }

    #[test]
    fn test_mip_count_formula() {
        assert_eq!(hiz_mip_count(Extent2D::new(1, 1)), 1);
        assert_eq!(hiz_mip_count(Extent2D::new(2, 1)), 2);
        assert_eq!(hiz_mip_count(Extent2D::new(1920, 1080)), 11);
        assert_eq!(hiz_mip_count(Extent2D::new(1024, 1024)), 11);
        assert_eq!(hiz_mip_count(Extent2D::new(1023, 7)), 10);
    }

    #[test]
    fn test_sphere_behind_near_plane_is_not_projected() {
        let s = Sphere::new(Vec3::new(0.0, 0.0, 0.5), 1.0);
        assert!(project_sphere(&s, &view_projection()).is_none());
    }

    #[test]
    fn test_small_sphere_selects_fine_level() {
        let viewport = Extent2D::new(256, 256);
        let s = Sphere::new(Vec3::new(0.0, 0.0, -50.0), 0.1);
        let fp = project_sphere(&s, &view_projection()).unwrap();
        assert_eq!(select_hiz_mip(&fp, viewport, hiz_mip_count(viewport)), 0);

        let big = Sphere::new(Vec3::new(0.0, 0.0, -5.0), 2.0);
        let fp = project_sphere(&big, &view_projection()).unwrap();
        let level = select_hiz_mip(&fp, viewport, hiz_mip_count(viewport));
        assert!(level >= 6, "large footprint should use a coarse level, got {level}");
    }

    #[test]
    fn test_hiz_occlusion_against_constant_depth() {
        let viewport = Extent2D::new(64, 64);
        let mips = hiz_mip_count(viewport);
        let vp = view_projection();
        let near_occluder = |_: u32, _: u32, _: u32| 0.5;
        let far_sphere = Sphere::new(Vec3::new(0.0, 0.0, -80.0), 1.0);
        let near_sphere = Sphere::new(Vec3::new(0.0, 0.0, -0.15), 0.02);
        assert!(!hiz_visible(&far_sphere, &Mat4::IDENTITY, &vp, viewport, mips, near_occluder));
        assert!(hiz_visible(&near_sphere, &Mat4::IDENTITY, &vp, viewport, mips, near_occluder));
        let cleared = |_: u32, _: u32, _: u32| 1.0;
        assert!(hiz_visible(&far_sphere, &Mat4::IDENTITY, &vp, viewport, mips, cleared));
    }
}

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

//! Depth-only triangle rasterization.

use umbra_core::math::{Mat4, Vec3, EPSILON};
use umbra_core::renderer::{DepthState, Extent2D};

/// A triangle in screen space: `x, y` in pixels, `z` in `[0, 1]`.
type ScreenTriangle = [Vec3; 3];

fn to_screen(clip_from_object: &Mat4, p: Vec3, size: Extent2D) -> Option<Vec3> {
    let clip = *clip_from_object * p.extend(1.0);
    if clip.w <= EPSILON {
        return None;
    }
    let ndc = clip.project();
    Some(Vec3::new(
        (ndc.x * 0.5 + 0.5) * size.width as f32,
        (0.5 - ndc.y * 0.5) * size.height as f32,
        ndc.z,
    ))
}

#[inline]
fn edge(a: Vec3, b: Vec3, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

fn fill(target: &mut [f32], size: Extent2D, tri: ScreenTriangle, depth: DepthState) -> usize {
    let [a, b, c] = tri;
    let area = edge(a, b, c.x, c.y);
    if area.abs() <= EPSILON {
        return 0;
    }
    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
    let max_x = (a.x.max(b.x).max(c.x).ceil().max(0.0) as u32).min(size.width);
    let max_y = (a.y.max(b.y).max(c.y).ceil().max(0.0) as u32).min(size.height);

    let mut written = 0;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, px, py) / area;
            let w1 = edge(c, a, px, py) / area;
            let w2 = edge(a, b, px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let z = w0 * a.z + w1 * b.z + w2 * c.z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let index = (y * size.width + x) as usize;
            if depth.compare.passes(z, target[index]) && depth.write_enabled {
                target[index] = z;
                written += 1;
            }
        }
    }
    written
}

/// Rasterizes a mesh into a depth target and returns the number of texels
/// written.
///
/// Triangles with a vertex behind the camera are dropped rather than
/// clipped. Both windings are filled.
pub(crate) fn rasterize_depth(
    target: &mut [f32],
    size: Extent2D,
    clip_from_object: &Mat4,
    positions: &[Vec3],
    triangles: impl Iterator<Item = [u32; 3]>,
    depth: DepthState,
) -> usize {
    let mut written = 0;
    for [i0, i1, i2] in triangles {
        let corners = [i0, i1, i2].map(|i| {
            positions
                .get(i as usize)
                .and_then(|p| to_screen(clip_from_object, *p, size))
        });
        if let [Some(a), Some(b), Some(c)] = corners {
            written += fill(target, size, [a, b, c], depth);
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::CompareFunction;

    fn quad() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        (
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_fullscreen_quad_covers_every_texel() {
        let size = Extent2D::new(8, 4);
        let mut depth = vec![1.0; size.area()];
        let (positions, triangles) = quad();
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, 0.25));
        let written = rasterize_depth(
            &mut depth,
            size,
            &model,
            &positions,
            triangles.into_iter(),
            DepthState::DEFAULT,
        );
        assert_eq!(written, size.area());
        assert!(depth.iter().all(|d| (d - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_depth_test_keeps_nearer_values() {
        let size = Extent2D::new(4, 4);
        let mut depth = vec![0.1; size.area()];
        let (positions, triangles) = quad();
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5));
        let written = rasterize_depth(
            &mut depth,
            size,
            &model,
            &positions,
            triangles.into_iter(),
            DepthState::DEFAULT,
        );
        assert_eq!(written, 0);
        assert!(depth.iter().all(|d| *d == 0.1));
    }

    #[test]
    fn test_read_only_state_never_writes() {
        let size = Extent2D::new(4, 4);
        let mut depth = vec![1.0; size.area()];
        let (positions, triangles) = quad();
        let state = DepthState {
            compare: CompareFunction::Always,
            write_enabled: false,
        };
        let written = rasterize_depth(
            &mut depth,
            size,
            &Mat4::IDENTITY,
            &positions,
            triangles.into_iter(),
            state,
        );
        assert_eq!(written, 0);
    }
}

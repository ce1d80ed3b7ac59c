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

//! The view-space cluster grid.

use umbra_core::math::{Aabb, Mat4, Vec3, EPSILON};
use umbra_data::CameraState;

/// Default number of cluster columns.
pub const CLUSTER_GRID_X: u32 = 16;
/// Default number of cluster rows.
pub const CLUSTER_GRID_Y: u32 = 9;
/// Default number of depth slices.
pub const CLUSTER_GRID_Z: u32 = 24;
/// Default per-cluster light cap.
pub const MAX_LIGHTS_PER_CLUSTER: u32 = 128;
/// Default cap of the global light list.
pub const MAX_GLOBAL_LIGHTS: u32 = 16;

/// Grid resolution and light list capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Columns across the screen.
    pub grid_x: u32,
    /// Rows down the screen.
    pub grid_y: u32,
    /// Exponential depth slices.
    pub grid_z: u32,
    /// Capacity of each cluster's light list.
    pub max_lights_per_cluster: u32,
    /// Capacity of the global light list.
    pub max_global_lights: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            grid_x: CLUSTER_GRID_X,
            grid_y: CLUSTER_GRID_Y,
            grid_z: CLUSTER_GRID_Z,
            max_lights_per_cluster: MAX_LIGHTS_PER_CLUSTER,
            max_global_lights: MAX_GLOBAL_LIGHTS,
        }
    }
}

impl ClusterConfig {
    /// A config with the default light caps and the given grid size.
    pub fn with_grid(grid_x: u32, grid_y: u32, grid_z: u32) -> Self {
        Self {
            grid_x: grid_x.max(1),
            grid_y: grid_y.max(1),
            grid_z: grid_z.max(1),
            ..Self::default()
        }
    }

    /// Total number of clusters.
    #[inline]
    pub fn cluster_count(&self) -> usize {
        (self.grid_x * self.grid_y * self.grid_z) as usize
    }
}

/// An inclusive 3D range of cluster coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterRange {
    /// Smallest `x, y, z`.
    pub min: [u32; 3],
    /// Largest `x, y, z`.
    pub max: [u32; 3],
}

/// Per-cell view-space bounds of the cluster grid for one camera projection.
///
/// Depth slices are exponential: slice `z` starts at `near * (far / near)^(z / Z)`.
/// Tile `(0, 0)` is the top-left corner of the screen.
#[derive(Debug, Clone)]
pub struct ClusterGrid {
    config: ClusterConfig,
    version: u64,
    near: f32,
    far: f32,
    projection: Mat4,
    depth_multiplier: f32,
    depth_subtractor: f32,
    aabbs: Vec<Aabb>,
    // Union of the x extents of every cell in a (slice, column), indexed `z * X + x`.
    column_spans: Vec<(f32, f32)>,
    // Union of the y extents of every cell in a (slice, row), indexed `z * Y + y`.
    row_spans: Vec<(f32, f32)>,
}

impl ClusterGrid {
    /// Builds the grid for the camera's current projection.
    pub fn new(config: ClusterConfig, camera: &CameraState) -> Self {
        let near = camera.projection().near;
        let far = camera.projection().far;
        let projection = camera.projection_matrix();
        let log_ratio = (far / near).log2();
        let depth_multiplier = config.grid_z as f32 / log_ratio;
        let depth_subtractor = config.grid_z as f32 * near.log2() / log_ratio;

        let mut grid = Self {
            config,
            version: camera.version(),
            near,
            far,
            projection,
            depth_multiplier,
            depth_subtractor,
            aabbs: Vec::with_capacity(config.cluster_count()),
            column_spans: Vec::new(),
            row_spans: Vec::new(),
        };
        grid.build_cells(&projection.inverse().unwrap_or(Mat4::IDENTITY));
        log::debug!(
            "Cluster grid rebuilt: {}x{}x{} (near {}, far {}, camera v{})",
            config.grid_x,
            config.grid_y,
            config.grid_z,
            near,
            far,
            grid.version
        );
        grid
    }

    fn build_cells(&mut self, inverse_projection: &Mat4) {
        let (nx, ny, nz) = (self.config.grid_x, self.config.grid_y, self.config.grid_z);
        // Point on the near plane behind each tile corner; scaled to reach any depth.
        let ray = |ndc_x: f32, ndc_y: f32| inverse_projection.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let at_depth = |p: Vec3, depth: f32| p * (depth / -p.z);

        for z in 0..nz {
            let (d0, d1) = (self.slice_depth(z), self.slice_depth(z + 1));
            for y in 0..ny {
                let top = 1.0 - 2.0 * y as f32 / ny as f32;
                let bottom = 1.0 - 2.0 * (y + 1) as f32 / ny as f32;
                for x in 0..nx {
                    let left = -1.0 + 2.0 * x as f32 / nx as f32;
                    let right = -1.0 + 2.0 * (x + 1) as f32 / nx as f32;
                    let corners = [
                        ray(left, top),
                        ray(right, top),
                        ray(left, bottom),
                        ray(right, bottom),
                    ];
                    self.aabbs.push(Aabb::from_points(
                        corners
                            .iter()
                            .flat_map(|&c| [at_depth(c, d0), at_depth(c, d1)]),
                    ));
                }
            }
        }

        self.column_spans = vec![(f32::INFINITY, f32::NEG_INFINITY); (nz * nx) as usize];
        self.row_spans = vec![(f32::INFINITY, f32::NEG_INFINITY); (nz * ny) as usize];
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let aabb = self.aabbs[self.cluster_index(x, y, z)];
                    let column = &mut self.column_spans[(z * nx + x) as usize];
                    column.0 = column.0.min(aabb.min.x);
                    column.1 = column.1.max(aabb.max.x);
                    let row = &mut self.row_spans[(z * ny + y) as usize];
                    row.0 = row.0.min(aabb.min.y);
                    row.1 = row.1.max(aabb.max.y);
                }
            }
        }
    }

    /// Rebuilds the cells if the camera's projection changed since they were
    /// built. Returns `true` if a rebuild happened.
    pub fn rebuild_if_needed(&mut self, camera: &CameraState) -> bool {
        if self.is_current(camera) {
            return false;
        }
        *self = Self::new(self.config, camera);
        true
    }

    /// Returns `true` if the cells match the camera's projection version.
    #[inline]
    pub fn is_current(&self, camera: &CameraState) -> bool {
        self.version == camera.version()
    }

    /// The grid configuration.
    #[inline]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The camera version the cells were built for.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Linear index of cluster `(x, y, z)`.
    #[inline]
    pub fn cluster_index(&self, x: u32, y: u32, z: u32) -> usize {
        (x + self.config.grid_x * (y + self.config.grid_y * z)) as usize
    }

    /// View distance at which slice `z` begins.
    #[inline]
    pub fn slice_depth(&self, z: u32) -> f32 {
        self.near * (self.far / self.near).powf(z as f32 / self.config.grid_z as f32)
    }

    /// The depth slice containing a positive view distance:
    /// `clamp(log2(depth) * multiplier - subtractor, 0, Z - 1)`.
    #[inline]
    pub fn depth_slice(&self, depth: f32) -> u32 {
        let slice = depth.max(self.near).log2() * self.depth_multiplier - self.depth_subtractor;
        (slice.max(0.0) as u32).min(self.config.grid_z - 1)
    }

    /// The multiplier of the depth slice formula.
    #[inline]
    pub fn depth_multiplier(&self) -> f32 {
        self.depth_multiplier
    }

    /// The subtractor of the depth slice formula.
    #[inline]
    pub fn depth_subtractor(&self) -> f32 {
        self.depth_subtractor
    }

    /// Near plane distance.
    #[inline]
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Far plane distance.
    #[inline]
    pub fn far(&self) -> f32 {
        self.far
    }

    /// View-space bounds of the cluster at linear index `index`.
    #[inline]
    pub fn aabb(&self, index: usize) -> &Aabb {
        &self.aabbs[index]
    }

    /// Every cluster's bounds, in linear index order.
    #[inline]
    pub fn aabbs(&self) -> &[Aabb] {
        &self.aabbs
    }

    /// The clusters a view-space sphere may touch, or `None` if it lies
    /// outside the depth range.
    ///
    /// The x and y ranges come from the sphere's screen extent clamped to the
    /// grid. Cell bounds reach past the screen edges, so a sphere projected
    /// off screen still gets the border tiles; [`widen_at_slice`] completes
    /// the range.
    ///
    /// [`widen_at_slice`]: ClusterGrid::widen_at_slice
    pub fn candidate_range(&self, center: Vec3, radius: f32) -> Option<ClusterRange> {
        if center.z > -self.near + radius || center.z < -self.far - radius {
            return None;
        }
        let (nx, ny) = (self.config.grid_x, self.config.grid_y);
        let (mut x0, mut x1, mut y0, mut y1) = (0, nx - 1, 0, ny - 1);

        if let Some((min, max)) = self.project_bounds(center, radius) {
            let tile = |t: f32, n: u32| ((t * n as f32).max(0.0) as u32).min(n - 1);
            x0 = tile((min[0] + 1.0) * 0.5, nx);
            x1 = tile((max[0] + 1.0) * 0.5, nx);
            y0 = tile((1.0 - max[1]) * 0.5, ny);
            y1 = tile((1.0 - min[1]) * 0.5, ny);
        }

        let nearest = (-center.z - radius).max(self.near);
        let farthest = (-center.z + radius).min(self.far);
        let z0 = self.depth_slice(nearest).saturating_sub(1);
        let z1 = (self.depth_slice(farthest) + 1).min(self.config.grid_z - 1);
        Some(ClusterRange {
            min: [x0, y0, z0],
            max: [x1, y1, z1],
        })
    }

    /// Widens a candidate range at slice `z` to every column and row whose
    /// cells overlap the sphere's extent.
    ///
    /// Cell bounds enclose a frustum-shaped cell, so they reach into the
    /// screen area of neighboring tiles.
    pub fn widen_at_slice(
        &self,
        range: &ClusterRange,
        z: u32,
        center: Vec3,
        radius: f32,
    ) -> ([u32; 2], [u32; 2]) {
        let (nx, ny) = (self.config.grid_x, self.config.grid_y);
        let widen = |spans: &[(f32, f32)], lo: f32, hi: f32, mut first: u32, mut last: u32| {
            for (i, &(min, max)) in spans.iter().enumerate() {
                if max >= lo && min <= hi {
                    first = first.min(i as u32);
                    last = last.max(i as u32);
                }
            }
            [first, last]
        };
        let columns = &self.column_spans[(z * nx) as usize..((z + 1) * nx) as usize];
        let rows = &self.row_spans[(z * ny) as usize..((z + 1) * ny) as usize];
        (
            widen(columns, center.x - radius, center.x + radius, range.min[0], range.max[0]),
            widen(rows, center.y - radius, center.y + radius, range.min[1], range.max[1]),
        )
    }

    // NDC x/y bounds of the sphere's view-space box, or `None` if part of it
    // is behind the camera.
    fn project_bounds(&self, center: Vec3, radius: f32) -> Option<([f32; 2], [f32; 2])> {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for corner in 0..8u32 {
            let offset = Vec3::new(
                if corner & 1 == 0 { -radius } else { radius },
                if corner & 2 == 0 { -radius } else { radius },
                if corner & 4 == 0 { -radius } else { radius },
            );
            let clip = self.projection * (center + offset).extend(1.0);
            if clip.w <= EPSILON {
                return None;
            }
            let (x, y) = (clip.x / clip.w, clip.y / clip.w);
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::FRAC_PI_2;
    use umbra_core::renderer::Extent2D;
    use umbra_data::camera::Projection;

    fn camera(near: f32, far: f32) -> CameraState {
        CameraState::new(
            Projection {
                fov_y: FRAC_PI_2,
                aspect: 1.0,
                near,
                far,
            },
            Extent2D::new(64, 64),
        )
        .unwrap()
    }

    #[test]
    fn test_exponential_slices() {
        let grid = ClusterGrid::new(ClusterConfig::with_grid(1, 1, 4), &camera(1.0, 16.0));
        assert!((grid.slice_depth(0) - 1.0).abs() < 1e-5);
        assert!((grid.slice_depth(2) - 4.0).abs() < 1e-4);
        assert!((grid.slice_depth(4) - 16.0).abs() < 1e-3);
        assert_eq!(grid.depth_slice(1.5), 0);
        assert_eq!(grid.depth_slice(2.5), 1);
        assert_eq!(grid.depth_slice(9.0), 3);
        assert_eq!(grid.depth_slice(0.2), 0);
        assert_eq!(grid.depth_slice(1000.0), 3);
    }

    #[test]
    fn test_cell_bounds_cover_tile_frustum() {
        let grid = ClusterGrid::new(ClusterConfig::with_grid(2, 1, 1), &camera(1.0, 2.0));
        let left = grid.aabb(grid.cluster_index(0, 0, 0));
        assert!((left.min.x + 2.0).abs() < 1e-4);
        assert!(left.max.x.abs() < 1e-4);
        assert!((left.min.z + 2.0).abs() < 1e-4);
        assert!((left.max.z + 1.0).abs() < 1e-4);
        let right = grid.aabb(grid.cluster_index(1, 0, 0));
        assert!((right.max.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_top_row_is_tile_zero() {
        let grid = ClusterGrid::new(ClusterConfig::with_grid(1, 2, 1), &camera(1.0, 2.0));
        assert!(grid.aabb(grid.cluster_index(0, 0, 0)).min.y > -1e-4);
        assert!(grid.aabb(grid.cluster_index(0, 1, 0)).max.y < 1e-4);
    }

    #[test]
    fn test_candidate_range_rejects() {
        let grid = ClusterGrid::new(ClusterConfig::default(), &camera(1.0, 100.0));
        assert!(grid.candidate_range(Vec3::new(0.0, 0.0, -0.5), 0.2).is_none());
        assert!(grid.candidate_range(Vec3::new(0.0, 0.0, -0.5), 0.6).is_some());
        assert!(grid.candidate_range(Vec3::new(0.0, 0.0, -120.0), 5.0).is_none());
        let off_screen = grid.candidate_range(Vec3::new(50.0, 0.0, -10.0), 1.0).unwrap();
        assert_eq!(off_screen.min[0], CLUSTER_GRID_X - 1);
        let behind = grid.candidate_range(Vec3::new(0.0, 0.0, 1.0), 3.0).unwrap();
        assert_eq!(behind.min[0], 0);
        assert_eq!(behind.max[0], CLUSTER_GRID_X - 1);
    }

    #[test]
    fn test_rebuild_follows_camera_version() {
        let mut cam = camera(1.0, 100.0);
        let mut grid = ClusterGrid::new(ClusterConfig::default(), &cam);
        assert!(!grid.rebuild_if_needed(&cam));
        cam.set_projection(Projection {
            far: 50.0,
            ..*cam.projection()
        });
        assert!(grid.rebuild_if_needed(&cam));
        assert_eq!(grid.far(), 50.0);
        assert_eq!(grid.aabbs().len(), ClusterConfig::default().cluster_count());
    }
}

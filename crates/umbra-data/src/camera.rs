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

//! Camera matrices and the version counter that invalidates cluster geometry.

use umbra_core::math::{Mat4, Vec3};
use umbra_core::renderer::{CameraUniform, Extent2D};

/// Perspective projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

/// The camera observed by the renderer.
///
/// [`version`](CameraState::version) increases whenever the projection
/// parameters change, never when only the view moves.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    projection: Projection,
    projection_matrix: Mat4,
    view: Mat4,
    position: Vec3,
    viewport: Extent2D,
    version: u64,
}

impl CameraState {
    /// Creates a camera at the origin looking down `-Z`.
    ///
    /// Returns `None` if the projection parameters are degenerate.
    pub fn new(projection: Projection, viewport: Extent2D) -> Option<Self> {
        let projection_matrix = Self::build_projection(&projection)?;
        Some(Self {
            projection,
            projection_matrix,
            view: Mat4::IDENTITY,
            position: Vec3::ZERO,
            viewport,
            version: 1,
        })
    }

    fn build_projection(p: &Projection) -> Option<Mat4> {
        if !(p.near > 0.0 && p.far > p.near) {
            return None;
        }
        Mat4::perspective_rh_zo(p.fov_y, p.aspect, p.near, p.far)
    }

    /// Replaces the projection parameters. Bumps the version if they changed.
    ///
    /// Returns `false`, leaving the camera untouched, if the parameters are
    /// degenerate.
    pub fn set_projection(&mut self, projection: Projection) -> bool {
        if projection == self.projection {
            return true;
        }
        match Self::build_projection(&projection) {
            Some(matrix) => {
                self.projection = projection;
                self.projection_matrix = matrix;
                self.version += 1;
                true
            }
            None => false,
        }
    }

    /// Sets the view from a camera position, a target and an up vector.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) -> bool {
        match Mat4::look_at_rh(eye, target, up) {
            Some(view) => {
                self.view = view;
                self.position = eye;
                true
            }
            None => false,
        }
    }

    /// Sets the world to view matrix directly.
    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.position = view
            .inverse()
            .map(|inverse| inverse.translation())
            .unwrap_or(Vec3::ZERO);
    }

    /// Resizes the viewport, keeping the aspect ratio in sync.
    pub fn set_viewport(&mut self, viewport: Extent2D) {
        self.viewport = viewport;
        let aspect = viewport.width.max(1) as f32 / viewport.height.max(1) as f32;
        let projection = Projection {
            aspect,
            ..self.projection
        };
        self.set_projection(projection);
    }

    /// Incremented whenever the projection parameters change.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The projection parameters.
    #[inline]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// View to clip space.
    #[inline]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// World to view space.
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// World to clip space.
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view
    }

    /// The render target size.
    #[inline]
    pub fn viewport(&self) -> Extent2D {
        self.viewport
    }

    /// The `camera` uniform block for this state.
    pub fn uniform(&self) -> CameraUniform {
        CameraUniform::new(
            &self.view,
            &self.projection_matrix,
            self.position,
            self.projection.near,
            self.projection.far,
            [self.viewport.width as f32, self.viewport.height as f32],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::FRAC_PI_2;

    fn projection() -> Projection {
        Projection {
            fov_y: FRAC_PI_2,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }

    #[test]
    fn test_version_tracks_projection_only() {
        let mut camera = CameraState::new(projection(), Extent2D::new(64, 64)).unwrap();
        let v = camera.version();
        camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.version(), v);
        assert!(camera.set_projection(projection()));
        assert_eq!(camera.version(), v);
        assert!(camera.set_projection(Projection {
            far: 50.0,
            ..projection()
        }));
        assert_eq!(camera.version(), v + 1);
    }

    #[test]
    fn test_degenerate_projection_is_rejected() {
        assert!(CameraState::new(
            Projection {
                near: 0.0,
                ..projection()
            },
            Extent2D::new(1, 1)
        )
        .is_none());
        let mut camera = CameraState::new(projection(), Extent2D::new(8, 8)).unwrap();
        assert!(!camera.set_projection(Projection {
            far: 0.05,
            ..projection()
        }));
        assert_eq!(camera.projection().far, 100.0);
    }

    #[test]
    fn test_viewport_resize_updates_aspect() {
        let mut camera = CameraState::new(projection(), Extent2D::new(64, 64)).unwrap();
        camera.set_viewport(Extent2D::new(128, 64));
        assert_eq!(camera.projection().aspect, 2.0);
        assert_eq!(camera.version(), 2);
    }
}

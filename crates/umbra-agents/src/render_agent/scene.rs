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

//! The scene a [`RenderAgent`](super::RenderAgent) draws.

use umbra_core::renderer::{DisposalSender, RenderSettings, TextureId};
use umbra_data::assets::{MaterialRegistry, MeshRegistry};
use umbra_data::{CameraState, InstanceLibrary, LightStore};

/// Everything the application owns and the renderer reads each frame.
///
/// The instance library and mesh registry hold device resources; build them
/// with the agent's [`disposal`](super::RenderAgent::disposal) sender so that
/// replaced buffers are destroyed on the render thread.
#[derive(Debug)]
pub struct RenderScene {
    /// The active camera. Without one every stage skips.
    pub camera: Option<CameraState>,
    /// Per-frame toggles. Without them every stage skips.
    pub settings: Option<RenderSettings>,
    /// Render instances grouped by mesh and material.
    pub instances: InstanceLibrary,
    /// The lights.
    pub lights: LightStore,
    /// Uploaded meshes.
    pub meshes: MeshRegistry,
    /// Materials.
    pub materials: MaterialRegistry,
    /// Where the composite stage copies the finished image, if anywhere.
    pub output: Option<TextureId>,
}

impl RenderScene {
    /// An empty scene with default settings and no camera.
    pub fn new(disposal: DisposalSender) -> Self {
        Self {
            camera: None,
            settings: Some(RenderSettings::default()),
            instances: InstanceLibrary::new(disposal.clone()),
            lights: LightStore::new(),
            meshes: MeshRegistry::new(disposal),
            materials: MaterialRegistry::new(),
            output: None,
        }
    }

    /// Sets the camera.
    pub fn with_camera(mut self, camera: CameraState) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Sets the settings.
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

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

//! The explicit state threaded through every stage of a frame.

use super::framebuffer::Framebuffer;
use super::hiz::HiZBuffer;
use super::programs::ProgramLibrary;
use crate::light_lane::ClusterBuffers;
use ahash::AHashMap;
use std::sync::Arc;
use umbra_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, CameraUniform, CommandEncoder, DeferredDisposal,
    DisposalSender, Extent2D, GraphicsDevice, MaterialId, MaterialUniform, PipelineUniform,
    RenderSettings, RenderStats, ResourceError, TextureId,
};
use umbra_data::assets::{MaterialRegistry, MeshRegistry};
use umbra_data::{CameraState, InstanceLibrary, LightSnapshot};

/// The scene as seen by one frame. Everything here is read-only.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// The camera, if one is active. Stages skip without it.
    pub camera: Option<&'a CameraState>,
    /// The frame's settings. Stages skip without them.
    pub settings: Option<&'a RenderSettings>,
    /// Instance groups, already synced to the device.
    pub instances: &'a InstanceLibrary,
    /// The lights, captured at the start of the frame.
    pub lights: &'a Arc<LightSnapshot>,
    /// Uploaded meshes.
    pub meshes: &'a MeshRegistry,
    /// Materials.
    pub materials: &'a MaterialRegistry,
    /// Presentation target of the composite stage, if any.
    pub output: Option<TextureId>,
}

impl<'a> FrameInputs<'a> {
    /// The camera and settings, or `None` if either is missing.
    pub fn camera_and_settings(&self) -> Option<(&'a CameraState, &'a RenderSettings)> {
        self.camera.zip(self.settings)
    }
}

fn uniform_buffer(
    device: &dyn GraphicsDevice,
    label: &'static str,
    size: usize,
) -> Result<BufferId, ResourceError> {
    device.create_buffer(&BufferDescriptor::new(
        label,
        size as u64,
        BufferUsage::UNIFORM | BufferUsage::COPY_DST,
    ))
}

/// Device resources that live across frames and are shared by the stages.
#[derive(Debug)]
pub struct FrameResources {
    /// Color, depth and WBOIT targets.
    pub framebuffer: Framebuffer,
    /// The depth pyramid.
    pub hiz: HiZBuffer,
    /// Cluster tables, created by the clustering stage on first use.
    pub clusters: Option<ClusterBuffers>,
    /// The `camera` block.
    pub camera_uniform: BufferId,
    /// The `pipeline` block.
    pub pipeline_uniform: BufferId,
    material_uniforms: AHashMap<MaterialId, BufferId>,
    // Set by the HiZ cull stage once it has dispatched this frame.
    hiz_culled: bool,
    /// Where replaced resources go.
    pub disposal: DisposalSender,
}

impl FrameResources {
    /// Creates the targets at `size` and the shared uniform blocks.
    pub fn new(
        device: &dyn GraphicsDevice,
        size: Extent2D,
        disposal: DisposalSender,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            framebuffer: Framebuffer::new(device, size, disposal.clone())?,
            hiz: HiZBuffer::new(disposal.clone()),
            clusters: None,
            camera_uniform: uniform_buffer(device, "camera", std::mem::size_of::<CameraUniform>())?,
            pipeline_uniform: uniform_buffer(
                device,
                "pipeline",
                std::mem::size_of::<PipelineUniform>(),
            )?,
            material_uniforms: AHashMap::new(),
            hiz_culled: false,
            disposal,
        })
    }

    /// Brings the targets and uniform blocks up to date with the frame.
    ///
    /// Resizes the framebuffer and pyramid to the camera viewport, writes the
    /// camera and pipeline blocks, and writes one material block per material.
    pub fn prepare(
        &mut self,
        device: &dyn GraphicsDevice,
        inputs: &FrameInputs<'_>,
        frame_number: u64,
    ) -> Result<(), ResourceError> {
        self.hiz_culled = false;
        if let Some(camera) = inputs.camera {
            let viewport = camera.viewport();
            self.framebuffer.resize(device, viewport)?;
            self.hiz.ensure_size(device, viewport)?;
            device.write_buffer(self.camera_uniform, 0, bytemuck::bytes_of(&camera.uniform()))?;
        }
        if let Some(settings) = inputs.settings {
            let (zenith, horizon) = settings
                .skybox
                .map(|sky| (sky.zenith.to_array(), sky.horizon.to_array()))
                .unwrap_or_default();
            let pipeline = PipelineUniform {
                clear_color: settings.clear_color.to_array(),
                skybox_zenith: zenith,
                skybox_horizon: horizon,
                frame: frame_number as u32,
                _padding: [0; 3],
            };
            device.write_buffer(self.pipeline_uniform, 0, bytemuck::bytes_of(&pipeline))?;
        }

        self.material_uniforms.retain(|id, buffer| {
            let live = inputs.materials.get(*id).is_some();
            if !live {
                self.disposal.dispose(DeferredDisposal::Buffer(*buffer));
            }
            live
        });
        for (id, material) in inputs.materials.iter() {
            let buffer = match self.material_uniforms.get(&id) {
                Some(buffer) => *buffer,
                None => {
                    let buffer =
                        uniform_buffer(device, "material", std::mem::size_of::<MaterialUniform>())?;
                    self.material_uniforms.insert(id, buffer);
                    buffer
                }
            };
            let uniform = MaterialUniform::from(material.base_color);
            device.write_buffer(buffer, 0, bytemuck::bytes_of(&uniform))?;
        }
        Ok(())
    }

    /// Records that the HiZ survivor lists and counters are current.
    pub fn mark_hiz_culled(&mut self) {
        self.hiz_culled = true;
    }

    /// Whether the HiZ cull stage has run since the last [`prepare`](Self::prepare).
    #[inline]
    pub fn hiz_culled(&self) -> bool {
        self.hiz_culled
    }

    /// The `material` block of a material, once prepared.
    pub fn material_uniform(&self, id: MaterialId) -> Option<BufferId> {
        self.material_uniforms.get(&id).copied()
    }
}

impl Drop for FrameResources {
    fn drop(&mut self) {
        self.disposal
            .dispose(DeferredDisposal::Buffer(self.camera_uniform));
        self.disposal
            .dispose(DeferredDisposal::Buffer(self.pipeline_uniform));
        for buffer in self.material_uniforms.values() {
            self.disposal.dispose(DeferredDisposal::Buffer(*buffer));
        }
    }
}

/// Everything a stage may touch while recording.
///
/// Built by the agent for each stage; the encoder is submitted after the
/// stage returns.
pub struct RenderContext<'a> {
    /// The device, for resource creation, uploads and query reads.
    pub device: &'a dyn GraphicsDevice,
    /// Records this stage's commands.
    pub encoder: &'a mut dyn CommandEncoder,
    /// The scene.
    pub frame: &'a FrameInputs<'a>,
    /// Shared device resources.
    pub resources: &'a mut FrameResources,
    /// Compiled programs.
    pub programs: &'a ProgramLibrary,
    /// Statistics of the frame being recorded.
    pub stats: &'a mut RenderStats,
}

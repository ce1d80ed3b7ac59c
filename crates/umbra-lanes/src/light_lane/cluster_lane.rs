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

//! The light clustering stage and the device tables it fills.

use super::assignment::ClusterAssignment;
use super::error::ClusterError;
use super::grid::{ClusterConfig, ClusterGrid};
use super::pool::{ClusterFrame, ClusterWorkerPool};
use crate::render_lane::{RenderContext, RenderStage, StageId, StageOutcome};
use std::sync::Arc;
use umbra_core::lane::{Lane, LaneError};
use umbra_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, BuiltinBuffer, CompiledProgram, DeferredDisposal,
    DisposalSender, GpuLight, GraphicsDevice, LightClusterUniform, RenderPass, ResourceError,
    UniformBlockSlot,
};
use umbra_core::Stopwatch;
use umbra_data::{CameraState, LightSnapshot};

fn storage(device: &dyn GraphicsDevice, label: &'static str, size: u64) -> Result<BufferId, ResourceError> {
    device.create_buffer(&BufferDescriptor::new(
        label,
        size.max(4),
        BufferUsage::STORAGE | BufferUsage::COPY_DST,
    ))
}

/// The device-side cluster tables read by the lit programs.
#[derive(Debug)]
pub struct ClusterBuffers {
    uniform: BufferId,
    light_parameters: BufferId,
    light_capacity: usize,
    cluster_indices: BufferId,
    cluster_counts: BufferId,
    global_indices: BufferId,
    disposal: DisposalSender,
}

impl ClusterBuffers {
    /// Allocates the tables for every cluster of `config`.
    pub fn new(
        device: &dyn GraphicsDevice,
        config: &ClusterConfig,
        disposal: DisposalSender,
    ) -> Result<Self, ResourceError> {
        let clusters = config.cluster_count() as u64;
        let light_capacity = 16;
        Ok(Self {
            uniform: device.create_buffer(&BufferDescriptor::new(
                "light_clusters",
                std::mem::size_of::<LightClusterUniform>() as u64,
                BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            ))?,
            light_parameters: storage(
                device,
                "light_parameters",
                (light_capacity * std::mem::size_of::<GpuLight>()) as u64,
            )?,
            light_capacity,
            cluster_indices: storage(
                device,
                "cluster_light_indices",
                clusters * config.max_lights_per_cluster as u64 * 4,
            )?,
            cluster_counts: storage(device, "cluster_light_counts", clusters * 4)?,
            global_indices: storage(device, "global_light_indices", config.max_global_lights as u64 * 4)?,
            disposal,
        })
    }

    /// Uploads this frame's light parameters and cluster lists.
    ///
    /// The light parameter buffer grows to the snapshot's slot count; the
    /// list buffers never change size.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        grid: &ClusterGrid,
        snapshot: &LightSnapshot,
        assignment: &ClusterAssignment,
    ) -> Result<(), ResourceError> {
        let parameters = snapshot.gpu_parameters();
        if parameters.len() > self.light_capacity {
            let capacity = parameters.len().next_power_of_two();
            let buffer = storage(
                device,
                "light_parameters",
                (capacity * std::mem::size_of::<GpuLight>()) as u64,
            )?;
            self.disposal
                .dispose(DeferredDisposal::Buffer(std::mem::replace(&mut self.light_parameters, buffer)));
            self.light_capacity = capacity;
            log::debug!("Light parameter buffer grown to {} slots", capacity);
        }
        device.write_buffer(self.light_parameters, 0, bytemuck::cast_slice(&parameters))?;
        device.write_buffer(
            self.cluster_counts,
            0,
            bytemuck::cast_slice(&assignment.counts_snapshot()),
        )?;
        device.write_buffer(
            self.cluster_indices,
            0,
            bytemuck::cast_slice(&assignment.indices_snapshot()),
        )?;
        let globals = assignment.global_snapshot();
        if !globals.is_empty() {
            device.write_buffer(self.global_indices, 0, bytemuck::cast_slice(&globals))?;
        }

        let config = grid.config();
        let uniform = LightClusterUniform {
            grid: [
                config.grid_x,
                config.grid_y,
                config.grid_z,
                config.max_lights_per_cluster,
            ],
            depth_slicing: [
                grid.depth_multiplier(),
                grid.depth_subtractor(),
                grid.near(),
                grid.far(),
            ],
            global_count: assignment.global_count(),
            light_slots: snapshot.slot_count() as u32,
            _padding: [0; 2],
        };
        device.write_buffer(self.uniform, 0, bytemuck::bytes_of(&uniform))
    }

    /// Binds every table the program declares.
    pub fn bind(&self, pass: &mut dyn RenderPass, program: &CompiledProgram) {
        if program.uniform_block(UniformBlockSlot::LightClusters).is_some() {
            pass.bind_uniform_block(UniformBlockSlot::LightClusters, self.uniform);
        }
        for (builtin, buffer) in [
            (BuiltinBuffer::LightParameters, self.light_parameters),
            (BuiltinBuffer::ClusterLightIndices, self.cluster_indices),
            (BuiltinBuffer::ClusterLightCounts, self.cluster_counts),
            (BuiltinBuffer::GlobalLightIndices, self.global_indices),
        ] {
            if program.buffer_location(builtin).is_some() {
                pass.bind_buffer(builtin, buffer);
            }
        }
    }

    /// The `light_clusters` uniform block.
    pub fn uniform(&self) -> BufferId {
        self.uniform
    }

    /// The light parameter array.
    pub fn light_parameters(&self) -> BufferId {
        self.light_parameters
    }

    /// Slots currently allocated in the light parameter array.
    pub fn light_capacity(&self) -> usize {
        self.light_capacity
    }

    /// Per-cluster light index lists.
    pub fn cluster_indices(&self) -> BufferId {
        self.cluster_indices
    }

    /// Per-cluster light counts.
    pub fn cluster_counts(&self) -> BufferId {
        self.cluster_counts
    }

    /// The global light list.
    pub fn global_indices(&self) -> BufferId {
        self.global_indices
    }
}

impl Drop for ClusterBuffers {
    fn drop(&mut self) {
        for buffer in [
            self.uniform,
            self.light_parameters,
            self.cluster_indices,
            self.cluster_counts,
            self.global_indices,
        ] {
            self.disposal.dispose(DeferredDisposal::Buffer(buffer));
        }
    }
}

/// Result of one clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterSummary {
    /// Lights assigned to at least one cluster.
    pub lights_clustered: u32,
    /// Entries in the global list, at most the cap.
    pub global_lights: u32,
    /// Clusters whose list hit the cap.
    pub saturated_clusters: u32,
}

/// Partitions the view frustum into clusters and assigns every light to the
/// clusters it touches.
///
/// The grid is rebuilt when the camera's projection version changes; the
/// assignment runs every frame on the worker pool over an immutable light
/// snapshot.
#[derive(Debug)]
pub struct ClusterLightsLane {
    config: ClusterConfig,
    grid: Option<Arc<ClusterGrid>>,
    assignment: Arc<ClusterAssignment>,
    pool: ClusterWorkerPool,
}

impl ClusterLightsLane {
    /// Creates the lane with `workers` clustering threads.
    ///
    /// ## Errors
    /// * `ClusterError::Spawn` - If a worker thread cannot be spawned.
    pub fn new(config: ClusterConfig, workers: usize) -> Result<Self, ClusterError> {
        Ok(Self {
            config,
            grid: None,
            assignment: Arc::new(ClusterAssignment::new(&config)),
            pool: ClusterWorkerPool::new(workers)?,
        })
    }

    /// The grid resolution and caps.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The grid of the last clustered camera.
    pub fn grid(&self) -> Option<&ClusterGrid> {
        self.grid.as_deref()
    }

    /// The lists filled by the last clustering pass.
    pub fn assignment(&self) -> &ClusterAssignment {
        &self.assignment
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Replaces the worker pool if `workers` differs from the current count.
    /// Returns `true` if the pool was replaced.
    pub fn set_worker_count(&mut self, workers: usize) -> Result<bool, ClusterError> {
        if workers == self.pool.worker_count() {
            return Ok(false);
        }
        self.pool = ClusterWorkerPool::new(workers)?;
        Ok(true)
    }

    /// Rebuilds the grid if the camera changed, then assigns every light of
    /// `snapshot` to the clusters it overlaps.
    pub fn cluster(
        &mut self,
        camera: &CameraState,
        snapshot: &Arc<LightSnapshot>,
    ) -> Result<ClusterSummary, ClusterError> {
        let grid = match &self.grid {
            Some(grid) if grid.is_current(camera) => Arc::clone(grid),
            _ => {
                let grid = Arc::new(ClusterGrid::new(self.config, camera));
                log::debug!(
                    "Cluster grid rebuilt for camera version {} ({} clusters)",
                    camera.version(),
                    self.config.cluster_count()
                );
                self.grid = Some(Arc::clone(&grid));
                grid
            }
        };

        self.assignment.clear();
        let frame = Arc::new(ClusterFrame {
            snapshot: Arc::clone(snapshot),
            grid,
            view: camera.view(),
            assignment: Arc::clone(&self.assignment),
        });
        self.pool.dispatch_and_wait(frame)?;

        Ok(ClusterSummary {
            lights_clustered: self.assignment.clustered_lights(),
            global_lights: self.assignment.global_count(),
            saturated_clusters: self.assignment.saturated_clusters() as u32,
        })
    }
}

impl Lane for ClusterLightsLane {
    fn strategy_name(&self) -> &'static str {
        "ClusterLights"
    }
}

impl RenderStage for ClusterLightsLane {
    fn stage_id(&self) -> StageId {
        StageId::ClusterLights
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>) -> Result<StageOutcome, LaneError> {
        let (Some(camera), Some(settings)) = (ctx.frame.camera, ctx.frame.settings) else {
            return Ok(StageOutcome::Skipped);
        };
        if self
            .set_worker_count(settings.cluster_workers)
            .map_err(LaneError::execution)?
        {
            log::info!("Cluster worker count changed to {}", settings.cluster_workers);
        }

        let timer = Stopwatch::new();
        let summary = self
            .cluster(camera, ctx.frame.lights)
            .map_err(LaneError::execution)?;

        if ctx.resources.clusters.is_none() {
            let buffers = ClusterBuffers::new(ctx.device, &self.config, ctx.resources.disposal.clone())
                .map_err(LaneError::execution)?;
            ctx.resources.clusters = Some(buffers);
        }
        if let (Some(buffers), Some(grid)) = (ctx.resources.clusters.as_mut(), self.grid.as_deref()) {
            buffers
                .upload(ctx.device, grid, ctx.frame.lights, &self.assignment)
                .map_err(LaneError::execution)?;
        }

        ctx.stats.lights_clustered = summary.lights_clustered;
        ctx.stats.global_lights = summary.global_lights;
        ctx.stats.saturated_clusters = summary.saturated_clusters;
        ctx.stats.cluster_time_ms = timer.elapsed_ms();
        if summary.saturated_clusters > 0 {
            log::debug!(
                "{} clusters saturated at {} lights",
                summary.saturated_clusters,
                self.config.max_lights_per_cluster
            );
        }
        Ok(StageOutcome::Executed)
    }
}

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

//! Defines the RenderAgent, the orchestrator of the render stages.

use super::scene::RenderScene;
use anyhow::{bail, Context};
use std::sync::Arc;
use std::time::Duration;
use umbra_core::renderer::{
    DisposalQueue, DisposalSender, Extent2D, GraphicsDevice, ProgramSource, RenderSettings,
    RenderStats,
};
use umbra_core::Stopwatch;
use umbra_lanes::{
    builtin_source, validate_stage_order, BlendLane, ClusterConfig, ClusterLightsLane,
    CompositeLane, DepthPrePassLane, FrameInputs, FrameResources, Framebuffer, FrustumCullLane,
    HiZCullLane, HiZGenerateLane, OpaqueLane, ProgramLibrary, RenderContext, RenderStage,
    SkyboxLane, StageId, StageOutcome, TransparencyLane,
};

/// What one stage did in the last frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageId,
    /// Its outcome. A stage that returned an error is recorded as skipped.
    pub outcome: StageOutcome,
    /// CPU time spent recording and submitting it, in milliseconds.
    pub time_ms: f32,
}

/// The agent responsible for running the render pipeline.
///
/// Stages run in a fixed order validated at construction. Each stage gets
/// its own encoder, submitted as soon as the stage returns.
pub struct RenderAgent {
    device: Arc<dyn GraphicsDevice>,
    disposal: DisposalQueue,
    cluster_config: ClusterConfig,
    stages: Vec<Box<dyn RenderStage>>,
    // `None` once shut down.
    programs: Option<ProgramLibrary>,
    resources: Option<FrameResources>,
    // --- Frame metrics ---
    stats: RenderStats,
    records: Vec<StageRecord>,
    frame_count: u64,
    last_frame_time: Duration,
}

impl std::fmt::Debug for RenderAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderAgent")
            .field("device", &self.device)
            .field("stages", &self.stage_ids())
            .field("frame_count", &self.frame_count)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl RenderAgent {
    /// Creates an agent running the default pipeline over `device`, with
    /// render targets of `size`.
    ///
    /// ## Errors
    /// Fails if a clustering worker cannot be spawned or the frame resources
    /// cannot be created. Programs that fail to compile are not an error: the
    /// stages that need them skip until [`reload_program`](Self::reload_program)
    /// succeeds.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        config: ClusterConfig,
        size: Extent2D,
    ) -> anyhow::Result<Self> {
        let stages = Self::default_stages(config)?;
        Self::with_stages(device, config, size, stages)
    }

    /// The default pipeline, in [`StageId::PIPELINE`] order.
    pub fn default_stages(config: ClusterConfig) -> anyhow::Result<Vec<Box<dyn RenderStage>>> {
        let workers = RenderSettings::default().cluster_workers;
        let cluster = ClusterLightsLane::new(config, workers)
            .context("failed to start the light clustering workers")?;
        Ok(vec![
            Box::new(cluster),
            Box::new(FrustumCullLane::new()),
            Box::new(DepthPrePassLane::new()),
            Box::new(HiZGenerateLane::new()),
            Box::new(HiZCullLane::new()),
            Box::new(OpaqueLane::new()),
            Box::new(SkyboxLane::new()),
            Box::new(TransparencyLane::new()),
            Box::new(BlendLane::new()),
            Box::new(CompositeLane::new()),
        ])
    }

    /// Creates an agent running `stages` in the given order.
    ///
    /// ## Errors
    /// Fails if a stage appears twice or before one of its dependencies, or
    /// if the frame resources cannot be created.
    pub fn with_stages(
        device: Arc<dyn GraphicsDevice>,
        config: ClusterConfig,
        size: Extent2D,
        stages: Vec<Box<dyn RenderStage>>,
    ) -> anyhow::Result<Self> {
        let ids: Vec<StageId> = stages.iter().map(|s| s.stage_id()).collect();
        validate_stage_order(&ids).context("invalid render stage order")?;

        let disposal = DisposalQueue::new();
        let mut programs = ProgramLibrary::new(disposal.sender());
        programs.load_builtins(device.as_ref(), &config);
        let resources = FrameResources::new(device.as_ref(), size, disposal.sender())
            .context("failed to create frame resources")?;

        let adapter = device.adapter_info();
        log::info!(
            "RenderAgent: {} stages on {} ({}), targets {}x{}",
            stages.len(),
            adapter.name,
            adapter.backend,
            size.width,
            size.height
        );

        Ok(Self {
            device,
            disposal,
            cluster_config: config,
            stages,
            programs: Some(programs),
            resources: Some(resources),
            stats: RenderStats::default(),
            records: Vec::new(),
            frame_count: 0,
            last_frame_time: Duration::ZERO,
        })
    }

    /// Renders one frame of `scene`.
    ///
    /// 1. Destroys the resources released since the last frame.
    /// 2. Uploads dirty instance ranges and grows group buffers.
    /// 3. Resizes the targets to the camera viewport and writes the uniform blocks.
    /// 4. Runs every stage, submitting after each one. The color targets swap
    ///    after the composite stage.
    ///
    /// ## Errors
    /// Fails after [`shutdown`](Self::shutdown), or if a device upload fails.
    /// A failing stage is logged and recorded as skipped.
    pub fn render_frame(&mut self, scene: &mut RenderScene) -> anyhow::Result<&RenderStats> {
        let frame_timer = Stopwatch::new();
        let device = self.device.as_ref();
        let (Some(programs), Some(resources)) = (self.programs.as_ref(), self.resources.as_mut())
        else {
            bail!("RenderAgent::render_frame called after shutdown");
        };

        self.disposal.drain(device);
        scene
            .instances
            .sync(device)
            .context("failed to sync instance groups")?;
        let lights = scene.lights.snapshot();
        let frame = FrameInputs {
            camera: scene.camera.as_ref(),
            settings: scene.settings.as_ref(),
            instances: &scene.instances,
            lights: &lights,
            meshes: &scene.meshes,
            materials: &scene.materials,
            output: scene.output,
        };
        resources
            .prepare(device, &frame, self.frame_count)
            .context("failed to prepare frame resources")?;

        let mut stats = RenderStats {
            frame_number: self.frame_count,
            ..RenderStats::default()
        };
        self.records.clear();
        for stage in &mut self.stages {
            let id = stage.stage_id();
            let timer = Stopwatch::new();
            let mut encoder = device.create_command_encoder(Some(stage.strategy_name()));
            let result = {
                let mut ctx = RenderContext {
                    device,
                    encoder: encoder.as_mut(),
                    frame: &frame,
                    resources: &mut *resources,
                    programs,
                    stats: &mut stats,
                };
                stage.execute(&mut ctx)
            };
            device.submit_command_buffer(encoder.finish());

            let outcome = result.unwrap_or_else(|err| {
                log::error!("RenderAgent: stage {} failed: {}", id, err);
                StageOutcome::Skipped
            });
            if outcome == StageOutcome::Skipped {
                stats.stages_skipped += 1;
                log::debug!("RenderAgent: stage {} skipped", id);
            }
            if id == StageId::Composite && outcome != StageOutcome::Skipped {
                resources.framebuffer.swap();
            }
            self.records.push(StageRecord {
                stage: id,
                outcome,
                time_ms: timer.elapsed_ms(),
            });
        }

        let hiz_ran = resources.hiz_culled();
        for gpu in scene.instances.groups().filter_map(|group| group.gpu()) {
            stats.frustum_survivors += device.query_result(gpu.frustum_query).count_or_zero();
            if hiz_ran {
                stats.hiz_survivors += device.query_result(gpu.hiz_query).count_or_zero();
            }
        }

        self.last_frame_time = frame_timer.elapsed();
        stats.frame_time_ms = frame_timer.elapsed_ms();
        log::debug!(
            "RenderAgent: frame {} in {:.2}ms ({} draws, {}/{} after frustum, {} after HiZ, {} skipped)",
            stats.frame_number,
            stats.frame_time_ms,
            stats.draw_calls,
            stats.frustum_survivors,
            stats.instances_total,
            stats.hiz_survivors,
            stats.stages_skipped
        );
        self.stats = stats;
        self.frame_count += 1;
        Ok(&self.stats)
    }

    /// Recompiles the program under `key`. Returns `true` if it is now loaded.
    pub fn reload_program(&mut self, key: &str, source: &ProgramSource) -> bool {
        match self.programs.as_mut() {
            Some(programs) => programs.reload(self.device.as_ref(), key.to_string(), source),
            None => false,
        }
    }

    /// Recompiles a built-in program from its embedded source.
    pub fn reload_builtin(&mut self, key: &str) -> bool {
        match builtin_source(key, &self.cluster_config) {
            Some(source) => self.reload_program(key, &source),
            None => {
                log::warn!("RenderAgent: no built-in program named '{}'", key);
                false
            }
        }
    }

    /// Destroys resources released through the disposal queue. Returns how
    /// many were destroyed.
    pub fn collect_garbage(&self) -> usize {
        self.disposal.drain(self.device.as_ref())
    }

    /// Stops the clustering workers and releases every device resource the
    /// agent owns. Later calls to [`render_frame`](Self::render_frame) fail.
    pub fn shutdown(&mut self) {
        if self.is_shut_down() {
            return;
        }
        self.stages.clear();
        self.resources = None;
        self.programs = None;
        let released = self.collect_garbage();
        log::info!(
            "RenderAgent: shut down after {} frames ({} resources released)",
            self.frame_count,
            released
        );
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.programs.is_none()
    }

    /// Statistics of the last rendered frame.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Per-stage outcomes of the last rendered frame, in execution order.
    pub fn stage_records(&self) -> &[StageRecord] {
        &self.records
    }

    /// The outcome of `stage` in the last rendered frame.
    pub fn stage_outcome(&self, stage: StageId) -> Option<StageOutcome> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }

    /// The stages, in execution order.
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.stage_id()).collect()
    }

    /// A sender for resources the scene releases. Pass it to the scene's
    /// instance library and mesh registry.
    pub fn disposal(&self) -> DisposalSender {
        self.disposal.sender()
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The render targets, until shutdown.
    pub fn framebuffer(&self) -> Option<&Framebuffer> {
        self.resources.as_ref().map(|r| &r.framebuffer)
    }

    /// The program library, until shutdown.
    pub fn programs(&self) -> Option<&ProgramLibrary> {
        self.programs.as_ref()
    }

    /// Frames rendered since creation.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Wall-clock time of the last `render_frame`.
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }
}

impl Drop for RenderAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

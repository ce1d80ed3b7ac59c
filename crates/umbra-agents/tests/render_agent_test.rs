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

use std::sync::Arc;
use umbra_agents::{RenderAgent, RenderScene};
use umbra_core::math::{LinearRgba, Mat4, Vec3, FRAC_PI_2};
use umbra_core::renderer::{
    Extent2D, GraphicsDevice, Light, MaterialId, MeshId, RenderSettings, SkyboxSettings,
    TextureDescriptor, TextureFormat, TextureUsage, ALL_LAYERS,
};
use umbra_data::assets::{primitives, Material};
use umbra_data::camera::Projection;
use umbra_data::{CameraState, EntityId};
use umbra_infra::graphics::software::SubmittedCommand;
use umbra_infra::SoftwareDevice;
use umbra_lanes::programs::HIZ_CULL;
use umbra_lanes::{
    ClusterConfig, FrustumCullLane, HiZCullLane, HiZGenerateLane, RenderStage,
    StageId, StageOutcome,
};

const VIEWPORT: Extent2D = Extent2D::new(64, 64);

struct Fixture {
    device: SoftwareDevice,
    agent: RenderAgent,
    scene: RenderScene,
    cube: MeshId,
    next_entity: u32,
}

impl Fixture {
    fn new(settings: RenderSettings) -> Self {
        let device = SoftwareDevice::new();
        let agent = RenderAgent::new(
            Arc::new(device.clone()),
            ClusterConfig::with_grid(8, 6, 12),
            VIEWPORT,
        )
        .unwrap();
        let camera = CameraState::new(
            Projection {
                fov_y: FRAC_PI_2,
                aspect: 1.0,
                near: 0.1,
                far: 100.0,
            },
            VIEWPORT,
        )
        .unwrap();
        let mut scene = RenderScene::new(agent.disposal())
            .with_camera(camera)
            .with_settings(settings);
        let (vertices, indices) = primitives::cube(0.5);
        let cube = scene
            .meshes
            .upload(&device, "cube", &vertices, &indices)
            .unwrap();
        Self {
            device,
            agent,
            scene,
            cube,
            next_entity: 0,
        }
    }

    fn spawn(&mut self, material: MaterialId, position: Vec3) -> EntityId {
        let entity = EntityId::new(self.next_entity, 0);
        self.next_entity += 1;
        self.scene
            .instances
            .add(
                entity,
                self.cube,
                material,
                &Mat4::from_translation(position),
                ALL_LAYERS,
            )
            .unwrap();
        entity
    }

    fn frame(&mut self) -> umbra_core::renderer::RenderStats {
        self.agent.render_frame(&mut self.scene).unwrap().clone()
    }

    /// Instance counts of the non-fullscreen draws recorded in pass `label`.
    fn draws_in(&self, label: &str) -> Vec<u32> {
        self.device
            .draw_log()
            .iter()
            .filter(|d| !d.fullscreen && d.pass.as_deref() == Some(label))
            .map(|d| d.instances)
            .collect()
    }

    fn passes(&self, label: &str) -> usize {
        self.device
            .command_log()
            .iter()
            .filter(|c| matches!(c, SubmittedCommand::RenderPass { label: Some(l), .. } if l == label))
            .count()
    }
}

fn sky() -> RenderSettings {
    RenderSettings {
        skybox: Some(SkyboxSettings {
            zenith: LinearRgba::new(0.1, 0.2, 0.6, 1.0),
            horizon: LinearRgba::new(0.7, 0.8, 0.9, 1.0),
        }),
        ..RenderSettings::default()
    }
}

#[test]
fn test_default_pipeline_order() {
    let fx = Fixture::new(RenderSettings::default());
    assert_eq!(fx.agent.stage_ids(), StageId::PIPELINE.to_vec());
}

#[test]
fn test_misordered_stages_are_rejected() {
    let stages: Vec<Box<dyn RenderStage>> = vec![
        Box::new(FrustumCullLane::new()),
        Box::new(HiZCullLane::new()),
        Box::new(HiZGenerateLane::new()),
    ];
    let result = RenderAgent::with_stages(
        Arc::new(SoftwareDevice::new()),
        ClusterConfig::default(),
        VIEWPORT,
        stages,
    );
    assert!(result.is_err());
}

#[test]
fn test_frame_without_camera_skips_every_stage() {
    let mut fx = Fixture::new(RenderSettings::default());
    fx.scene.camera = None;
    let stats = fx.frame();

    assert_eq!(stats.stages_skipped as usize, StageId::PIPELINE.len());
    assert_eq!(stats.draw_calls, 0);
    assert!(fx
        .agent
        .stage_records()
        .iter()
        .all(|r| r.outcome == StageOutcome::Skipped));
    assert!(fx.device.draw_log().is_empty());
}

#[test]
fn test_end_to_end_frame() {
    let mut fx = Fixture::new(sky());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    let glass = fx
        .scene
        .materials
        .insert(Material::transparent(LinearRgba::new(0.3, 0.6, 1.0, 0.4)));
    for i in 0..10 {
        fx.spawn(opaque, Vec3::new(i as f32 - 4.5, -1.0, -12.0));
    }
    fx.spawn(glass, Vec3::new(-1.0, 0.5, -6.0));
    fx.spawn(glass, Vec3::new(1.0, 0.5, -6.0));
    for x in [-3.0, 0.0, 3.0] {
        fx.scene
            .lights
            .create(Light::point(Vec3::new(x, 1.0, -10.0), 4.0, LinearRgba::WHITE, 2.0));
    }
    fx.scene.lights.create(Light::directional(
        Vec3::new(0.3, -1.0, -0.2),
        LinearRgba::WHITE,
        0.5,
    ));

    let stats = fx.frame();

    for stage in StageId::PIPELINE {
        let expected = match stage {
            StageId::Blend | StageId::Composite => StageOutcome::Idle,
            _ => StageOutcome::Executed,
        };
        assert_eq!(fx.agent.stage_outcome(stage), Some(expected), "{stage}");
    }
    assert_eq!(stats.frame_number, 0);
    assert_eq!(stats.stages_skipped, 0);
    assert_eq!(stats.instances_total, 12);
    assert_eq!(stats.frustum_survivors, 12);
    assert!(stats.hiz_survivors <= stats.frustum_survivors);
    assert!(stats.hiz_survivors > 0);
    assert_eq!(stats.lights_clustered, 3);
    assert_eq!(stats.global_lights, 1);
    assert_eq!(stats.transparent_draws, 1);
    assert!(stats.draw_calls >= 3);
    assert_eq!(fx.passes("wboit_accumulate"), 1);
    assert_eq!(fx.passes("wboit_composite"), 1);
    assert_eq!(fx.agent.frame_count(), 1);
}

#[test]
fn test_survivor_counts_stay_monotonic_under_churn() {
    let mut fx = Fixture::new(RenderSettings::default());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    let mut live = Vec::new();

    for frame in 0..12u32 {
        // Half inside the frustum, half behind the camera.
        for i in 0..5 {
            let z = if (frame + i) % 2 == 0 { -8.0 } else { 8.0 };
            live.push(fx.spawn(opaque, Vec3::new(i as f32 - 2.0, 0.0, z)));
        }
        if frame % 3 == 2 {
            for entity in live.drain(..4) {
                fx.scene.instances.remove(entity).unwrap();
            }
        }
        if let Some(entity) = live.first() {
            fx.scene
                .instances
                .update(*entity, &Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0)))
                .unwrap();
        }

        let stats = fx.frame();
        assert_eq!(stats.instances_total as usize, live.len());
        assert!(stats.frustum_survivors <= stats.instances_total, "frame {frame}");
        assert!(stats.hiz_survivors <= stats.frustum_survivors, "frame {frame}");
        assert!(stats.frustum_survivors > 0, "frame {frame}");
    }
}

#[test]
fn test_no_transparent_objects_leaves_state_untouched() {
    let mut fx = Fixture::new(RenderSettings::default());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    fx.spawn(opaque, Vec3::new(0.0, 0.0, -5.0));
    fx.frame();

    let framebuffer = fx.agent.framebuffer().unwrap();
    let targets = [framebuffer.accumulation(), framebuffer.reveal()];
    let before: Vec<_> = targets.iter().map(|t| fx.device.read_texture(*t, 0)).collect();
    fx.frame();
    let after: Vec<_> = targets.iter().map(|t| fx.device.read_texture(*t, 0)).collect();

    assert_eq!(fx.agent.stage_outcome(StageId::Transparent), Some(StageOutcome::Idle));
    assert_eq!(after, before);
    assert_eq!(fx.passes("wboit_accumulate"), 0);
    assert_eq!(fx.passes("wboit_composite"), 0);
    assert_eq!(fx.agent.stats().transparent_draws, 0);
}

#[test]
fn test_failed_program_recovers_on_reload() {
    let mut fx = Fixture::new(RenderSettings::default());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    fx.spawn(opaque, Vec3::new(0.0, 0.0, -5.0));

    fx.device.set_program_failure(HIZ_CULL, true);
    assert!(!fx.agent.reload_builtin(HIZ_CULL));
    let stats = fx.frame();
    assert_eq!(fx.agent.stage_outcome(StageId::HiZCull), Some(StageOutcome::Skipped));
    assert_eq!(fx.agent.stage_outcome(StageId::Opaque), Some(StageOutcome::Executed));
    assert_eq!(stats.frustum_survivors, 1);
    assert_eq!(stats.hiz_survivors, 0);
    assert_eq!(stats.groups_skipped, 0);
    assert_eq!(fx.draws_in("opaque"), vec![1]);

    fx.device.clear_logs();
    fx.device.set_program_failure(HIZ_CULL, false);
    assert!(fx.agent.reload_builtin(HIZ_CULL));
    let stats = fx.frame();
    assert_eq!(fx.agent.stage_outcome(StageId::HiZCull), Some(StageOutcome::Executed));
    assert_eq!(stats.frustum_survivors, 1);
    assert_eq!(stats.hiz_survivors, 1);
    assert_eq!(fx.draws_in("opaque"), vec![1]);
    assert!(!fx.agent.reload_builtin("no_such_program"));
}

#[test]
fn test_frustum_survivors_are_drawn_when_hiz_cull_is_skipped() {
    let mut fx = Fixture::new(RenderSettings::default());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    let glass = fx
        .scene
        .materials
        .insert(Material::transparent(LinearRgba::new(0.3, 0.6, 1.0, 0.4)));
    let tinted = fx
        .scene
        .materials
        .insert(Material::blended(LinearRgba::new(0.9, 0.9, 0.2, 0.5)));
    fx.spawn(opaque, Vec3::new(0.0, 0.0, -5.0));
    fx.spawn(opaque, Vec3::new(1.5, 0.0, -5.0));
    fx.spawn(glass, Vec3::new(-1.5, 0.0, -4.0));
    fx.spawn(tinted, Vec3::new(0.0, 1.5, -4.0));

    // A healthy frame first, so the HiZ lists hold last frame's survivors.
    fx.frame();
    fx.device.clear_logs();

    fx.device.set_program_failure(HIZ_CULL, true);
    assert!(!fx.agent.reload_builtin(HIZ_CULL));
    let stats = fx.frame();

    assert_eq!(fx.agent.stage_outcome(StageId::HiZCull), Some(StageOutcome::Skipped));
    assert_eq!(stats.frustum_survivors, 4);
    assert_eq!(stats.groups_skipped, 0);
    assert_eq!(fx.draws_in("opaque"), vec![2]);
    assert_eq!(fx.draws_in("wboit_accumulate"), vec![1]);
    assert_eq!(fx.draws_in("blend"), vec![1]);
}

#[test]
fn test_composite_copies_and_swaps() {
    let mut fx = Fixture::new(RenderSettings::default());
    let output = fx
        .device
        .create_texture(&TextureDescriptor {
            label: Some("present".into()),
            size: VIEWPORT,
            mip_level_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })
        .unwrap();
    fx.scene.output = Some(output);

    let back = fx.agent.framebuffer().unwrap().back_color();
    fx.frame();
    assert_eq!(fx.agent.stage_outcome(StageId::Composite), Some(StageOutcome::Executed));
    assert_eq!(fx.passes("composite"), 1);

    let framebuffer = fx.agent.framebuffer().unwrap();
    assert_eq!(framebuffer.front_color(), back);
    assert_ne!(framebuffer.back_color(), back);
}

#[test]
fn test_custom_stage_list_without_composite_never_swaps() {
    let stages: Vec<Box<dyn RenderStage>> = RenderAgent::default_stages(ClusterConfig::default())
        .unwrap()
        .into_iter()
        .filter(|s| s.stage_id() != StageId::Composite)
        .collect();
    let device = SoftwareDevice::new();
    let mut agent = RenderAgent::with_stages(
        Arc::new(device.clone()),
        ClusterConfig::default(),
        VIEWPORT,
        stages,
    )
    .unwrap();
    assert!(!agent.stage_ids().contains(&StageId::Composite));

    let mut scene = RenderScene::new(agent.disposal());
    let back = agent.framebuffer().unwrap().back_color();
    agent.render_frame(&mut scene).unwrap();
    assert_eq!(agent.framebuffer().unwrap().back_color(), back);
    assert_eq!(agent.stage_outcome(StageId::Composite), None);
}

#[test]
fn test_removed_groups_are_disposed() {
    let mut fx = Fixture::new(RenderSettings::default());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    let entity = fx.spawn(opaque, Vec3::new(0.0, 0.0, -5.0));
    fx.frame();
    let queries = fx.device.live_queries();
    let buffers = fx.device.live_buffers();

    fx.scene.instances.remove(entity).unwrap();
    fx.frame();

    assert_eq!(fx.device.live_queries(), queries - 2);
    assert_eq!(fx.device.live_buffers(), buffers - 3);
}

#[test]
fn test_shutdown_releases_agent_resources() {
    let mut fx = Fixture::new(RenderSettings::default());
    let opaque = fx.scene.materials.insert(Material::opaque(LinearRgba::WHITE));
    fx.spawn(opaque, Vec3::new(0.0, 0.0, -5.0));
    fx.frame();
    assert!(fx.device.live_textures() > 0);
    assert!(fx.device.live_programs() > 0);

    fx.agent.shutdown();
    assert!(fx.agent.is_shut_down());
    assert_eq!(fx.device.live_textures(), 0);
    assert_eq!(fx.device.live_programs(), 0);
    assert!(fx.agent.render_frame(&mut fx.scene).is_err());

    fx.agent.shutdown();
    assert!(fx.agent.programs().is_none());
}

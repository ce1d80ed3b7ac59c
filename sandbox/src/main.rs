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

//! Renders a churning scene headlessly and logs the per-frame statistics.
//!
//! Usage: `sandbox [frames] [settings.ron]`. Falls back to the software
//! device when no GPU adapter is available.

use std::sync::Arc;

use anyhow::Context;
use umbra_agents::{RenderAgent, RenderScene};
use umbra_core::math::{LinearRgba, Mat4, Vec3, FRAC_PI_4};
use umbra_core::renderer::{
    Extent2D, GraphicsDevice, Light, MaterialId, MeshId, RenderSettings, ALL_LAYERS,
};
use umbra_data::assets::{primitives, Material};
use umbra_data::camera::Projection;
use umbra_data::config::load_render_settings;
use umbra_data::{CameraState, EntityId};
use umbra_infra::{SoftwareDevice, WgpuDevice};
use umbra_lanes::ClusterConfig;

const VIEWPORT: Extent2D = Extent2D::new(320, 180);
const GRID: i32 = 12;

fn main() -> anyhow::Result<()> {
    umbra_infra::logging::init("info");

    let mut args = std::env::args().skip(1);
    let frames: u64 = match args.next() {
        Some(arg) => arg.parse().context("frame count must be an integer")?,
        None => 60,
    };
    let settings = match args.next() {
        Some(path) => load_render_settings(&path)?,
        None => RenderSettings::default(),
    };

    let device = create_device();
    let info = device.adapter_info();
    log::info!("Using adapter '{}' ({})", info.name, info.backend);

    let mut agent = RenderAgent::new(device.clone(), ClusterConfig::default(), VIEWPORT)?;
    let mut scene = build_scene(device.as_ref(), &agent, settings)?;
    let mut spawner = Spawner::new(&mut scene, device.as_ref())?;

    for frame in 0..frames {
        spawner.churn(&mut scene, frame)?;
        let stats = agent.render_frame(&mut scene)?;
        log::info!(
            "frame {:>4}: {:>3} draws, {:>4} instances, {:>4} after frustum, {:>4} after HiZ, {:>2} lights ({} global), {:.2}ms",
            stats.frame_number,
            stats.draw_calls,
            stats.instances_total,
            stats.frustum_survivors,
            stats.hiz_survivors,
            stats.lights_clustered,
            stats.global_lights,
            stats.frame_time_ms
        );
    }

    for record in agent.stage_records() {
        log::info!("{:<16} {:?} {:.3}ms", record.stage, record.outcome, record.time_ms);
    }
    agent.shutdown();
    Ok(())
}

fn create_device() -> Arc<dyn GraphicsDevice> {
    match WgpuDevice::new_headless() {
        Ok(device) => Arc::new(device),
        Err(err) => {
            log::warn!("No GPU adapter ({err:#}), using the software device");
            Arc::new(SoftwareDevice::new())
        }
    }
}

fn build_scene(
    device: &dyn GraphicsDevice,
    agent: &RenderAgent,
    settings: RenderSettings,
) -> anyhow::Result<RenderScene> {
    let projection = Projection {
        fov_y: FRAC_PI_4,
        aspect: VIEWPORT.width as f32 / VIEWPORT.height as f32,
        near: 0.1,
        far: 200.0,
    };
    let camera = CameraState::new(projection, VIEWPORT).context("invalid camera projection")?;
    let mut scene = RenderScene::new(agent.disposal())
        .with_camera(camera)
        .with_settings(settings);

    for i in 0..24 {
        let angle = i as f32 * 0.26;
        let position = Vec3::new(angle.cos() * 14.0, 2.0, -30.0 + angle.sin() * 14.0);
        let color = LinearRgba::new(1.0, 0.5 + 0.02 * i as f32, 0.3, 1.0);
        scene.lights.create(Light::point(position, 9.0, color, 3.0));
    }
    scene.lights.create(Light::directional(
        Vec3::new(-0.3, -1.0, -0.4),
        LinearRgba::WHITE,
        0.4,
    ));

    let (vertices, indices) = primitives::quad(1.0);
    let backdrop = scene.meshes.upload(device, "backdrop", &vertices, &indices)?;
    let stone = scene
        .materials
        .insert(Material::opaque(LinearRgba::new(0.4, 0.4, 0.4, 1.0)));
    let transform = Mat4::from_translation(Vec3::new(0.0, 0.0, -80.0))
        * Mat4::from_scale(Vec3::new(60.0, 30.0, 1.0));
    scene.instances.add(
        EntityId::new(u32::MAX, 0),
        backdrop,
        stone,
        &transform,
        ALL_LAYERS,
    )?;
    Ok(scene)
}

/// Adds, moves and removes cubes so every frame dirties the instance groups.
struct Spawner {
    cube: MeshId,
    materials: [MaterialId; 3],
    live: Vec<EntityId>,
    next: u32,
}

impl Spawner {
    fn new(scene: &mut RenderScene, device: &dyn GraphicsDevice) -> anyhow::Result<Self> {
        let (vertices, indices) = primitives::cube(0.5);
        let cube = scene.meshes.upload(device, "cube", &vertices, &indices)?;
        let materials = [
            scene.materials.insert(Material::opaque(LinearRgba::new(0.8, 0.2, 0.2, 1.0))),
            scene.materials.insert(Material::transparent(LinearRgba::new(0.2, 0.6, 1.0, 0.4))),
            scene.materials.insert(Material::blended(LinearRgba::new(0.9, 0.9, 0.2, 0.5))),
        ];
        Ok(Self {
            cube,
            materials,
            live: Vec::new(),
            next: 0,
        })
    }

    fn churn(&mut self, scene: &mut RenderScene, frame: u64) -> anyhow::Result<()> {
        for _ in 0..8 {
            let n = self.next as i32;
            let material = self.materials[(self.next % 7 % 3) as usize];
            let position = Vec3::new(
                (n % GRID - GRID / 2) as f32 * 2.5,
                (n / GRID % 3) as f32 * 2.0,
                -12.0 - (n / GRID % GRID) as f32 * 3.0,
            );
            let entity = EntityId::new(self.next, 0);
            scene.instances.add(
                entity,
                self.cube,
                material,
                &Mat4::from_translation(position),
                ALL_LAYERS,
            )?;
            self.live.push(entity);
            self.next += 1;
        }

        if frame % 4 == 3 {
            let count = self.live.len().min(12);
            for entity in self.live.drain(..count) {
                scene.instances.remove(entity)?;
            }
        }

        let t = frame as f32 * 0.1;
        for (i, entity) in self.live.iter().enumerate().step_by(5) {
            let offset = Vec3::new((t + i as f32).sin() * 4.0, 1.0, -20.0 - i as f32 % 30.0);
            scene.instances.update(*entity, &Mat4::from_translation(offset))?;
        }
        Ok(())
    }
}

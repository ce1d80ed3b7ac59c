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
use umbra_core::math::{LinearRgba, Mat4, Vec3, FRAC_PI_2};
use umbra_core::renderer::{
    BuiltinTexture, DisposalQueue, Extent2D, GraphicsDevice, MaterialId, MeshId, PipelineState,
    ProgramState, RenderSettings, RenderStats, ALL_LAYERS,
};
use umbra_data::assets::{primitives, Material, MaterialRegistry, MeshRegistry};
use umbra_data::camera::Projection;
use umbra_data::{CameraState, EntityId, GroupKey, InstanceLibrary, LightSnapshot, LightStore};
use umbra_infra::graphics::software::SubmittedCommand;
use umbra_infra::SoftwareDevice;
use umbra_lanes::programs::{FRUSTUM_CULL, WBOIT_COMPOSITE};
use umbra_lanes::{
    builtin_source, ClusterConfig, DepthPrePassLane, FrameInputs, FrameResources,
    FrustumCullLane, HiZCullLane, HiZGenerateLane, OpaqueLane, ProgramLibrary, RenderContext,
    RenderStage, SkyboxLane, StageOutcome, TransparencyLane,
};

const VIEWPORT: Extent2D = Extent2D::new(64, 64);

/// A scene on the software device, with every stage input owned in one place.
struct Harness {
    device: SoftwareDevice,
    disposal: DisposalQueue,
    camera: CameraState,
    settings: RenderSettings,
    instances: InstanceLibrary,
    lights: Arc<LightSnapshot>,
    meshes: MeshRegistry,
    materials: MaterialRegistry,
    programs: ProgramLibrary,
    resources: FrameResources,
    stats: RenderStats,
    cube: MeshId,
    next_entity: u32,
}

impl Harness {
    fn new(settings: RenderSettings) -> Self {
        let device = SoftwareDevice::new();
        let disposal = DisposalQueue::new();
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

        let mut meshes = MeshRegistry::new(disposal.sender());
        let (vertices, indices) = primitives::cube(0.5);
        let cube = meshes.upload(&device, "cube", &vertices, &indices).unwrap();

        let mut programs = ProgramLibrary::new(disposal.sender());
        programs.load_builtins(&device, &ClusterConfig::default());
        let resources = FrameResources::new(&device, VIEWPORT, disposal.sender()).unwrap();

        Self {
            instances: InstanceLibrary::new(disposal.sender()),
            lights: LightStore::new().snapshot(),
            materials: MaterialRegistry::new(),
            stats: RenderStats::default(),
            device,
            disposal,
            camera,
            settings,
            meshes,
            programs,
            resources,
            cube,
            next_entity: 0,
        }
    }

    fn material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    fn spawn(&mut self, material: MaterialId, transform: Mat4) {
        let entity = EntityId::new(self.next_entity, 0);
        self.next_entity += 1;
        self.instances
            .add(entity, self.cube, material, &transform, ALL_LAYERS)
            .unwrap();
    }

    fn spawn_at(&mut self, material: MaterialId, position: Vec3) {
        self.spawn(material, Mat4::from_translation(position));
    }

    fn prepare(&mut self) {
        self.instances.sync(&self.device).unwrap();
        let frame = FrameInputs {
            camera: Some(&self.camera),
            settings: Some(&self.settings),
            instances: &self.instances,
            lights: &self.lights,
            meshes: &self.meshes,
            materials: &self.materials,
            output: None,
        };
        self.resources.prepare(&self.device, &frame, 1).unwrap();
    }

    fn run(&mut self, stage: &mut dyn RenderStage) -> StageOutcome {
        let frame = FrameInputs {
            camera: Some(&self.camera),
            settings: Some(&self.settings),
            instances: &self.instances,
            lights: &self.lights,
            meshes: &self.meshes,
            materials: &self.materials,
            output: None,
        };
        let mut encoder = self.device.create_command_encoder(Some("stage_test"));
        let outcome = {
            let mut ctx = RenderContext {
                device: &self.device,
                encoder: encoder.as_mut(),
                frame: &frame,
                resources: &mut self.resources,
                programs: &self.programs,
                stats: &mut self.stats,
            };
            stage.execute(&mut ctx).unwrap()
        };
        self.device.submit_command_buffer(encoder.finish());
        outcome
    }

    fn run_culling(&mut self) {
        assert_eq!(self.run(&mut FrustumCullLane::new()), StageOutcome::Executed);
        assert_eq!(self.run(&mut DepthPrePassLane::new()), StageOutcome::Executed);
        let hiz = if self.settings.hiz_culling {
            StageOutcome::Executed
        } else {
            StageOutcome::Skipped
        };
        assert_eq!(self.run(&mut HiZGenerateLane::new()), hiz);
        assert_eq!(self.run(&mut HiZCullLane::new()), hiz);
    }

    /// `(total, frustum survivors, hiz survivors)` of the cube group with `material`.
    fn counts(&self, material: MaterialId) -> (u32, u32, u32) {
        let group = self.instances.group(GroupKey::new(self.cube, material)).unwrap();
        let gpu = group.gpu().unwrap();
        (
            group.count() as u32,
            self.device.query_result(gpu.frustum_query).count_or_zero(),
            self.device.query_result(gpu.hiz_query).count_or_zero(),
        )
    }

    fn cull_commands(&self) -> usize {
        self.device
            .command_log()
            .iter()
            .filter(|c| matches!(c, SubmittedCommand::Cull { .. }))
            .count()
    }
}

#[test]
fn test_culling_counts_are_monotonic() {
    let mut h = Harness::new(RenderSettings::default());
    let wall = h.material(Material::opaque(LinearRgba::WHITE));
    let hidden = h.material(Material::opaque(LinearRgba::new(1.0, 0.0, 0.0, 1.0)));

    // Fills the whole screen from 5 to 25 units away.
    h.spawn(
        wall,
        Mat4::from_translation(Vec3::new(0.0, 0.0, -15.0)) * Mat4::from_scale(Vec3::splat(20.0)),
    );
    for i in 0..8 {
        h.spawn_at(hidden, Vec3::new(-3.5 + i as f32, 0.0, -50.0));
    }
    for i in 0..4 {
        h.spawn_at(hidden, Vec3::new(500.0 + i as f32 * 3.0, 0.0, -50.0));
    }
    h.prepare();
    h.run_culling();

    for material in [wall, hidden] {
        let (total, frustum, hiz) = h.counts(material);
        assert!(hiz <= frustum, "{hiz} > {frustum}");
        assert!(frustum <= total, "{frustum} > {total}");
    }
    assert_eq!(h.counts(wall), (1, 1, 1));
    assert_eq!(h.counts(hidden), (12, 8, 0));
    assert_eq!(h.cull_commands(), 4);
}

#[test]
fn test_disabled_hiz_draws_frustum_survivors() {
    let settings = RenderSettings {
        hiz_culling: false,
        ..RenderSettings::default()
    };
    let mut h = Harness::new(settings);
    let opaque = h.material(Material::opaque(LinearRgba::WHITE));
    for i in 0..5 {
        h.spawn_at(opaque, Vec3::new(i as f32 - 2.0, 0.0, -10.0));
    }
    h.spawn_at(opaque, Vec3::new(0.0, 0.0, 40.0));
    h.prepare();
    h.run_culling();

    assert_eq!(h.run(&mut OpaqueLane::new()), StageOutcome::Executed);
    let draws: Vec<_> = h
        .device
        .draw_log()
        .into_iter()
        .filter(|d| d.pass.as_deref() == Some("opaque"))
        .collect();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instances, 5);
    assert_eq!(h.cull_commands(), 1);
}

#[test]
fn test_draws_fall_back_to_frustum_survivors_until_hiz_cull_runs() {
    let mut h = Harness::new(RenderSettings::default());
    let opaque = h.material(Material::opaque(LinearRgba::WHITE));
    for i in 0..3 {
        h.spawn_at(opaque, Vec3::new(i as f32 - 1.0, 0.0, -8.0));
    }
    h.prepare();
    h.run_culling();
    assert!(h.resources.hiz_culled());

    // The next frame starts over; only the frustum stage runs.
    h.prepare();
    assert!(!h.resources.hiz_culled());
    assert_eq!(h.run(&mut FrustumCullLane::new()), StageOutcome::Executed);
    h.device.clear_logs();
    h.stats = RenderStats::default();
    assert_eq!(h.run(&mut OpaqueLane::new()), StageOutcome::Executed);

    let draws: Vec<_> = h
        .device
        .draw_log()
        .into_iter()
        .filter(|d| d.pass.as_deref() == Some("opaque"))
        .collect();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instances, 3);
    assert_eq!(h.stats.groups_skipped, 0);
}

#[test]
fn test_transparency_without_transparent_groups_is_a_no_op() {
    let mut h = Harness::new(RenderSettings::default());
    let opaque = h.material(Material::opaque(LinearRgba::WHITE));
    // Transparent, but entirely outside the frustum.
    let glass = h.material(Material::transparent(LinearRgba::new(0.2, 0.4, 1.0, 0.5)));
    for i in 0..3 {
        h.spawn_at(opaque, Vec3::new(i as f32 - 1.0, 0.0, -8.0));
    }
    h.spawn_at(glass, Vec3::new(0.0, 0.0, 30.0));
    h.prepare();
    h.run_culling();
    h.run(&mut OpaqueLane::new());
    h.run(&mut SkyboxLane::new());

    let framebuffer = &h.resources.framebuffer;
    let targets = [
        framebuffer.back_color(),
        framebuffer.depth(),
        framebuffer.accumulation(),
        framebuffer.reveal(),
    ];
    let before: Vec<_> = targets.iter().map(|t| h.device.read_texture(*t, 0)).collect();
    let state = h.device.pipeline_state();
    let commands = h.device.command_log().len();

    assert_eq!(h.run(&mut TransparencyLane::new()), StageOutcome::Idle);

    let after: Vec<_> = targets.iter().map(|t| h.device.read_texture(*t, 0)).collect();
    assert_eq!(after, before);
    assert_eq!(h.device.pipeline_state(), state);
    assert_eq!(h.device.command_log().len(), commands);
    assert_eq!(h.stats.transparent_draws, 0);
}

#[test]
fn test_transparency_restores_default_state() {
    let mut h = Harness::new(RenderSettings::default());
    let glass = h.material(Material::transparent(LinearRgba::new(0.2, 0.4, 1.0, 0.5)));
    h.spawn_at(glass, Vec3::new(0.0, 0.0, -6.0));
    h.spawn_at(glass, Vec3::new(1.0, 0.0, -7.0));
    h.prepare();
    h.run_culling();

    assert_eq!(h.run(&mut TransparencyLane::new()), StageOutcome::Executed);
    assert_eq!(h.stats.transparent_draws, 1);
    assert_eq!(h.device.pipeline_state(), PipelineState::default());

    let composite = h
        .device
        .draw_log()
        .into_iter()
        .find(|d| d.pass.as_deref() == Some("wboit_composite"))
        .unwrap();
    assert!(composite.fullscreen);
    assert_eq!(composite.program_label.as_deref(), Some(WBOIT_COMPOSITE));
    let framebuffer = &h.resources.framebuffer;
    assert!(composite
        .textures
        .contains(&(BuiltinTexture::Accumulation, framebuffer.accumulation())));
    assert!(composite
        .textures
        .contains(&(BuiltinTexture::Reveal, framebuffer.reveal())));
}

#[test]
fn test_disabled_transparency_is_skipped() {
    let settings = RenderSettings {
        transparency: false,
        ..RenderSettings::default()
    };
    let mut h = Harness::new(settings);
    let glass = h.material(Material::transparent(LinearRgba::WHITE));
    h.spawn_at(glass, Vec3::new(0.0, 0.0, -6.0));
    h.prepare();
    h.run_culling();

    let commands = h.device.command_log().len();
    assert_eq!(h.run(&mut TransparencyLane::new()), StageOutcome::Skipped);
    assert_eq!(h.device.command_log().len(), commands);
}

#[test]
fn test_failed_program_skips_stage_until_reloaded() {
    let mut h = Harness::new(RenderSettings::default());
    let opaque = h.material(Material::opaque(LinearRgba::WHITE));
    h.spawn_at(opaque, Vec3::new(0.0, 0.0, -5.0));
    h.prepare();
    h.disposal.drain(&h.device);
    let programs = h.device.live_programs();
    let source = builtin_source(FRUSTUM_CULL, &ClusterConfig::default()).unwrap();

    h.device.set_program_failure(FRUSTUM_CULL, true);
    assert!(!h.programs.reload(&h.device, FRUSTUM_CULL, &source));
    assert!(matches!(
        h.programs.state(FRUSTUM_CULL),
        Some(ProgramState::NotLoaded { .. })
    ));
    assert_eq!(h.disposal.drain(&h.device), 1);
    assert_eq!(h.device.live_programs(), programs - 1);

    assert_eq!(h.run(&mut FrustumCullLane::new()), StageOutcome::Skipped);
    assert_eq!(h.cull_commands(), 0);

    h.device.set_program_failure(FRUSTUM_CULL, false);
    assert!(h.programs.reload(&h.device, FRUSTUM_CULL, &source));
    assert_eq!(h.run(&mut FrustumCullLane::new()), StageOutcome::Executed);
    assert_eq!(h.cull_commands(), 1);
    assert_eq!(h.counts(opaque).1, 1);
}

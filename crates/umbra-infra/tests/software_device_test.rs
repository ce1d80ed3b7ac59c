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

use umbra_core::math::{Frustum, LinearRgba, Mat4, Sphere, Vec3, FRAC_PI_2};
use umbra_core::renderer::{
    BlendState, BufferDescriptor, BufferId, BufferUsage, BuiltinTexture, CameraUniform,
    ColorAttachment, CullDispatch, CullTest, DepthAttachment, DepthCopyDispatch, DepthState,
    DrawInstanced, Extent2D, GpuMesh, GraphicsDevice, InstanceCount, InstanceData, InstanceView,
    LoadOp, MeshVertex, MipReduceDispatch, ProgramId, QueryId, QueryResult, RenderPassDescriptor,
    TextureDescriptor, TextureFormat, TextureId, TextureUsage, UniformBlockSlot, ALL_LAYERS,
};
use umbra_infra::graphics::software::SubmittedCommand;
use umbra_infra::SoftwareDevice;

fn projection() -> Mat4 {
    Mat4::perspective_rh_zo(FRAC_PI_2, 1.0, 0.1, 100.0).unwrap()
}

fn view() -> Mat4 {
    Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y).unwrap()
}

fn instance_buffer(device: &SoftwareDevice, positions: &[Vec3], capacity: usize) -> BufferId {
    let buffer = device
        .create_buffer(&BufferDescriptor::new(
            "instances",
            (capacity * InstanceData::SIZE as usize) as u64,
            BufferUsage::STORAGE | BufferUsage::VERTEX | BufferUsage::COPY_DST,
        ))
        .unwrap();
    let records: Vec<InstanceData> = positions
        .iter()
        .map(|p| InstanceData::new(&Mat4::from_translation(*p), ALL_LAYERS))
        .collect();
    device
        .write_buffer(buffer, 0, bytemuck::cast_slice(&records))
        .unwrap();
    buffer
}

fn texture(device: &SoftwareDevice, size: Extent2D, mips: u32, format: TextureFormat) -> TextureId {
    device
        .create_texture(&TextureDescriptor {
            label: Some("target".into()),
            size,
            mip_level_count: mips,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
                | TextureUsage::STORAGE_BINDING,
        })
        .unwrap()
}

fn frustum_dispatch(
    input: BufferId,
    input_count: InstanceCount,
    output: BufferId,
    output_capacity: u32,
    counter: QueryId,
) -> CullDispatch {
    CullDispatch {
        program: ProgramId(0),
        test: CullTest::Frustum {
            frustum: Frustum::from_view_projection(&(projection() * view())),
        },
        bounds: Sphere::new(Vec3::ZERO, 0.5),
        input,
        input_count,
        output,
        output_capacity,
        counter,
        element_count: 36,
    }
}

#[test]
fn test_frustum_cull_compacts_survivors_at_submit() {
    let device = SoftwareDevice::new();
    let input = instance_buffer(
        &device,
        &[
            Vec3::new(100.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 1.0, -5.0),
        ],
        3,
    );
    let output = instance_buffer(&device, &[], 3);
    let counter = device.create_counter_query(Some("frustum")).unwrap();

    let mut encoder = device.create_command_encoder(Some("cull"));
    encoder.cull_instances(&frustum_dispatch(
        input,
        InstanceCount::Fixed(3),
        output,
        3,
        counter,
    ));
    let commands = encoder.finish();
    assert_eq!(device.query_result(counter), QueryResult::Pending);

    device.submit_command_buffer(commands);
    assert_eq!(device.query_result(counter), QueryResult::Ready(1));
    let survivors = device.read_instances(output, 1);
    assert_eq!(survivors[0].model().translation(), Vec3::new(0.0, 1.0, -5.0));
    assert!(matches!(
        device.command_log()[0],
        SubmittedCommand::Cull { tested: 3, survivors: 1, .. }
    ));
}

#[test]
fn test_cull_reads_input_count_from_query_and_respects_capacity() {
    let device = SoftwareDevice::new();
    let visible = [
        Vec3::new(0.0, 0.0, -3.0),
        Vec3::new(0.5, 0.0, -4.0),
        Vec3::new(-0.5, 0.0, -6.0),
    ];
    let input = instance_buffer(&device, &visible, 3);
    let first = instance_buffer(&device, &[], 3);
    let second = instance_buffer(&device, &[], 2);
    let first_counter = device.create_counter_query(None).unwrap();
    let second_counter = device.create_counter_query(None).unwrap();

    let mut encoder = device.create_command_encoder(None);
    encoder.cull_instances(&frustum_dispatch(
        input,
        InstanceCount::Fixed(2),
        first,
        3,
        first_counter,
    ));
    encoder.cull_instances(&frustum_dispatch(
        input,
        InstanceCount::Query(first_counter),
        second,
        1,
        second_counter,
    ));
    device.submit_command_buffer(encoder.finish());

    assert_eq!(device.query_result(first_counter), QueryResult::Ready(2));
    assert_eq!(device.query_result(second_counter), QueryResult::Ready(1));
}

#[test]
fn test_pyramid_levels_hold_the_farthest_depth() {
    let device = SoftwareDevice::new();
    let size = Extent2D::new(4, 4);
    let depth = texture(&device, size, 1, TextureFormat::Depth32Float);
    let pyramid = texture(&device, size, 3, TextureFormat::R32Float);
    let values: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();
    device.write_texture(depth, 0, &values).unwrap();

    let mut encoder = device.create_command_encoder(None);
    encoder.copy_depth_to_pyramid(&DepthCopyDispatch {
        program: ProgramId(0),
        depth,
        pyramid,
    });
    for target_level in 1..3 {
        encoder.reduce_pyramid_level(&MipReduceDispatch {
            program: ProgramId(1),
            pyramid,
            target_level,
        });
    }
    device.submit_command_buffer(encoder.finish());

    assert_eq!(device.read_texture(pyramid, 0).unwrap(), values);
    let level1 = device.read_texture(pyramid, 1).unwrap();
    assert_eq!(level1, vec![5.0 / 16.0, 7.0 / 16.0, 13.0 / 16.0, 15.0 / 16.0]);
    assert_eq!(device.read_texture(pyramid, 2).unwrap(), vec![15.0 / 16.0]);
    assert_eq!(device.command_log().len(), 3);
}

#[test]
fn test_depth_draw_rasterizes_each_instance() {
    let device = SoftwareDevice::new();
    let size = Extent2D::new(8, 8);
    let depth = texture(&device, size, 1, TextureFormat::Depth32Float);

    let camera = CameraUniform::new(&view(), &projection(), Vec3::ZERO, 0.1, 100.0, [8.0, 8.0]);
    let camera_buffer = device
        .create_buffer(&BufferDescriptor::new(
            "camera",
            std::mem::size_of::<CameraUniform>() as u64,
            BufferUsage::UNIFORM,
        ))
        .unwrap();
    device
        .write_buffer(camera_buffer, 0, bytemuck::bytes_of(&camera))
        .unwrap();

    let corners = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
    let vertices: Vec<MeshVertex> = corners
        .iter()
        .map(|[x, y]| MeshVertex {
            position: [*x, *y, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
        })
        .collect();
    let vertex_buffer = device
        .create_buffer(&BufferDescriptor::new("quad", 128, BufferUsage::VERTEX))
        .unwrap();
    device
        .write_buffer(vertex_buffer, 0, bytemuck::cast_slice(&vertices))
        .unwrap();
    let index_buffer = device
        .create_buffer(&BufferDescriptor::new("quad indices", 24, BufferUsage::INDEX))
        .unwrap();
    device
        .write_buffer(index_buffer, 0, bytemuck::cast_slice(&[0u32, 1, 2, 0, 2, 3]))
        .unwrap();
    let mesh = GpuMesh {
        vertex_buffer,
        index_buffer: Some(index_buffer),
        element_count: 6,
        bounds: Sphere::new(Vec3::ZERO, 1.5),
    };
    let instances = instance_buffer(&device, &[Vec3::new(0.0, 0.0, -2.0)], 1);

    let mut encoder = device.create_command_encoder(None);
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("depth"),
            color_attachments: &[],
            depth_attachment: Some(DepthAttachment {
                texture: depth,
                load: LoadOp::Clear(1.0),
            }),
        });
        pass.set_depth_state(DepthState::DEFAULT);
        pass.bind_uniform_block(UniformBlockSlot::Camera, camera_buffer);
        pass.draw_instanced(&DrawInstanced {
            mesh: &mesh,
            instances: InstanceView::new(instances),
            count: InstanceCount::Fixed(1),
        });
    }
    device.submit_command_buffer(encoder.finish());

    let texels = device.read_texture(depth, 0).unwrap();
    let centre = texels[4 * 8 + 4];
    assert!(centre > 0.0 && centre < 1.0, "centre depth {centre}");
    assert_eq!(texels[0], 1.0);
    let draw = &device.draw_log()[0];
    assert_eq!(draw.instances, 1);
    assert!(draw.depth_written >= 16);
}

#[test]
fn test_blend_and_depth_state_persist_between_passes() {
    let device = SoftwareDevice::new();
    let color = texture(&device, Extent2D::new(2, 2), 1, TextureFormat::Rgba16Float);
    let accumulation = texture(&device, Extent2D::new(2, 2), 1, TextureFormat::Rgba16Float);

    let mut encoder = device.create_command_encoder(None);
    {
        let attachments = [ColorAttachment {
            texture: color,
            load: LoadOp::Clear(LinearRgba::new(0.2, 0.3, 0.4, 1.0)),
        }];
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("composite"),
            color_attachments: &attachments,
            depth_attachment: None,
        });
        pass.set_blend_state(0, Some(BlendState::PREMULTIPLIED_OVER));
        pass.set_depth_state(DepthState::DISABLED);
        pass.bind_texture(BuiltinTexture::Accumulation, accumulation);
        pass.draw_fullscreen();
    }
    {
        let _empty = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("empty"),
            color_attachments: &[],
            depth_attachment: None,
        });
    }
    device.submit_command_buffer(encoder.finish());

    let state = device.pipeline_state();
    assert_eq!(state.blend[0], Some(BlendState::PREMULTIPLIED_OVER));
    assert_eq!(state.depth, DepthState::DISABLED);
    assert_eq!(&device.read_texture(color, 0).unwrap()[..4], &[0.2, 0.3, 0.4, 1.0]);

    let draws = device.draw_log();
    assert_eq!(draws.len(), 1);
    assert!(draws[0].fullscreen);
    assert_eq!(draws[0].textures, vec![(BuiltinTexture::Accumulation, accumulation)]);
    assert_eq!(
        device.command_log()[1],
        SubmittedCommand::RenderPass {
            label: Some("empty".into()),
            draws: 0
        }
    );
}

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

//! Execution of recorded commands against the device state.

use super::device::{DrawRecord, SoftwareState, SubmittedCommand};
use super::encoder::Command;
use super::raster::rasterize_depth;
use crate::graphics::pass::{PassOp, RecordedPass};
use umbra_core::math::Vec3;
use umbra_core::renderer::culling::{frustum_visible, hiz_visible};
use umbra_core::renderer::{
    BufferId, BuiltinTexture, CameraUniform, CullDispatch, CullTest, DepthCopyDispatch, GpuMesh,
    InstanceCount, InstanceData, InstanceView, LoadOp, MeshVertex, MipReduceDispatch, ProgramId,
    QueryResult, TextureId, UniformBlockSlot, MAX_COLOR_TARGETS,
};

const RECORD_SIZE: usize = InstanceData::SIZE as usize;

/// Source texel range `[lo, hi)` covered by destination texel `id` when a
/// level of `src` texels is reduced to `dst` texels.
#[inline]
pub(crate) fn reduction_span(id: u32, src: u32, dst: u32) -> (u32, u32) {
    let lo = id * src / dst;
    let hi = ((id + 1) * src).div_ceil(dst);
    (lo, hi.max(lo + 1).min(src))
}

impl SoftwareState {
    pub(crate) fn execute(&mut self, command: Command) {
        match command {
            Command::Cull(dispatch) => self.cull(&dispatch),
            Command::CopyDepth(dispatch) => self.copy_depth(&dispatch),
            Command::ReduceMip(dispatch) => self.reduce_mip(&dispatch),
            Command::Render(pass) => self.render(pass),
        }
    }

    fn resolve_count(&self, count: InstanceCount) -> u32 {
        match count {
            InstanceCount::Fixed(n) => n,
            InstanceCount::Query(query) => self
                .queries
                .get(&query)
                .copied()
                .unwrap_or(QueryResult::Pending)
                .count_or_zero(),
        }
    }

    fn read_records(&self, buffer: BufferId, stride: usize, count: u32) -> Vec<InstanceData> {
        let Some(buffer) = self.buffers.get(&buffer) else {
            log::warn!("SoftwareDevice: instance buffer {buffer:?} not found");
            return Vec::new();
        };
        let stride = stride.max(RECORD_SIZE);
        (0..count as usize)
            .map_while(|i| {
                let bytes = buffer.bytes(i * stride, RECORD_SIZE);
                (bytes.len() == RECORD_SIZE).then(|| bytemuck::pod_read_unaligned(bytes))
            })
            .collect()
    }

    fn cull(&mut self, dispatch: &CullDispatch) {
        let count = self.resolve_count(dispatch.input_count);
        let records = self.read_records(dispatch.input, RECORD_SIZE, count);
        let tested = records.len() as u32;

        let survivors: Vec<InstanceData> = match dispatch.test {
            CullTest::Frustum { frustum } => records
                .into_iter()
                .filter(|r| frustum_visible(&frustum, &dispatch.bounds, &r.model()))
                .collect(),
            CullTest::HiZ {
                view_projection,
                pyramid,
                mip_count,
                viewport,
            } => match self.textures.get(&pyramid) {
                Some(texture) => {
                    let levels = mip_count.min(texture.levels.len() as u32);
                    records
                        .into_iter()
                        .filter(|r| {
                            hiz_visible(
                                &dispatch.bounds,
                                &r.model(),
                                &view_projection,
                                viewport,
                                levels,
                                |level, x, y| texture.texel(level, x, y),
                            )
                        })
                        .collect()
                }
                None => {
                    log::warn!("SoftwareDevice: depth pyramid {pyramid:?} not found, keeping all");
                    records
                }
            },
        };

        let written = match self.buffers.get_mut(&dispatch.output) {
            Some(output) => {
                let room = (output.data.len() / RECORD_SIZE).min(dispatch.output_capacity as usize);
                let written = survivors.len().min(room);
                let bytes: &[u8] = bytemuck::cast_slice(&survivors[..written]);
                output.data[..bytes.len()].copy_from_slice(bytes);
                written as u32
            }
            None => {
                log::warn!("SoftwareDevice: cull output {:?} not found", dispatch.output);
                0
            }
        };

        self.queries
            .insert(dispatch.counter, QueryResult::Ready(written));
        self.command_log.push(SubmittedCommand::Cull {
            program: dispatch.program,
            counter: dispatch.counter,
            tested,
            survivors: written,
        });
    }

    fn copy_depth(&mut self, dispatch: &DepthCopyDispatch) {
        let Some((source, source_size)) = self
            .textures
            .get(&dispatch.depth)
            .and_then(|t| t.levels.first().map(|level| (level.clone(), t.size)))
        else {
            log::warn!("SoftwareDevice: depth source {:?} not found", dispatch.depth);
            return;
        };
        let Some(pyramid) = self.textures.get_mut(&dispatch.pyramid) else {
            log::warn!("SoftwareDevice: pyramid {:?} not found", dispatch.pyramid);
            return;
        };
        let size = pyramid.size;
        if let Some(level) = pyramid.levels.first_mut() {
            for y in 0..size.height {
                let sy = (y * source_size.height / size.height).min(source_size.height - 1);
                for x in 0..size.width {
                    let sx = (x * source_size.width / size.width).min(source_size.width - 1);
                    level[(y * size.width + x) as usize] =
                        source[(sy * source_size.width + sx) as usize];
                }
            }
        }
        self.command_log.push(SubmittedCommand::CopyDepth {
            pyramid: dispatch.pyramid,
        });
    }

    fn reduce_mip(&mut self, dispatch: &MipReduceDispatch) {
        let level = dispatch.target_level as usize;
        let Some(pyramid) = self.textures.get_mut(&dispatch.pyramid) else {
            log::warn!("SoftwareDevice: pyramid {:?} not found", dispatch.pyramid);
            return;
        };
        if level == 0 || level >= pyramid.levels.len() {
            log::warn!(
                "SoftwareDevice: cannot reduce into level {level} of a {}-level pyramid",
                pyramid.levels.len()
            );
            return;
        }
        let src_size = pyramid.level_size(dispatch.target_level - 1);
        let dst_size = pyramid.level_size(dispatch.target_level);
        let (upper, lower) = pyramid.levels.split_at_mut(level);
        let src = &upper[level - 1];
        let dst = &mut lower[0];
        for y in 0..dst_size.height {
            let (y0, y1) = reduction_span(y, src_size.height, dst_size.height);
            for x in 0..dst_size.width {
                let (x0, x1) = reduction_span(x, src_size.width, dst_size.width);
                let mut farthest = 0.0f32;
                for sy in y0..y1 {
                    for sx in x0..x1 {
                        farthest = farthest.max(src[(sy * src_size.width + sx) as usize]);
                    }
                }
                dst[(y * dst_size.width + x) as usize] = farthest;
            }
        }
        self.command_log.push(SubmittedCommand::ReduceMip {
            pyramid: dispatch.pyramid,
            level: dispatch.target_level,
        });
    }

    fn render(&mut self, pass: RecordedPass) {
        for attachment in &pass.colors {
            if let LoadOp::Clear(color) = attachment.load {
                match self.textures.get_mut(&attachment.texture) {
                    Some(texture) => texture.clear(color.to_array()),
                    None => log::warn!(
                        "SoftwareDevice: color attachment {:?} not found",
                        attachment.texture
                    ),
                }
            }
        }
        if let Some(depth) = pass.depth {
            if let LoadOp::Clear(value) = depth.load {
                if let Some(texture) = self.textures.get_mut(&depth.texture) {
                    texture.clear([value; 4]);
                }
            }
        }

        let mut program = None;
        let mut camera = None;
        let mut textures = Vec::new();
        let mut draws = 0;
        for op in pass.ops {
            match op {
                PassOp::SetProgram(id) => program = Some(id),
                PassOp::SetBlend(target, blend) if target < MAX_COLOR_TARGETS => {
                    self.pipeline.blend[target] = blend;
                }
                PassOp::SetBlend(target, _) => {
                    log::warn!("SoftwareDevice: blend target {target} out of range");
                }
                PassOp::SetDepth(depth) => self.pipeline.depth = depth,
                PassOp::BindUniform(UniformBlockSlot::Camera, buffer) => camera = Some(buffer),
                PassOp::BindUniform(..) | PassOp::BindBuffer(..) => {}
                PassOp::BindTexture(name, id) => {
                    textures.retain(|(bound, _)| *bound != name);
                    textures.push((name, id));
                }
                PassOp::Draw {
                    mesh,
                    instances,
                    count,
                } => {
                    let resolved = self.resolve_count(count);
                    let depth_written = match (pass.depth, camera) {
                        (Some(target), Some(camera)) if resolved > 0 => {
                            self.rasterize(target.texture, camera, &mesh, instances, resolved)
                        }
                        _ => 0,
                    };
                    self.log_draw(
                        pass.label.as_deref(),
                        program,
                        resolved,
                        false,
                        &textures,
                        depth_written,
                    );
                    draws += 1;
                }
                PassOp::DrawFullscreen => {
                    self.log_draw(pass.label.as_deref(), program, 1, true, &textures, 0);
                    draws += 1;
                }
            }
        }
        self.command_log.push(SubmittedCommand::RenderPass {
            label: pass.label,
            draws,
        });
    }

    fn log_draw(
        &mut self,
        pass: Option<&str>,
        program: Option<ProgramId>,
        instances: u32,
        fullscreen: bool,
        textures: &[(BuiltinTexture, TextureId)],
        depth_written: usize,
    ) {
        let program_label = program
            .and_then(|id| self.programs.get(&id))
            .map(|p| p.label.clone());
        self.draw_log.push(DrawRecord {
            pass: pass.map(str::to_string),
            program,
            program_label,
            instances,
            fullscreen,
            state: self.pipeline,
            textures: textures.to_vec(),
            depth_written,
        });
    }

    fn rasterize(
        &mut self,
        target: TextureId,
        camera: BufferId,
        mesh: &GpuMesh,
        view: InstanceView,
        count: u32,
    ) -> usize {
        if !self.pipeline.depth.write_enabled {
            return 0;
        }
        let camera_size = std::mem::size_of::<CameraUniform>();
        let Some(camera) = self
            .buffers
            .get(&camera)
            .map(|b| b.bytes(0, camera_size))
            .filter(|bytes| bytes.len() == camera_size)
            .map(bytemuck::pod_read_unaligned::<CameraUniform>)
        else {
            return 0;
        };
        let view_projection = camera.view_projection();

        let Some(vertices) = self.buffers.get(&mesh.vertex_buffer) else {
            return 0;
        };
        let positions: Vec<Vec3> = vertices
            .data
            .chunks_exact(std::mem::size_of::<MeshVertex>())
            .map(|chunk| Vec3::from(bytemuck::pod_read_unaligned::<MeshVertex>(chunk).position))
            .collect();
        let indices: Vec<u32> = match mesh.index_buffer {
            Some(id) => self
                .buffers
                .get(&id)
                .map(|b| {
                    b.bytes(0, mesh.element_count as usize * 4)
                        .chunks_exact(4)
                        .map(bytemuck::pod_read_unaligned::<u32>)
                        .collect()
                })
                .unwrap_or_default(),
            None => (0..mesh.element_count).collect(),
        };
        let models: Vec<_> = self
            .read_records(view.buffer, view.stride as usize, count)
            .iter()
            .map(InstanceData::model)
            .collect();

        let Some(texture) = self.textures.get_mut(&target) else {
            return 0;
        };
        let size = texture.size;
        let Some(level) = texture.levels.first_mut() else {
            return 0;
        };
        let depth = self.pipeline.depth;
        models
            .iter()
            .map(|model| {
                rasterize_depth(
                    level,
                    size,
                    &(view_projection * *model),
                    &positions,
                    indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]),
                    depth,
                )
            })
            .sum()
    }
}

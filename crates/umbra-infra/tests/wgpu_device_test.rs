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

//! These tests need a real adapter and return early on machines without one.

use umbra_core::renderer::{
    BufferDescriptor, BufferUsage, GraphicsDevice, ProgramSource, QueryResult, ResourceError,
    ShaderError,
};
use umbra_infra::WgpuDevice;

fn device() -> Option<WgpuDevice> {
    umbra_infra::logging::init_for_tests();
    match WgpuDevice::new_headless() {
        Ok(device) => Some(device),
        Err(e) => {
            log::warn!("Skipping wgpu test, no adapter: {e}");
            None
        }
    }
}

const COPY_PROGRAM: &str = r#"
@group(0) @binding(0) var<storage, read> values_in: array<u32>;
@group(0) @binding(1) var<storage, read_write> values_out: array<u32>;

@compute @workgroup_size(64)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    values_out[id.x] = values_in[id.x];
}
"#;

#[test]
fn test_buffer_writes_are_bounds_checked() {
    let Some(device) = device() else { return };
    let buffer = device
        .create_buffer(&BufferDescriptor::new(
            "bounded",
            16,
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        ))
        .unwrap();
    assert!(device.write_buffer(buffer, 0, &[0u8; 16]).is_ok());
    assert_eq!(
        device.write_buffer(buffer, 8, &[0u8; 16]),
        Err(ResourceError::OutOfBounds {
            offset: 8,
            len: 16,
            size: 16
        })
    );
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.destroy_buffer(buffer), Err(ResourceError::InvalidHandle));
}

#[test]
fn test_compute_program_is_reflected() {
    let Some(device) = device() else { return };
    let program = device
        .compile_program(&ProgramSource::new("copy", COPY_PROGRAM))
        .unwrap();
    assert_eq!(program.reflection.bindings.len(), 2);
    assert!(program.reflection.binding("values_out").is_some());
    device.destroy_program(program.id).unwrap();
}

#[test]
fn test_invalid_wgsl_reports_compilation_error() {
    let Some(device) = device() else { return };
    let result = device.compile_program(&ProgramSource::new(
        "broken",
        "@compute @workgroup_size(1) fn cs_main() { let x: u32 = 1.5; }",
    ));
    assert!(matches!(result, Err(ShaderError::CompilationError { .. })));
}

#[test]
fn test_fresh_counter_is_pending() {
    let Some(device) = device() else { return };
    let query = device.create_counter_query(Some("counter")).unwrap();
    assert_eq!(device.query_result(query), QueryResult::Pending);
    assert_eq!(device.query_result(query).count_or_zero(), 0);
    device.destroy_query(query).unwrap();
}

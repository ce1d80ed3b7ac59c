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

//! The program library: compiled programs by key, with reload.

use super::shaders;
use crate::light_lane::ClusterConfig;
use ahash::AHashMap;
use std::borrow::Cow;
use umbra_core::renderer::{
    CompiledProgram, DeferredDisposal, DisposalSender, GraphicsDevice, ProgramSource, ProgramState,
};
use umbra_data::assets::Material;

/// Frustum culling compute program.
pub const FRUSTUM_CULL: &str = "frustum_cull";
/// HiZ culling compute program.
pub const HIZ_CULL: &str = "hiz_cull";
/// Depth to pyramid level 0 copy.
pub const HIZ_COPY: &str = "hiz_copy";
/// Pyramid max-reduction.
pub const HIZ_REDUCE: &str = "hiz_reduce";
/// Depth-only program.
pub const DEPTH_PREPASS: &str = "depth_prepass";
/// Lit opaque program.
pub const LIT_OPAQUE: &str = Material::LIT_OPAQUE;
/// Weighted blended accumulation program.
pub const LIT_TRANSPARENT: &str = Material::LIT_TRANSPARENT;
/// Alpha-blended program.
pub const LIT_BLEND: &str = Material::LIT_BLEND;
/// Skybox program.
pub const SKYBOX: &str = "skybox";
/// WBOIT resolve program.
pub const WBOIT_COMPOSITE: &str = "wboit_composite";
/// Output copy program.
pub const COMPOSITE_COPY: &str = "composite_copy";

/// Every built-in program key.
pub const BUILTIN_PROGRAMS: [&str; 11] = [
    FRUSTUM_CULL,
    HIZ_CULL,
    HIZ_COPY,
    HIZ_REDUCE,
    DEPTH_PREPASS,
    LIT_OPAQUE,
    LIT_TRANSPARENT,
    LIT_BLEND,
    SKYBOX,
    WBOIT_COMPOSITE,
    COMPOSITE_COPY,
];

/// Assembles the source of a built-in program, or `None` for an unknown key.
pub fn builtin_source(key: &str, config: &ClusterConfig) -> Option<ProgramSource<'static>> {
    let concat = |parts: &[&str]| parts.concat();
    let code = match key {
        FRUSTUM_CULL => concat(&[shaders::CULL_COMMON_WGSL, shaders::FRUSTUM_CULL_WGSL]),
        HIZ_CULL => concat(&[shaders::CULL_COMMON_WGSL, shaders::HIZ_CULL_WGSL]),
        HIZ_COPY => shaders::HIZ_COPY_WGSL.to_string(),
        HIZ_REDUCE => shaders::HIZ_REDUCE_WGSL.to_string(),
        DEPTH_PREPASS => concat(&[shaders::COMMON_WGSL, shaders::DEPTH_PREPASS_WGSL]),
        LIT_OPAQUE => concat(&[shaders::COMMON_WGSL, shaders::LIGHTING_WGSL, shaders::LIT_OPAQUE_WGSL]),
        LIT_TRANSPARENT => concat(&[
            shaders::COMMON_WGSL,
            shaders::LIGHTING_WGSL,
            shaders::LIT_TRANSPARENT_WGSL,
        ]),
        LIT_BLEND => concat(&[shaders::COMMON_WGSL, shaders::LIGHTING_WGSL, shaders::LIT_BLEND_WGSL]),
        SKYBOX => concat(&[shaders::COMMON_WGSL, shaders::SKYBOX_WGSL]),
        WBOIT_COMPOSITE => concat(&[shaders::COMMON_WGSL, shaders::WBOIT_COMPOSITE_WGSL]),
        COMPOSITE_COPY => concat(&[shaders::COMMON_WGSL, shaders::COMPOSITE_COPY_WGSL]),
        _ => return None,
    };
    let source = ProgramSource::new(key.to_string(), code);
    Some(if code_uses_lighting(key) {
        source
            .with_macro("MAX_LIGHTS_PER_CLUSTER", format!("{}u", config.max_lights_per_cluster))
            .with_macro("MAX_GLOBAL_LIGHTS", format!("{}u", config.max_global_lights))
    } else {
        source
    })
}

fn code_uses_lighting(key: &str) -> bool {
    matches!(key, LIT_OPAQUE | LIT_TRANSPARENT | LIT_BLEND)
}

/// Compiled programs by key.
///
/// A program that fails to compile is stored as [`ProgramState::NotLoaded`];
/// stages that need it skip until a later [`ProgramLibrary::reload`]
/// succeeds. Replaced programs are handed to the disposal queue.
#[derive(Debug)]
pub struct ProgramLibrary {
    states: AHashMap<Cow<'static, str>, ProgramState>,
    disposal: DisposalSender,
}

impl ProgramLibrary {
    /// Creates an empty library.
    pub fn new(disposal: DisposalSender) -> Self {
        Self {
            states: AHashMap::new(),
            disposal,
        }
    }

    /// Compiles every built-in program. Failures are recorded, not returned.
    pub fn load_builtins(&mut self, device: &dyn GraphicsDevice, config: &ClusterConfig) -> usize {
        let mut loaded = 0;
        for key in BUILTIN_PROGRAMS {
            if let Some(source) = builtin_source(key, config) {
                if self.load(device, key, &source).is_loaded() {
                    loaded += 1;
                }
            }
        }
        log::info!("ProgramLibrary: {}/{} built-in programs loaded", loaded, BUILTIN_PROGRAMS.len());
        loaded
    }

    /// Compiles `source` under `key`, replacing any previous program.
    pub fn load(
        &mut self,
        device: &dyn GraphicsDevice,
        key: impl Into<Cow<'static, str>>,
        source: &ProgramSource,
    ) -> &ProgramState {
        let key = key.into();
        let state = match device.compile_program(source) {
            Ok(program) => ProgramState::Loaded(program),
            Err(err) => ProgramState::NotLoaded {
                reason: err.to_string(),
            },
        };

        match (self.states.get(&key), &state) {
            (Some(ProgramState::NotLoaded { .. }), ProgramState::Loaded(_)) => {
                log::info!("Program '{}' recovered", key);
            }
            (Some(ProgramState::NotLoaded { reason: old }), ProgramState::NotLoaded { reason })
                if old == reason =>
            {
                log::debug!("Program '{}' still not loaded", key);
            }
            (_, ProgramState::NotLoaded { reason }) => {
                log::warn!("Program '{}' failed to load: {}", key, reason);
            }
            _ => log::debug!("Program '{}' loaded", key),
        }

        if let Some(ProgramState::Loaded(old)) = self.states.insert(key.clone(), state) {
            self.disposal.dispose(DeferredDisposal::Program(old.id));
        }
        &self.states[&key]
    }

    /// Recompiles a program after its source changed. Returns `true` if it is
    /// now loaded.
    pub fn reload(
        &mut self,
        device: &dyn GraphicsDevice,
        key: impl Into<Cow<'static, str>>,
        source: &ProgramSource,
    ) -> bool {
        self.load(device, key, source).is_loaded()
    }

    /// The compiled program under `key`, if loaded.
    pub fn get(&self, key: &str) -> Option<&CompiledProgram> {
        self.states.get(key).and_then(ProgramState::program)
    }

    /// The load state under `key`, if it was ever loaded.
    pub fn state(&self, key: &str) -> Option<&ProgramState> {
        self.states.get(key)
    }

    /// Number of keys, loaded or not.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no program was ever loaded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Drop for ProgramLibrary {
    fn drop(&mut self) {
        for state in self.states.values() {
            if let ProgramState::Loaded(program) = state {
                self.disposal.dispose(DeferredDisposal::Program(program.id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::{ProgramReflection, ProgramStage, UniformBlockSlot};

    fn reflect(key: &str) -> ProgramReflection {
        let source = builtin_source(key, &ClusterConfig::default()).unwrap();
        ProgramReflection::from_wgsl(key, &source.expanded_code()).unwrap()
    }

    #[test]
    fn test_every_builtin_reflects() {
        for key in BUILTIN_PROGRAMS {
            let reflection = reflect(key);
            assert!(!reflection.entry_points.is_empty(), "{key}");
        }
    }

    #[test]
    fn test_lit_programs_declare_the_cluster_block() {
        let reflection = reflect(LIT_OPAQUE);
        let binding = reflection.binding(UniformBlockSlot::LightClusters.name()).unwrap();
        assert_eq!(binding.location, UniformBlockSlot::LightClusters.location());
        assert!(reflect(DEPTH_PREPASS)
            .binding(UniformBlockSlot::LightClusters.name())
            .is_none());
    }

    #[test]
    fn test_cull_programs_are_compute_only() {
        let reflection = reflect(HIZ_CULL);
        let entry = reflection.entry_point(ProgramStage::Compute).unwrap();
        assert_eq!(entry.workgroup_size, Some([64, 1, 1]));
        assert!(reflection.binding("hiz_pyramid").is_some());
        assert!(reflection.entry_point(ProgramStage::Vertex).is_none());
    }

    #[test]
    fn test_unknown_key_has_no_source() {
        assert!(builtin_source("nope", &ClusterConfig::default()).is_none());
    }
}

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

//! GPU program compilation inputs, reflection, and the binding-slot contract.
//!
//! Programs are WGSL modules. Reflection scans the source for resource
//! declarations and entry points so that passes can look bindings up by their
//! conventional name. A binding a program does not declare is simply absent.

use crate::renderer::api::texture::TextureFormat;
use crate::renderer::error::ShaderError;
use std::borrow::Cow;
use std::collections::HashSet;

/// An opaque handle to a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// Compute stage.
    Compute,
}

/// A named constant injected ahead of the program source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMacro {
    /// The constant name.
    pub name: Cow<'static, str>,
    /// The constant value, as WGSL source.
    pub value: String,
}

/// The input of a program compilation.
#[derive(Debug, Clone)]
pub struct ProgramSource<'a> {
    /// A label used in logs and errors.
    pub label: Cow<'a, str>,
    /// The WGSL source code.
    pub code: Cow<'a, str>,
    /// Constants prepended to the source as `const NAME = VALUE;`.
    pub macros: Vec<ProgramMacro>,
}

impl<'a> ProgramSource<'a> {
    /// Creates a source with no macros.
    pub fn new(label: impl Into<Cow<'a, str>>, code: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
            macros: Vec::new(),
        }
    }

    /// Adds a constant definition.
    pub fn with_macro(mut self, name: impl Into<Cow<'static, str>>, value: impl ToString) -> Self {
        self.macros.push(ProgramMacro {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    /// The code the backend actually compiles, macros included.
    pub fn expanded_code(&self) -> Cow<'_, str> {
        if self.macros.is_empty() {
            return Cow::Borrowed(&self.code);
        }
        let mut out = String::with_capacity(self.code.len() + self.macros.len() * 32);
        for m in &self.macros {
            out.push_str(&format!("const {} = {};\n", m.name, m.value));
        }
        out.push_str(&self.code);
        Cow::Owned(out)
    }
}

/// A `(group, binding)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingLocation {
    /// The bind group index.
    pub group: u32,
    /// The binding index inside the group.
    pub binding: u32,
}

impl BindingLocation {
    /// Creates a location.
    pub const fn new(group: u32, binding: u32) -> Self {
        Self { group, binding }
    }
}

/// The resource type of a reflected binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// A uniform block.
    Uniform,
    /// A storage buffer.
    Storage {
        /// `true` for `var<storage, read>`.
        read_only: bool,
    },
    /// A sampled texture.
    Texture {
        /// `true` for `texture_depth_*`.
        depth: bool,
    },
    /// A write-only storage texture.
    StorageTexture {
        /// The declared texel format.
        format: TextureFormat,
    },
    /// A sampler.
    Sampler,
}

/// One resource declaration found in a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    /// The variable name.
    pub name: String,
    /// Where it is bound.
    pub location: BindingLocation,
    /// What kind of resource it is.
    pub kind: BindingKind,
}

/// One entry point found in a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// The stage the function runs in.
    pub stage: ProgramStage,
    /// The function name.
    pub name: String,
    /// The compute workgroup size, for compute entry points.
    pub workgroup_size: Option<[u32; 3]>,
}

/// The binding and entry-point table of a compiled program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    /// Every resource declaration, in source order.
    pub bindings: Vec<ReflectedBinding>,
    /// Every entry point, in source order.
    pub entry_points: Vec<EntryPoint>,
}

impl ProgramReflection {
    /// Scans WGSL source for `@group/@binding` declarations and entry points.
    ///
    /// # Errors
    ///
    /// Returns [`ShaderError::CompilationError`] for malformed declarations,
    /// duplicated locations, or a module without any entry point.
    pub fn from_wgsl(label: &str, code: &str) -> Result<Self, ShaderError> {
        let fail = |details: String| ShaderError::CompilationError {
            label: label.to_string(),
            details,
        };
        let stripped: String = code
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");

        let mut reflection = ProgramReflection::default();
        let mut seen = HashSet::new();

        let mut rest = stripped.as_str();
        while let Some(pos) = rest.find("@group(") {
            rest = &rest[pos + "@group(".len()..];
            let group = parse_leading_u32(rest).ok_or_else(|| fail("bad @group index".into()))?;
            let pos = rest
                .find("@binding(")
                .ok_or_else(|| fail("@group without @binding".into()))?;
            rest = &rest[pos + "@binding(".len()..];
            let binding =
                parse_leading_u32(rest).ok_or_else(|| fail("bad @binding index".into()))?;
            let pos = rest
                .find("var")
                .ok_or_else(|| fail("binding attribute without a variable".into()))?;
            rest = &rest[pos + "var".len()..];
            let end = rest
                .find(';')
                .ok_or_else(|| fail("unterminated variable declaration".into()))?;
            let declaration = rest[..end].trim();
            rest = &rest[end..];

            let (address_space, declaration) = match declaration.strip_prefix('<') {
                Some(after) => {
                    let close = after
                        .find('>')
                        .ok_or_else(|| fail("unterminated address space".into()))?;
                    (Some(after[..close].trim()), after[close + 1..].trim())
                }
                None => (None, declaration),
            };
            let (name, ty) = declaration
                .split_once(':')
                .ok_or_else(|| fail(format!("missing type in '{declaration}'")))?;
            let (name, ty) = (name.trim(), ty.trim());

            let kind = match address_space {
                Some("uniform") => BindingKind::Uniform,
                Some(space) if space.starts_with("storage") => BindingKind::Storage {
                    read_only: !space.contains("read_write"),
                },
                Some(space) => return Err(fail(format!("unsupported address space '{space}'"))),
                None => classify_handle_type(ty)
                    .ok_or_else(|| fail(format!("unsupported binding type '{ty}'")))?,
            };

            let location = BindingLocation::new(group, binding);
            if !seen.insert(location) {
                return Err(fail(format!(
                    "duplicate binding @group({group}) @binding({binding})"
                )));
            }
            reflection.bindings.push(ReflectedBinding {
                name: name.to_string(),
                location,
                kind,
            });
        }

        for (attribute, stage) in [
            ("@vertex", ProgramStage::Vertex),
            ("@fragment", ProgramStage::Fragment),
            ("@compute", ProgramStage::Compute),
        ] {
            let mut rest = stripped.as_str();
            while let Some(pos) = rest.find(attribute) {
                rest = &rest[pos + attribute.len()..];
                let fn_pos = rest
                    .find("fn ")
                    .ok_or_else(|| fail(format!("{attribute} without a function")))?;
                let header = &rest[..fn_pos];
                let workgroup_size = match stage {
                    ProgramStage::Compute => Some(parse_workgroup_size(header)),
                    _ => None,
                };
                let after_fn = &rest[fn_pos + 3..];
                let name_end = after_fn
                    .find('(')
                    .ok_or_else(|| fail("entry point without parameter list".into()))?;
                reflection.entry_points.push(EntryPoint {
                    stage,
                    name: after_fn[..name_end].trim().to_string(),
                    workgroup_size,
                });
                rest = &after_fn[name_end..];
            }
        }

        if reflection.entry_points.is_empty() {
            return Err(fail("module declares no entry point".into()));
        }
        Ok(reflection)
    }

    /// Looks a binding up by variable name.
    pub fn binding(&self, name: &str) -> Option<&ReflectedBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// The first entry point of the given stage.
    pub fn entry_point(&self, stage: ProgramStage) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|e| e.stage == stage)
    }

    /// One past the highest bind group index used.
    pub fn group_count(&self) -> u32 {
        self.bindings
            .iter()
            .map(|b| b.location.group + 1)
            .max()
            .unwrap_or(0)
    }
}

fn parse_leading_u32(s: &str) -> Option<u32> {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn parse_workgroup_size(header: &str) -> [u32; 3] {
    let mut size = [1, 1, 1];
    if let Some(pos) = header.find("@workgroup_size(") {
        let inner = &header[pos + "@workgroup_size(".len()..];
        let inner = inner.split(')').next().unwrap_or("");
        for (slot, part) in size.iter_mut().zip(inner.split(',')) {
            if let Ok(v) = part.trim().parse() {
                *slot = v;
            }
        }
    }
    size
}

fn classify_handle_type(ty: &str) -> Option<BindingKind> {
    if ty.starts_with("sampler") {
        return Some(BindingKind::Sampler);
    }
    if let Some(args) = ty.strip_prefix("texture_storage_2d<") {
        let format = match args.split(',').next()?.trim() {
            "r32float" => TextureFormat::R32Float,
            "rgba16float" => TextureFormat::Rgba16Float,
            "rgba8unorm" => TextureFormat::Rgba8Unorm,
            _ => return None,
        };
        return Some(BindingKind::StorageTexture { format });
    }
    if ty.starts_with("texture_depth") {
        return Some(BindingKind::Texture { depth: true });
    }
    if ty.starts_with("texture_") {
        return Some(BindingKind::Texture { depth: false });
    }
    None
}

// ─── Binding-slot contract ──────────────────────────────────────────────────

/// The fixed uniform-block slots every program shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformBlockSlot {
    /// Per-frame globals (time, viewport, frame index).
    Pipeline,
    /// Camera matrices and planes.
    Camera,
    /// Cluster grid dimensions and depth-slice constants.
    LightClusters,
    /// Per-material parameters.
    Material,
    /// Per-mesh parameters.
    Mesh,
}

impl UniformBlockSlot {
    /// Every slot, in binding order.
    pub const ALL: [UniformBlockSlot; 5] = [
        UniformBlockSlot::Pipeline,
        UniformBlockSlot::Camera,
        UniformBlockSlot::LightClusters,
        UniformBlockSlot::Material,
        UniformBlockSlot::Mesh,
    ];

    /// The variable name programs must declare the block under.
    pub const fn name(self) -> &'static str {
        match self {
            UniformBlockSlot::Pipeline => "pipeline",
            UniformBlockSlot::Camera => "camera",
            UniformBlockSlot::LightClusters => "light_clusters",
            UniformBlockSlot::Material => "material",
            UniformBlockSlot::Mesh => "mesh",
        }
    }

    /// The conventional location of the block.
    pub const fn location(self) -> BindingLocation {
        match self {
            UniformBlockSlot::Pipeline => BindingLocation::new(0, 0),
            UniformBlockSlot::Camera => BindingLocation::new(0, 1),
            UniformBlockSlot::LightClusters => BindingLocation::new(1, 0),
            UniformBlockSlot::Material => BindingLocation::new(2, 0),
            UniformBlockSlot::Mesh => BindingLocation::new(3, 0),
        }
    }
}

/// Built-in storage buffers shared by every lit program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinBuffer {
    /// The light parameter array, indexed by light index.
    LightParameters,
    /// Per-cluster light index lists.
    ClusterLightIndices,
    /// Per-cluster light counts.
    ClusterLightCounts,
    /// The global (unbounded range) light list.
    GlobalLightIndices,
}

impl BuiltinBuffer {
    /// Every built-in buffer.
    pub const ALL: [BuiltinBuffer; 4] = [
        BuiltinBuffer::LightParameters,
        BuiltinBuffer::ClusterLightIndices,
        BuiltinBuffer::ClusterLightCounts,
        BuiltinBuffer::GlobalLightIndices,
    ];

    /// The variable name programs must declare the buffer under.
    pub const fn name(self) -> &'static str {
        match self {
            BuiltinBuffer::LightParameters => "light_parameters",
            BuiltinBuffer::ClusterLightIndices => "cluster_light_indices",
            BuiltinBuffer::ClusterLightCounts => "cluster_light_counts",
            BuiltinBuffer::GlobalLightIndices => "global_light_indices",
        }
    }

    /// The conventional location of the buffer.
    pub const fn location(self) -> BindingLocation {
        match self {
            BuiltinBuffer::LightParameters => BindingLocation::new(1, 1),
            BuiltinBuffer::ClusterLightIndices => BindingLocation::new(1, 2),
            BuiltinBuffer::ClusterLightCounts => BindingLocation::new(1, 3),
            BuiltinBuffer::GlobalLightIndices => BindingLocation::new(1, 4),
        }
    }
}

/// Built-in textures with conventional names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTexture {
    /// The shadow map atlas.
    ShadowAtlas,
    /// The WBOIT accumulation target, read by the composite.
    Accumulation,
    /// The WBOIT reveal target, read by the composite.
    Reveal,
    /// A color target read by full-screen passes.
    SourceColor,
}

impl BuiltinTexture {
    /// Every built-in texture.
    pub const ALL: [BuiltinTexture; 4] = [
        BuiltinTexture::ShadowAtlas,
        BuiltinTexture::Accumulation,
        BuiltinTexture::Reveal,
        BuiltinTexture::SourceColor,
    ];

    /// The variable name programs must declare the texture under.
    pub const fn name(self) -> &'static str {
        match self {
            BuiltinTexture::ShadowAtlas => "shadow_atlas",
            BuiltinTexture::Accumulation => "accumulation",
            BuiltinTexture::Reveal => "reveal",
            BuiltinTexture::SourceColor => "source_color",
        }
    }
}

/// A successfully compiled program and its reflection table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    /// The device handle.
    pub id: ProgramId,
    /// The label it was compiled under.
    pub label: String,
    /// Its bindings and entry points.
    pub reflection: ProgramReflection,
}

impl CompiledProgram {
    /// The location of a uniform block, if the program declares it.
    pub fn uniform_block(&self, slot: UniformBlockSlot) -> Option<BindingLocation> {
        self.reflection.binding(slot.name()).map(|b| b.location)
    }

    /// The location of a built-in buffer, if the program declares it.
    pub fn buffer_location(&self, buffer: BuiltinBuffer) -> Option<BindingLocation> {
        self.reflection.binding(buffer.name()).map(|b| b.location)
    }

    /// The location of a built-in texture, if the program declares it.
    pub fn texture_location(&self, texture: BuiltinTexture) -> Option<BindingLocation> {
        self.reflection.binding(texture.name()).map(|b| b.location)
    }

    /// The name of the entry point for `stage`, if any.
    pub fn entry_point(&self, stage: ProgramStage) -> Option<&str> {
        self.reflection
            .entry_point(stage)
            .map(|entry| entry.name.as_str())
    }
}

/// The load state of a program slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramState {
    /// Compiled and usable.
    Loaded(CompiledProgram),
    /// Compilation failed; passes depending on it skip.
    NotLoaded {
        /// Why the last compilation failed.
        reason: String,
    },
}

impl ProgramState {
    /// The compiled program, if loaded.
    pub fn program(&self) -> Option<&CompiledProgram> {
        match self {
            ProgramState::Loaded(program) => Some(program),
            ProgramState::NotLoaded { .. } => None,
        }
    }

    /// Returns `true` if loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(self, ProgramState::Loaded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIT: &str = r#"
@group(0) @binding(1) var<uniform> camera: CameraUniforms;
@group(1) @binding(1) var<storage, read> light_parameters: array<GpuLight>;
@group(1) @binding(3) var<storage, read_write> cluster_light_counts: array<u32>;
// @group(3) @binding(0) var<uniform> mesh: MeshUniforms;
@group(2) @binding(1) var accumulation: texture_2d<f32>;
@group(2) @binding(3) var pyramid_out: texture_storage_2d<r32float, write>;
@group(2) @binding(4) var depth_in: texture_depth_2d;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }

@compute @workgroup_size(8, 8)
fn cs_reduce(@builtin(global_invocation_id) id: vec3<u32>) {}
"#;

    #[test]
    fn test_reflection_finds_bindings_and_entry_points() {
        let r = ProgramReflection::from_wgsl("lit", LIT).unwrap();
        assert_eq!(r.bindings.len(), 6);
        assert_eq!(r.binding("camera").unwrap().kind, BindingKind::Uniform);
        assert_eq!(
            r.binding("light_parameters").unwrap().kind,
            BindingKind::Storage { read_only: true }
        );
        assert_eq!(
            r.binding("cluster_light_counts").unwrap().kind,
            BindingKind::Storage { read_only: false }
        );
        assert_eq!(
            r.binding("pyramid_out").unwrap().kind,
            BindingKind::StorageTexture {
                format: TextureFormat::R32Float
            }
        );
        assert_eq!(
            r.binding("depth_in").unwrap().kind,
            BindingKind::Texture { depth: true }
        );
        assert!(r.binding("mesh").is_none(), "commented-out binding must be ignored");
        assert_eq!(r.entry_point(ProgramStage::Vertex).unwrap().name, "vs_main");
        assert_eq!(r.entry_point(ProgramStage::Fragment).unwrap().name, "fs_main");
        let cs = r.entry_point(ProgramStage::Compute).unwrap();
        assert_eq!(cs.name, "cs_reduce");
        assert_eq!(cs.workgroup_size, Some([8, 8, 1]));
        assert_eq!(r.group_count(), 3);
    }

    #[test]
    fn test_missing_optional_binding_is_absent() {
        let program = CompiledProgram {
            id: ProgramId(1),
            label: "lit".into(),
            reflection: ProgramReflection::from_wgsl("lit", LIT).unwrap(),
        };
        assert_eq!(
            program.uniform_block(UniformBlockSlot::Camera),
            Some(BindingLocation::new(0, 1))
        );
        assert_eq!(program.uniform_block(UniformBlockSlot::Material), None);
        assert_eq!(program.texture_location(BuiltinTexture::ShadowAtlas), None);
        assert!(program.buffer_location(BuiltinBuffer::LightParameters).is_some());
    }

    #[test]
    fn test_module_without_entry_point_fails() {
        let err = ProgramReflection::from_wgsl("empty", "const X = 1;").unwrap_err();
        assert!(err.to_string().contains("no entry point"));
    }

    #[test]
    fn test_duplicate_location_fails() {
        let code = "@group(0) @binding(0) var<uniform> a: A;\n\
                    @group(0) @binding(0) var<uniform> b: B;\n\
                    @compute @workgroup_size(1) fn main() {}";
        assert!(ProgramReflection::from_wgsl("dup", code).is_err());
    }

    #[test]
    fn test_macros_are_prepended() {
        let src = ProgramSource::new("m", "fn f() {}").with_macro("MAX_LIGHTS", 128);
        assert_eq!(src.expanded_code(), "const MAX_LIGHTS = 128;\nfn f() {}");
    }
}

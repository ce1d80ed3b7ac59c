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

use std::borrow::Cow;
use std::collections::BTreeMap;
use umbra_core::math::LinearRgba;
use umbra_core::renderer::MaterialId;

/// How a material's coverage combines with what is behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    /// Fully covers what is behind it. Drawn by the opaque stage.
    #[default]
    Opaque,
    /// Order-independent weighted blending. Drawn by the transparency stage.
    Transparent,
    /// Classic back-to-front alpha blending. Drawn by the blend stage.
    Blend,
}

/// Surface parameters of a group of instances.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Key of the program in the program library.
    pub program: Cow<'static, str>,
    /// Which stage draws the material.
    pub alpha_mode: AlphaMode,
    /// Linear base color; alpha is coverage.
    pub base_color: LinearRgba,
    /// Draw order among materials of the same stage, lowest first.
    pub render_queue: i32,
}

impl Material {
    /// Program key of the default lit opaque program.
    pub const LIT_OPAQUE: &'static str = "lit_opaque";
    /// Program key of the default weighted-blended transparent program.
    pub const LIT_TRANSPARENT: &'static str = "lit_transparent";
    /// Program key of the default alpha-blended program.
    pub const LIT_BLEND: &'static str = "lit_blend";

    /// A lit opaque material.
    pub fn opaque(base_color: LinearRgba) -> Self {
        Self {
            program: Cow::Borrowed(Self::LIT_OPAQUE),
            alpha_mode: AlphaMode::Opaque,
            base_color,
            render_queue: 2000,
        }
    }

    /// A lit material composited with weighted blended transparency.
    pub fn transparent(base_color: LinearRgba) -> Self {
        Self {
            program: Cow::Borrowed(Self::LIT_TRANSPARENT),
            alpha_mode: AlphaMode::Transparent,
            base_color,
            render_queue: 3000,
        }
    }

    /// A lit material drawn with sorted alpha blending.
    pub fn blended(base_color: LinearRgba) -> Self {
        Self {
            program: Cow::Borrowed(Self::LIT_BLEND),
            alpha_mode: AlphaMode::Blend,
            base_color,
            render_queue: 3500,
        }
    }
}

/// Owns the scene's materials.
#[derive(Debug, Default, Clone)]
pub struct MaterialRegistry {
    materials: BTreeMap<MaterialId, Material>,
    next_id: u32,
}

impl MaterialRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a material and returns its identifier.
    pub fn insert(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.next_id);
        self.next_id += 1;
        self.materials.insert(id, material);
        id
    }

    /// The material with `id`.
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    /// Mutable access to the material with `id`.
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    /// Removes a material.
    pub fn remove(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(&id)
    }

    /// Every material, ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials.iter().map(|(id, m)| (*id, m))
    }
}

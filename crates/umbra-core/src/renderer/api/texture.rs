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

//! Defines data structures related to GPU textures.

use crate::umbra_bitflags;
use std::borrow::Cow;

/// The texel formats used by the pipeline's render targets and depth pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA, the presentation format.
    Rgba8Unorm,
    /// 16-bit float RGBA, used for HDR scene color and WBOIT accumulation.
    Rgba16Float,
    /// 16-bit float single channel, used for the WBOIT reveal target.
    R16Float,
    /// 32-bit float single channel, used for the depth pyramid.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Number of channels per texel.
    pub const fn channel_count(self) -> usize {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba16Float => 4,
            TextureFormat::R16Float | TextureFormat::R32Float | TextureFormat::Depth32Float => 1,
        }
    }

    /// Size of one texel in bytes.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::R16Float => 2,
            TextureFormat::R32Float | TextureFormat::Depth32Float => 4,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

umbra_bitflags! {
    /// A set of flags describing the allowed usages of a [`TextureId`].
    pub struct TextureUsage: u32 {
        /// The texture can be the source of a copy.
        const COPY_SRC = 1 << 0;
        /// The texture can be the destination of a copy or write.
        const COPY_DST = 1 << 1;
        /// The texture can be sampled or loaded in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be written as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// The texture can be used as a render pass attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// A 2D size in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl Extent2D {
    /// Creates an extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The size of mip `level`, never smaller than one texel.
    pub fn mip_level_size(self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
        }
    }

    /// Number of texels.
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The size of mip level 0.
    pub size: Extent2D,
    /// The number of mip levels.
    pub mip_level_count: u32,
    /// The texel format.
    pub format: TextureFormat,
    /// How the texture will be used.
    pub usage: TextureUsage,
}

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_size_clamps_to_one() {
        let size = Extent2D::new(640, 3);
        assert_eq!(size.mip_level_size(0), Extent2D::new(640, 3));
        assert_eq!(size.mip_level_size(2), Extent2D::new(160, 1));
        assert_eq!(size.mip_level_size(12), Extent2D::new(1, 1));
    }
}

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

//! CPU-side storage for buffers and textures.

use umbra_core::renderer::{Extent2D, TextureDescriptor, TextureFormat};

#[derive(Debug)]
pub(crate) struct SoftBuffer {
    pub(crate) label: String,
    pub(crate) data: Vec<u8>,
}

impl SoftBuffer {
    /// Reads `len` bytes at `offset`, or fewer if the buffer is shorter.
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }
}

/// A texture stored as `f32` channels, one `Vec` per mip level.
#[derive(Debug)]
pub(crate) struct SoftTexture {
    pub(crate) label: String,
    pub(crate) size: Extent2D,
    pub(crate) format: TextureFormat,
    pub(crate) levels: Vec<Vec<f32>>,
}

impl SoftTexture {
    pub(crate) fn new(descriptor: &TextureDescriptor) -> Self {
        let channels = descriptor.format.channel_count();
        let initial = if descriptor.format.is_depth() { 1.0 } else { 0.0 };
        let levels = (0..descriptor.mip_level_count.max(1))
            .map(|level| vec![initial; descriptor.size.mip_level_size(level).area() * channels])
            .collect();
        Self {
            label: descriptor.label.as_deref().unwrap_or("texture").to_string(),
            size: descriptor.size,
            format: descriptor.format,
            levels,
        }
    }

    #[inline]
    pub(crate) fn channels(&self) -> usize {
        self.format.channel_count()
    }

    pub(crate) fn level_size(&self, level: u32) -> Extent2D {
        self.size.mip_level_size(level)
    }

    /// Channel 0 of one texel; reads outside the level clamp to its edge.
    pub(crate) fn texel(&self, level: u32, x: u32, y: u32) -> f32 {
        let Some(data) = self.levels.get(level as usize) else {
            return 0.0;
        };
        let size = self.level_size(level);
        let x = x.min(size.width - 1) as usize;
        let y = y.min(size.height - 1) as usize;
        data[(y * size.width as usize + x) * self.channels()]
    }

    /// Fills level 0 with `value`, truncated to the format's channel count.
    pub(crate) fn clear(&mut self, value: [f32; 4]) {
        let channels = self.channels();
        if let Some(level) = self.levels.first_mut() {
            for texel in level.chunks_exact_mut(channels) {
                texel.copy_from_slice(&value[..channels]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::TextureUsage;

    fn descriptor(format: TextureFormat, mips: u32) -> TextureDescriptor<'static> {
        TextureDescriptor {
            label: Some("t".into()),
            size: Extent2D::new(4, 2),
            mip_level_count: mips,
            format,
            usage: TextureUsage::TEXTURE_BINDING,
        }
    }

    #[test]
    fn test_depth_textures_start_at_far_plane() {
        let texture = SoftTexture::new(&descriptor(TextureFormat::Depth32Float, 1));
        assert_eq!(texture.levels[0], vec![1.0; 8]);
    }

    #[test]
    fn test_levels_follow_mip_chain() {
        let texture = SoftTexture::new(&descriptor(TextureFormat::R32Float, 3));
        let lengths: Vec<usize> = texture.levels.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![8, 2, 1]);
    }

    #[test]
    fn test_clear_writes_every_channel() {
        let mut texture = SoftTexture::new(&descriptor(TextureFormat::Rgba16Float, 1));
        texture.clear([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(&texture.levels[0][4..8], &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(texture.texel(0, 9, 9), 0.1);
    }
}

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

//! The hierarchical depth pyramid.

use std::borrow::Cow;
use umbra_core::renderer::culling::hiz_mip_count;
use umbra_core::renderer::{
    DeferredDisposal, DisposalSender, Extent2D, GraphicsDevice, ResourceError, TextureDescriptor,
    TextureFormat, TextureId, TextureUsage,
};

/// A max-reduced depth pyramid. Level 0 matches the depth target; each
/// further level halves it and stores the farthest depth of the texels it covers.
#[derive(Debug)]
pub struct HiZBuffer {
    pyramid: Option<TextureId>,
    size: Extent2D,
    mip_count: u32,
    disposal: DisposalSender,
}

impl HiZBuffer {
    /// Creates an empty buffer; the pyramid is allocated on first use.
    pub fn new(disposal: DisposalSender) -> Self {
        Self {
            pyramid: None,
            size: Extent2D::default(),
            mip_count: 0,
            disposal,
        }
    }

    /// `1 + floor(log2(max(width, height)))`.
    #[inline]
    pub fn mip_count(width: u32, height: u32) -> u32 {
        hiz_mip_count(Extent2D::new(width, height))
    }

    /// Allocates the pyramid for a depth target of `size`, replacing an
    /// existing pyramid of another size. Returns `true` if it was (re)allocated.
    pub fn ensure_size(&mut self, device: &dyn GraphicsDevice, size: Extent2D) -> Result<bool, ResourceError> {
        if self.pyramid.is_some() && self.size == size {
            return Ok(false);
        }
        let mip_count = hiz_mip_count(size);
        let pyramid = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("hiz_pyramid")),
            size,
            mip_level_count: mip_count,
            format: TextureFormat::R32Float,
            usage: TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        })?;
        if let Some(old) = self.pyramid.replace(pyramid) {
            self.disposal.dispose(DeferredDisposal::Texture(old));
        }
        self.size = size;
        self.mip_count = mip_count;
        log::debug!("HiZ pyramid allocated: {}x{}, {} levels", size.width, size.height, mip_count);
        Ok(true)
    }

    /// The pyramid texture, once allocated.
    #[inline]
    pub fn texture(&self) -> Option<TextureId> {
        self.pyramid
    }

    /// Size of level 0.
    #[inline]
    pub fn size(&self) -> Extent2D {
        self.size
    }

    /// Number of levels.
    #[inline]
    pub fn level_count(&self) -> u32 {
        self.mip_count
    }
}

impl Drop for HiZBuffer {
    fn drop(&mut self) {
        if let Some(pyramid) = self.pyramid.take() {
            self.disposal.dispose(DeferredDisposal::Texture(pyramid));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_count() {
        assert_eq!(HiZBuffer::mip_count(1920, 1080), 11);
        assert_eq!(HiZBuffer::mip_count(1, 1), 1);
        assert_eq!(HiZBuffer::mip_count(300, 700), 10);
    }
}

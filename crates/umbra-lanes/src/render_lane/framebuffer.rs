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

//! The frame's render targets.

use std::borrow::Cow;
use umbra_core::renderer::{
    DeferredDisposal, DisposalSender, Extent2D, GraphicsDevice, ResourceError, TextureDescriptor,
    TextureFormat, TextureId, TextureUsage,
};

/// Format of the scene color targets.
pub const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Format of the depth target.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Format of the WBOIT accumulation target.
pub const ACCUMULATION_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Format of the WBOIT reveal target.
pub const REVEAL_FORMAT: TextureFormat = TextureFormat::R16Float;

#[derive(Debug, Clone, Copy)]
struct Targets {
    colors: [TextureId; 2],
    depth: TextureId,
    accumulation: TextureId,
    reveal: TextureId,
}

impl Targets {
    fn create(device: &dyn GraphicsDevice, size: Extent2D) -> Result<Self, ResourceError> {
        let target = |label: &'static str, format: TextureFormat| {
            device.create_texture(&TextureDescriptor {
                label: Some(Cow::Borrowed(label)),
                size,
                mip_level_count: 1,
                format,
                usage: TextureUsage::RENDER_ATTACHMENT
                    | TextureUsage::TEXTURE_BINDING
                    | TextureUsage::COPY_SRC,
            })
        };
        Ok(Self {
            colors: [
                target("color_0", COLOR_FORMAT)?,
                target("color_1", COLOR_FORMAT)?,
            ],
            depth: target("depth", DEPTH_FORMAT)?,
            accumulation: target("wboit_accumulation", ACCUMULATION_FORMAT)?,
            reveal: target("wboit_reveal", REVEAL_FORMAT)?,
        })
    }

    fn dispose(&self, disposal: &DisposalSender) {
        for texture in [
            self.colors[0],
            self.colors[1],
            self.depth,
            self.accumulation,
            self.reveal,
        ] {
            disposal.dispose(DeferredDisposal::Texture(texture));
        }
    }
}

/// Double-buffered scene color, a shared depth target, and the WBOIT targets.
///
/// Stages draw into the back color target; [`Framebuffer::swap`] exchanges
/// front and back once the frame is composited.
#[derive(Debug)]
pub struct Framebuffer {
    size: Extent2D,
    targets: Targets,
    back: usize,
    disposal: DisposalSender,
}

impl Framebuffer {
    /// Creates all targets at `size`.
    pub fn new(
        device: &dyn GraphicsDevice,
        size: Extent2D,
        disposal: DisposalSender,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            size,
            targets: Targets::create(device, size)?,
            back: 0,
            disposal,
        })
    }

    /// Recreates the targets at a new size. Returns `false` if the size did
    /// not change.
    pub fn resize(&mut self, device: &dyn GraphicsDevice, size: Extent2D) -> Result<bool, ResourceError> {
        if size == self.size {
            return Ok(false);
        }
        let targets = Targets::create(device, size)?;
        self.targets.dispose(&self.disposal);
        self.targets = targets;
        self.size = size;
        log::info!("Framebuffer resized to {}x{}", size.width, size.height);
        Ok(true)
    }

    /// Exchanges the front and back color targets.
    pub fn swap(&mut self) {
        self.back ^= 1;
    }

    /// Size of every target.
    #[inline]
    pub fn size(&self) -> Extent2D {
        self.size
    }

    /// The color target being drawn this frame.
    #[inline]
    pub fn back_color(&self) -> TextureId {
        self.targets.colors[self.back]
    }

    /// The color target completed last frame.
    #[inline]
    pub fn front_color(&self) -> TextureId {
        self.targets.colors[self.back ^ 1]
    }

    /// The depth target.
    #[inline]
    pub fn depth(&self) -> TextureId {
        self.targets.depth
    }

    /// The WBOIT accumulation target.
    #[inline]
    pub fn accumulation(&self) -> TextureId {
        self.targets.accumulation
    }

    /// The WBOIT reveal target.
    #[inline]
    pub fn reveal(&self) -> TextureId {
        self.targets.reveal
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.targets.dispose(&self.disposal);
    }
}

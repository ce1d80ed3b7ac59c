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

use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    BindingKind, BlendComponent, BlendFactor, BlendState, BufferUsage, CompareFunction,
    DepthState, Extent2D, LoadOp, TextureFormat, TextureUsage,
};

/// A local extension trait to convert our engine's types into WGPU-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

// --- Dimensions ---

impl IntoWgpu<wgpu::Extent3d> for Extent2D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width.max(1),
            height: self.height.max(1),
            depth_or_array_layers: 1,
        }
    }
}

// --- Textures ---

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl IntoWgpu<wgpu::TextureUsages> for TextureUsage {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        if self.contains(TextureUsage::COPY_SRC) {
            usages |= wgpu::TextureUsages::COPY_SRC;
        }
        if self.contains(TextureUsage::COPY_DST) {
            usages |= wgpu::TextureUsages::COPY_DST;
        }
        if self.contains(TextureUsage::TEXTURE_BINDING) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(TextureUsage::STORAGE_BINDING) {
            usages |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if self.contains(TextureUsage::RENDER_ATTACHMENT) {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        usages
    }
}

// --- Buffers ---

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let mut usages = wgpu::BufferUsages::empty();
        if self.contains(BufferUsage::MAP_READ) {
            usages |= wgpu::BufferUsages::MAP_READ;
        }
        if self.contains(BufferUsage::COPY_SRC) {
            usages |= wgpu::BufferUsages::COPY_SRC;
        }
        if self.contains(BufferUsage::COPY_DST) {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        if self.contains(BufferUsage::VERTEX) {
            usages |= wgpu::BufferUsages::VERTEX;
        }
        if self.contains(BufferUsage::INDEX) {
            usages |= wgpu::BufferUsages::INDEX;
        }
        if self.contains(BufferUsage::UNIFORM) {
            usages |= wgpu::BufferUsages::UNIFORM;
        }
        if self.contains(BufferUsage::STORAGE) {
            usages |= wgpu::BufferUsages::STORAGE;
        }
        if self.contains(BufferUsage::INDIRECT) {
            usages |= wgpu::BufferUsages::INDIRECT;
        }
        usages
    }
}

// --- Pipeline state ---

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        }
    }
}

impl IntoWgpu<wgpu::BlendComponent> for BlendComponent {
    fn into_wgpu(self) -> wgpu::BlendComponent {
        wgpu::BlendComponent {
            src_factor: self.src_factor.into_wgpu(),
            dst_factor: self.dst_factor.into_wgpu(),
            operation: wgpu::BlendOperation::Add,
        }
    }
}

impl IntoWgpu<wgpu::BlendState> for BlendState {
    fn into_wgpu(self) -> wgpu::BlendState {
        wgpu::BlendState {
            color: self.color.into_wgpu(),
            alpha: self.alpha.into_wgpu(),
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// Builds the depth-stencil state of a pipeline writing `format`.
pub fn depth_stencil_state(format: TextureFormat, depth: DepthState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: format.into_wgpu(),
        depth_write_enabled: Some(depth.write_enabled),
        depth_compare: Some(depth.compare.into_wgpu()),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

// --- Bindings ---

/// Converts a reflected binding kind into a layout entry type.
pub fn binding_type(kind: BindingKind) -> wgpu::BindingType {
    match kind {
        BindingKind::Uniform => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::Storage { read_only } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::Texture { depth } => wgpu::BindingType::Texture {
            sample_type: if depth {
                wgpu::TextureSampleType::Depth
            } else {
                wgpu::TextureSampleType::Float { filterable: false }
            },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        BindingKind::StorageTexture { format } => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: format.into_wgpu(),
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        BindingKind::Sampler => {
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
        }
    }
}

// --- Pass operations ---

impl IntoWgpu<wgpu::LoadOp<wgpu::Color>> for LoadOp<LinearRgba> {
    fn into_wgpu(self) -> wgpu::LoadOp<wgpu::Color> {
        match self {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(color) => wgpu::LoadOp::Clear(wgpu::Color {
                r: color.r as f64,
                g: color.g as f64,
                b: color.b as f64,
                a: color.a as f64,
            }),
        }
    }
}

impl IntoWgpu<wgpu::LoadOp<f32>> for LoadOp<f32> {
    fn into_wgpu(self) -> wgpu::LoadOp<f32> {
        match self {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(depth) => wgpu::LoadOp::Clear(depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_maps_each_flag() {
        let usage = BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::COPY_DST;
        let wgpu_usage: wgpu::BufferUsages = usage.into_wgpu();
        assert_eq!(
            wgpu_usage,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST
        );
    }

    #[test]
    fn test_reveal_blend_keeps_one_minus_src_alpha() {
        let blend: wgpu::BlendState = BlendState::REVEAL.into_wgpu();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::Zero);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn test_depth_texture_binding_uses_depth_sample_type() {
        match binding_type(BindingKind::Texture { depth: true }) {
            wgpu::BindingType::Texture { sample_type, .. } => {
                assert_eq!(sample_type, wgpu::TextureSampleType::Depth)
            }
            other => panic!("unexpected binding type {other:?}"),
        }
    }

    #[test]
    fn test_empty_extent_is_clamped_to_one_texel() {
        let extent: wgpu::Extent3d = Extent2D::new(0, 4).into_wgpu();
        assert_eq!((extent.width, extent.height), (1, 4));
    }
}

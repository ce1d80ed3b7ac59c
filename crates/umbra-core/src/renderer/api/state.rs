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

//! Fixed-function blend and depth state.

/// The maximum number of color targets a pass can write simultaneously.
pub const MAX_COLOR_TARGETS: usize = 2;

/// A multiplier applied to the source or destination term of a blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0`.
    Zero,
    /// `1`.
    One,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    OneMinusSrcAlpha,
    /// `1 - source color`.
    OneMinusSrcColor,
}

impl BlendFactor {
    /// Evaluates the factor for one channel.
    #[inline]
    pub fn factor(self, src_channel: f32, src_alpha: f32) -> f32 {
        match self {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::SrcAlpha => src_alpha,
            BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
            BlendFactor::OneMinusSrcColor => 1.0 - src_channel,
        }
    }
}

/// A blend equation for one group of channels: `src * src_factor + dst * dst_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// The factor applied to the fragment output.
    pub src_factor: BlendFactor,
    /// The factor applied to the value already in the target.
    pub dst_factor: BlendFactor,
}

impl BlendComponent {
    /// Builds a component.
    pub const fn new(src_factor: BlendFactor, dst_factor: BlendFactor) -> Self {
        Self {
            src_factor,
            dst_factor,
        }
    }
}

/// The blend state of one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// The equation for the RGB channels.
    pub color: BlendComponent,
    /// The equation for the alpha channel.
    pub alpha: BlendComponent,
}

impl BlendState {
    /// `One, One`: plain accumulation.
    pub const ADDITIVE: Self = Self::uniform(BlendFactor::One, BlendFactor::One);
    /// `Zero, OneMinusSrcAlpha`: multiplies the target by the fragment's transmittance.
    pub const REVEAL: Self = Self::uniform(BlendFactor::Zero, BlendFactor::OneMinusSrcAlpha);
    /// `One, OneMinusSrcAlpha`: "over" for premultiplied colors.
    pub const PREMULTIPLIED_OVER: Self =
        Self::uniform(BlendFactor::One, BlendFactor::OneMinusSrcAlpha);
    /// `SrcAlpha, OneMinusSrcAlpha`: classic alpha blending.
    pub const ALPHA_BLENDING: Self =
        Self::uniform(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);

    /// The same equation for color and alpha.
    pub const fn uniform(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            color: BlendComponent::new(src, dst),
            alpha: BlendComponent::new(src, dst),
        }
    }

    /// Applies the blend to an RGBA pair.
    pub fn apply(&self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        let a = src[3];
        let mut out = [0.0; 4];
        for i in 0..4 {
            let component = if i < 3 { self.color } else { self.alpha };
            out[i] = src[i] * component.src_factor.factor(src[i], a)
                + dst[i] * component.dst_factor.factor(src[i], a);
        }
        out
    }
}

/// The comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less than the stored one.
    Less,
    /// Passes if the new value is less than or equal to the stored one.
    LessEqual,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is greater than the stored one.
    Greater,
    /// Always passes.
    Always,
}

impl CompareFunction {
    /// Evaluates the comparison.
    #[inline]
    pub fn passes(self, new: f32, stored: f32) -> bool {
        match self {
            CompareFunction::Never => false,
            CompareFunction::Less => new < stored,
            CompareFunction::LessEqual => new <= stored,
            CompareFunction::Equal => new == stored,
            CompareFunction::Greater => new > stored,
            CompareFunction::Always => true,
        }
    }
}

/// Depth test and write state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// The depth comparison.
    pub compare: CompareFunction,
    /// Whether passing fragments write their depth.
    pub write_enabled: bool,
}

impl DepthState {
    /// `Less` with writes, the default state.
    pub const DEFAULT: Self = Self {
        compare: CompareFunction::Less,
        write_enabled: true,
    };
    /// `LessEqual` without writes, for passes after the depth pre-pass.
    pub const READ_ONLY: Self = Self {
        compare: CompareFunction::LessEqual,
        write_enabled: false,
    };
    /// Always passes and never writes.
    pub const DISABLED: Self = Self {
        compare: CompareFunction::Always,
        write_enabled: false,
    };
}

impl Default for DepthState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The fixed-function state a draw executes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    /// Depth test and write.
    pub depth: DepthState,
    /// Per-target blending; `None` replaces the target value.
    pub blend: [Option<BlendState>; MAX_COLOR_TARGETS],
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            depth: DepthState::DEFAULT,
            blend: [None; MAX_COLOR_TARGETS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_blend_multiplies_by_transmittance() {
        let out = BlendState::REVEAL.apply([0.3, 0.0, 0.0, 0.25], [1.0, 0.0, 0.0, 1.0]);
        assert!((out[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_additive_blend_accumulates() {
        let out = BlendState::ADDITIVE.apply([0.1, 0.2, 0.3, 0.5], [1.0, 1.0, 1.0, 1.0]);
        for (got, want) in out.iter().zip([1.1, 1.2, 1.3, 1.5]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_compare_functions() {
        assert!(CompareFunction::Less.passes(0.2, 0.5));
        assert!(!CompareFunction::Less.passes(0.5, 0.5));
        assert!(CompareFunction::LessEqual.passes(0.5, 0.5));
        assert!(CompareFunction::Always.passes(1.0, 0.0));
    }
}

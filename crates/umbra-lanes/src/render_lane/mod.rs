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

//! Render stages and the per-frame resources they share.
//!
//! Each stage implements [`RenderStage`] and records into the encoder of the
//! [`RenderContext`] it is handed. The agent runs them in
//! [`StageId::PIPELINE`] order and submits after each one.

mod blend_lane;
mod composite_lane;
mod context;
mod cull_lane;
mod depth_prepass_lane;
mod draw;
mod framebuffer;
mod hiz;
mod hiz_generate_lane;
mod opaque_lane;
pub mod programs;
pub mod shaders;
mod skybox_lane;
mod stage;
mod transparency_lane;

pub use blend_lane::*;
pub use composite_lane::*;
pub use context::*;
pub use cull_lane::*;
pub use depth_prepass_lane::*;
pub use draw::*;
pub use framebuffer::*;
pub use hiz::*;
pub use hiz_generate_lane::*;
pub use opaque_lane::*;
pub use programs::{builtin_source, ProgramLibrary, BUILTIN_PROGRAMS};
pub use skybox_lane::*;
pub use stage::*;
pub use transparency_lane::*;

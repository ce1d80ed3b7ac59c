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

//! Scene-side state of the renderer.
//!
//! Everything in this crate is owned and mutated by the update thread. The
//! render thread reads it and applies pending GPU writes once per frame through
//! [`InstanceLibrary::sync`](instance::InstanceLibrary::sync).

#![warn(missing_docs)]

pub mod assets;
pub mod camera;
pub mod config;
pub mod entity;
pub mod instance;
pub mod light;

pub use camera::CameraState;
pub use entity::EntityId;
pub use instance::{GroupKey, InstanceError, InstanceGroup, InstanceLibrary, InstanceLocation};
pub use light::{LightHandle, LightSnapshot, LightStore};

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

//! The **[A]gent** of the rendering subsystem.
//!
//! [`RenderAgent`] owns the ordered stage pipeline, the per-frame device
//! resources and the program library. Each call to
//! [`RenderAgent::render_frame`] drains deferred disposals, syncs the
//! scene's instance groups, then runs every stage in order with a fresh
//! encoder and submits after each one, so counter queries written by a
//! stage are resolved before the next one reads them.

mod agent;
mod scene;

pub use agent::*;
pub use scene::*;

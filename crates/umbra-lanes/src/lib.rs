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

//! Hot-path render stages.
//!
//! - [`light_lane`]: the light clusterer and its worker pool.
//! - [`render_lane`]: culling, depth, draw and composite stages, and the
//!   per-frame resources they share.

#![warn(missing_docs)]

pub mod light_lane;
pub mod render_lane;

pub use light_lane::{ClusterConfig, ClusterGrid, ClusterLightsLane, ClusterWorkerPool};
pub use render_lane::*;

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

//! Clustered light assignment.
//!
//! The view frustum is split into an `X × Y × Z` grid with exponential depth
//! slices. Each frame every light is assigned to the clusters it overlaps by a
//! fixed pool of worker threads; lights without a finite range go to a small
//! global list instead.

mod assignment;
mod cluster_lane;
mod error;
mod grid;
mod pool;

pub use assignment::{assign_lights, cone_intersects_sphere, ClusterAssignment};
pub use cluster_lane::{ClusterBuffers, ClusterLightsLane, ClusterSummary};
pub use error::ClusterError;
pub use grid::{
    ClusterConfig, ClusterGrid, ClusterRange, CLUSTER_GRID_X, CLUSTER_GRID_Y, CLUSTER_GRID_Z,
    MAX_GLOBAL_LIGHTS, MAX_LIGHTS_PER_CLUSTER,
};
pub use pool::{split_ranges, ClusterFrame, ClusterWorkerPool};

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

//! Batched per-instance storage grouped by (mesh, material).

mod error;
mod group;
mod library;
mod mapped_buffer;

pub use self::error::InstanceError;
pub use self::group::{GroupGpu, GroupKey, GroupViews, InstanceGroup};
pub use self::library::{InstanceLibrary, InstanceLocation};
pub use self::mapped_buffer::{grown_capacity, MappedBuffer, MIN_GROWTH_STEP};

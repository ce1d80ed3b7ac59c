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

use crate::entity::EntityId;
use thiserror::Error;

/// Errors returned by instance-library operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// The entity already owns an instance.
    #[error("entity {0} already has a render instance")]
    DuplicateEntity(EntityId),
    /// The entity owns no instance.
    #[error("entity {0} has no render instance")]
    UnknownEntity(EntityId),
    /// An index past the live range of a group.
    #[error("instance index {index} out of bounds (count {count})")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The group's live count.
        count: usize,
    },
}

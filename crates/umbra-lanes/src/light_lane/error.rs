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

use thiserror::Error;

/// Errors raised by the light clusterer.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A worker thread could not be started.
    #[error("failed to spawn cluster worker: {0}")]
    Spawn(#[source] std::io::Error),
    /// The worker threads are gone.
    #[error("cluster worker pool disconnected")]
    PoolDisconnected,
}

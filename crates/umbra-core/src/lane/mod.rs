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

//! # Lane Abstraction
//!
//! A **Lane** is one processing step owned and driven by an agent. The base
//! trait here carries identity only; domain traits extend it with an
//! execution method over their own explicit context type (for rendering,
//! `RenderStage: Lane` in `umbra-lanes` executes over a `RenderContext`).

use std::fmt;

/// Error type for lane operations.
#[derive(Debug)]
pub enum LaneError {
    /// A domain-specific error occurred during execution.
    ExecutionFailed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::ExecutionFailed(e) => write!(f, "Lane execution failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::ExecutionFailed(e) => Some(e.as_ref()),
        }
    }
}

impl LaneError {
    /// Wraps any error as an execution failure.
    pub fn execution(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        LaneError::ExecutionFailed(Box::new(err))
    }
}

/// The base trait shared by every lane.
pub trait Lane: Send + Sync {
    /// Human-readable name identifying this lane's strategy (e.g. `"FrustumCull"`).
    /// Agents use it to label the work they record for the lane.
    fn strategy_name(&self) -> &'static str;
}

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

//! Hardware counter queries.
//!
//! Every culling dispatch records its survivor count into a counter query. The
//! result resolves asynchronously; readers never block on it.

/// An opaque handle to a counter query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub usize);

/// The current state of a counter query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// The device has not produced a value yet.
    Pending,
    /// The resolved count.
    Ready(u32),
}

impl QueryResult {
    /// The resolved count, treating a pending query as zero.
    #[inline]
    pub fn count_or_zero(self) -> u32 {
        match self {
            QueryResult::Pending => 0,
            QueryResult::Ready(count) => count,
        }
    }

    /// Returns `true` once the value has resolved.
    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, QueryResult::Ready(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_query_counts_as_zero() {
        assert_eq!(QueryResult::Pending.count_or_zero(), 0);
        assert_eq!(QueryResult::Ready(7).count_or_zero(), 7);
        assert!(!QueryResult::Pending.is_ready());
    }
}

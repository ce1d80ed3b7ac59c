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

//! The fixed pool of light-clustering worker threads.

use super::assignment::{assign_lights, ClusterAssignment};
use super::error::ClusterError;
use super::grid::ClusterGrid;
use crossbeam_channel::{Receiver, Sender};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use umbra_core::math::Mat4;
use umbra_data::LightSnapshot;

/// Splits `0..len` into `parts` contiguous, near-equal ranges. The first
/// `len % parts` ranges hold one extra element.
pub fn split_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let (base, remainder) = (len / parts, len % parts);
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < remainder);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Everything the workers read for one frame. Immutable once dispatched,
/// except for the atomic lists in `assignment`.
#[derive(Debug, Clone)]
pub struct ClusterFrame {
    /// The lights, captured at the start of the frame.
    pub snapshot: Arc<LightSnapshot>,
    /// The cluster cells.
    pub grid: Arc<ClusterGrid>,
    /// World to view space.
    pub view: Mat4,
    /// The shared output lists.
    pub assignment: Arc<ClusterAssignment>,
}

struct ClusterJob {
    frame: Arc<ClusterFrame>,
    range: Range<usize>,
    completed: Arc<AtomicUsize>,
}

// Counts a job as finished even if the assignment panicked.
struct CompletionGuard(Arc<AtomicUsize>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Release);
    }
}

fn run_job(job: ClusterJob) {
    let _guard = CompletionGuard(job.completed);
    let frame = &job.frame;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        assign_lights(
            job.range.clone(),
            &frame.snapshot,
            &frame.view,
            &frame.grid,
            &frame.assignment,
        )
    }));
    if result.is_err() {
        log::error!("Cluster worker panicked on lights {:?}", job.range);
    }
}

/// A fixed set of worker threads that assign lights to clusters.
///
/// The render thread splits the light snapshot into one range per worker,
/// sends the jobs, and busy-waits on a completion counter. With zero workers
/// the assignment runs on the calling thread.
#[derive(Debug)]
pub struct ClusterWorkerPool {
    sender: Option<Sender<ClusterJob>>,
    workers: Vec<thread::JoinHandle<()>>,
    completed: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ClusterJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterJob").field("range", &self.range).finish()
    }
}

impl ClusterWorkerPool {
    /// Spawns `worker_count` threads.
    ///
    /// ## Errors
    /// * `ClusterError::Spawn` - If a thread cannot be spawned.
    pub fn new(worker_count: usize) -> Result<Self, ClusterError> {
        let (sender, receiver) = crossbeam_channel::unbounded::<ClusterJob>();
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let receiver: Receiver<ClusterJob> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("umbra-cluster-{i}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        run_job(job);
                    }
                })
                .map_err(ClusterError::Spawn)?;
            workers.push(handle);
        }
        log::info!("Cluster worker pool started with {} threads", worker_count);
        Ok(Self {
            sender: (worker_count > 0).then_some(sender),
            workers,
            completed: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of worker threads.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Assigns every light of `frame.snapshot` and returns once all ranges
    /// are done.
    ///
    /// ## Errors
    /// * `ClusterError::PoolDisconnected` - If the workers have shut down.
    pub fn dispatch_and_wait(&self, frame: Arc<ClusterFrame>) -> Result<(), ClusterError> {
        let len = frame.snapshot.len();
        let Some(sender) = self.sender.as_ref() else {
            assign_lights(0..len, &frame.snapshot, &frame.view, &frame.grid, &frame.assignment);
            return Ok(());
        };

        let ranges = split_ranges(len, self.workers.len());
        let expected = ranges.len();
        self.completed.store(0, Ordering::Release);
        for range in ranges {
            let job = ClusterJob {
                frame: Arc::clone(&frame),
                range,
                completed: Arc::clone(&self.completed),
            };
            sender.send(job).map_err(|_| ClusterError::PoolDisconnected)?;
        }

        while self.completed.load(Ordering::Acquire) < expected {
            if self.workers.iter().all(|w| w.is_finished()) {
                return Err(ClusterError::PoolDisconnected);
            }
            std::hint::spin_loop();
        }
        Ok(())
    }
}

impl Drop for ClusterWorkerPool {
    fn drop(&mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("Cluster worker exited with a panic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ranges_remainder_goes_first() {
        assert_eq!(split_ranges(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(split_ranges(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
        assert_eq!(split_ranges(0, 2), vec![0..0, 0..0]);
        assert_eq!(split_ranges(5, 0), vec![0..5]);
    }

    #[test]
    fn test_pool_shuts_down_cleanly() {
        let pool = ClusterWorkerPool::new(3).unwrap();
        assert_eq!(pool.worker_count(), 3);
        drop(pool);
    }
}

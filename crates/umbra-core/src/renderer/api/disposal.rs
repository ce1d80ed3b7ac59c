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

//! Deferred destruction of device resources.
//!
//! Device handles may only be destroyed on the render thread. Any other thread
//! enqueues the handle through a [`DisposalSender`]; the render thread drains
//! the queue once per frame.

use super::buffer::BufferId;
use super::program::ProgramId;
use super::query::QueryId;
use super::texture::TextureId;
use crate::renderer::traits::GraphicsDevice;

/// A device resource awaiting destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredDisposal {
    /// A buffer.
    Buffer(BufferId),
    /// A texture.
    Texture(TextureId),
    /// A counter query.
    Query(QueryId),
    /// A compiled program.
    Program(ProgramId),
}

/// A cloneable handle for enqueueing disposals from any thread.
#[derive(Debug, Clone)]
pub struct DisposalSender {
    sender: flume::Sender<DeferredDisposal>,
}

impl DisposalSender {
    /// Enqueues a resource. Silently dropped if the queue is gone, since the
    /// device that owned the resource is gone with it.
    pub fn dispose(&self, item: DeferredDisposal) {
        if self.sender.send(item).is_err() {
            log::trace!("DisposalQueue: receiver dropped, discarding {item:?}");
        }
    }
}

/// The render-thread end of the deferred disposal queue.
#[derive(Debug)]
pub struct DisposalQueue {
    sender: flume::Sender<DeferredDisposal>,
    receiver: flume::Receiver<DeferredDisposal>,
}

impl DisposalQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// A handle for other threads.
    pub fn sender(&self) -> DisposalSender {
        DisposalSender {
            sender: self.sender.clone(),
        }
    }

    /// Number of pending disposals.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Destroys every pending resource. Must be called on the render thread.
    ///
    /// Returns the number of resources destroyed. Failures are logged and do not
    /// stop the drain.
    pub fn drain(&self, device: &dyn GraphicsDevice) -> usize {
        let mut destroyed = 0;
        for item in self.receiver.try_iter() {
            let result = match item {
                DeferredDisposal::Buffer(id) => device.destroy_buffer(id),
                DeferredDisposal::Texture(id) => device.destroy_texture(id),
                DeferredDisposal::Query(id) => device.destroy_query(id),
                DeferredDisposal::Program(id) => device.destroy_program(id),
            };
            match result {
                Ok(()) => destroyed += 1,
                Err(e) => log::warn!("DisposalQueue: failed to destroy {item:?}: {e}"),
            }
        }
        if destroyed > 0 {
            log::debug!("DisposalQueue: destroyed {destroyed} deferred resource(s)");
        }
        destroyed
    }
}

impl Default for DisposalQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_enqueues_from_another_thread() {
        let queue = DisposalQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            sender.dispose(DeferredDisposal::Buffer(BufferId(3)));
            sender.dispose(DeferredDisposal::Query(QueryId(4)));
        })
        .join()
        .unwrap();
        assert_eq!(queue.pending(), 2);
    }
}

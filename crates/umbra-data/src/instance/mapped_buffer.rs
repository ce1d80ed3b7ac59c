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

//! A typed, bounds-checked CPU mirror of a growable GPU buffer.

use bytemuck::{Pod, Zeroable};
use std::ops::{Index, IndexMut, Range};

/// The smallest number of elements a growth step adds.
pub const MIN_GROWTH_STEP: usize = 6;

/// Returns the capacity a buffer of `current` elements grows to so that it
/// holds at least `requested` elements.
///
/// Capacity starts at 1 and doubles, adding at least [`MIN_GROWTH_STEP`]
/// elements per step.
pub fn grown_capacity(current: usize, requested: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < requested {
        capacity = (capacity * 2).max(capacity + MIN_GROWTH_STEP);
    }
    capacity
}

/// A fixed-element-type buffer whose contents are uploaded to the device at
/// one synchronization point per frame.
///
/// Elements `[0, len)` are live. Writes mark a dirty range; growth reallocates
/// the storage, copies only the live elements, and bumps
/// [`generation`](MappedBuffer::generation) so the owner knows to reallocate
/// the device buffer and rebind its views.
#[derive(Debug, Clone)]
pub struct MappedBuffer<T: Pod> {
    data: Box<[T]>,
    len: usize,
    dirty: Option<Range<usize>>,
    generation: u64,
}

impl<T: Pod> Default for MappedBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod> MappedBuffer<T> {
    /// Creates an empty buffer with a capacity of one element.
    pub fn new() -> Self {
        Self {
            data: vec![T::zeroed(); 1].into_boxed_slice(),
            len: 0,
            dirty: None,
            generation: 0,
        }
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no element is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the storage can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Incremented every time the storage is reallocated.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The live elements.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    /// The live elements as bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    /// The element at `index`, if it is live.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Grows the storage to hold at least `requested` elements.
    ///
    /// Returns `true` if the storage was reallocated. Only live elements are
    /// copied into the new storage.
    pub fn ensure_capacity(&mut self, requested: usize) -> bool {
        if requested <= self.capacity() {
            return false;
        }
        let capacity = grown_capacity(self.capacity(), requested);
        let mut data = vec![T::zeroed(); capacity].into_boxed_slice();
        data[..self.len].copy_from_slice(&self.data[..self.len]);
        self.data = data;
        self.generation += 1;
        if self.len > 0 {
            self.dirty = Some(0..self.len);
        }
        log::trace!("MappedBuffer grown to {} elements (gen {})", capacity, self.generation);
        true
    }

    /// Appends an element and returns its index.
    pub fn push(&mut self, value: T) -> usize {
        let index = self.len;
        self.ensure_capacity(index + 1);
        self.data[index] = value;
        self.len += 1;
        self.mark_dirty(index);
        index
    }

    /// Removes the element at `index` by moving the last live element into
    /// its slot.
    ///
    /// Returns the removed element, or `None` if `index` is not live.
    pub fn swap_remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let last = self.len - 1;
        let removed = self.data[index];
        if index != last {
            self.data[index] = self.data[last];
            self.mark_dirty(index);
        }
        self.data[last] = T::zeroed();
        self.len = last;
        Some(removed)
    }

    /// Takes the range of live elements written since the last call.
    pub fn take_dirty(&mut self) -> Option<Range<usize>> {
        let range = self.dirty.take()?;
        let end = range.end.min(self.len);
        (range.start < end).then_some(range.start..end)
    }

    fn mark_dirty(&mut self, index: usize) {
        self.dirty = Some(match self.dirty.take() {
            Some(r) => r.start.min(index)..r.end.max(index + 1),
            None => index..index + 1,
        });
    }
}

impl<T: Pod> Index<usize> for MappedBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        assert!(
            index < self.len,
            "MappedBuffer index {index} out of bounds (len {})",
            self.len
        );
        &self.data[index]
    }
}

impl<T: Pod> IndexMut<usize> for MappedBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(
            index < self.len,
            "MappedBuffer index {index} out of bounds (len {})",
            self.len
        );
        self.mark_dirty(index);
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_sequence() {
        assert_eq!(grown_capacity(1, 1), 1);
        assert_eq!(grown_capacity(1, 2), 7);
        assert_eq!(grown_capacity(7, 8), 14);
        assert_eq!(grown_capacity(1, 15), 28);
        assert_eq!(grown_capacity(0, 0), 1);
    }

    #[test]
    fn test_growth_preserves_live_entries_bit_for_bit() {
        let mut buffer = MappedBuffer::<[u32; 2]>::new();
        for i in 0..5u32 {
            buffer.push([i, i.wrapping_mul(0x9E37_79B9)]);
        }
        let before: Vec<[u32; 2]> = buffer.as_slice().to_vec();
        let generation = buffer.generation();

        assert!(buffer.ensure_capacity(100));
        assert!(buffer.capacity() >= 100);
        assert_eq!(buffer.generation(), generation + 1);
        assert_eq!(buffer.as_slice(), before.as_slice());
        assert!(!buffer.ensure_capacity(50));
    }

    #[test]
    fn test_swap_remove_fills_gap_with_last() {
        let mut buffer = MappedBuffer::<u32>::new();
        for v in [10, 11, 12, 13] {
            buffer.push(v);
        }
        let _ = buffer.take_dirty();

        assert_eq!(buffer.swap_remove(1), Some(11));
        assert_eq!(buffer.as_slice(), &[10, 13, 12]);
        assert_eq!(buffer.take_dirty(), Some(1..2));

        assert_eq!(buffer.swap_remove(2), Some(12));
        assert_eq!(buffer.as_slice(), &[10, 13]);
        assert_eq!(buffer.take_dirty(), None);
        assert_eq!(buffer.swap_remove(5), None);
    }

    #[test]
    fn test_index_mut_marks_dirty() {
        let mut buffer = MappedBuffer::<u32>::new();
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        let _ = buffer.take_dirty();
        buffer[2] = 30;
        buffer[1] = 20;
        assert_eq!(buffer.take_dirty(), Some(1..3));
        assert_eq!(buffer[2], 30);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_past_len_panics() {
        let mut buffer = MappedBuffer::<u32>::new();
        buffer.push(1);
        let _ = buffer[1];
    }
}

//! Ring Buffer Implementation

use crate::RingBufferError;

/// Default buffer capacity (1000 samples = 10 s at 100 Hz)
pub const DEFAULT_CAPACITY: usize = 1000;

/// Fixed-capacity circular store, overwrites the oldest entry when full.
///
/// Logical index 0 is the oldest retained item and `len() - 1` the most
/// recent. Storage is reserved up front and never grows past `capacity`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage
    storage: Vec<T>,
    /// Capacity of the buffer
    capacity: usize,
    /// Next physical write position
    head: usize,
    /// Number of retained items
    len: usize,
    /// Total items ever pushed (for statistics)
    total_written: u64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Create a buffer with default capacity (1000 samples)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Push an item (overwrites oldest if full)
    pub fn push(&mut self, item: T) {
        if self.storage.len() < self.capacity {
            self.storage.push(item);
        } else {
            self.storage[self.head] = item;
        }
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
        self.total_written += 1;
    }

    /// Get the number of items currently retained
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len as f64 / self.capacity as f64
    }

    /// Total items pushed since construction, including evicted ones
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    fn physical(&self, index: usize) -> usize {
        (self.head + self.capacity - self.len + index) % self.capacity
    }

    /// Checked access by logical index (0 = oldest)
    pub fn at(&self, index: usize) -> Result<&T, RingBufferError> {
        self.get(index).ok_or(RingBufferError::IndexOutOfRange {
            index,
            len: self.len,
        })
    }

    /// Access by logical index, `None` past the end
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.storage.get(self.physical(index))
    }

    /// Most recently pushed item
    pub fn latest(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Oldest retained item
    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            buffer: self,
            front: 0,
            back: self.len,
        }
    }

    /// Visit every retained item with its logical index, oldest first
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T, usize),
    {
        for (i, item) in self.iter().enumerate() {
            f(item, i);
        }
    }

    /// Reset to empty, keeping the allocation
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = 0;
        self.len = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Read the last N items (most recent first)
    pub fn read_last(&self, count: usize) -> Vec<T> {
        self.iter().rev().take(count).cloned().collect()
    }
}

/// Oldest-to-newest iterator over a [`RingBuffer`]
pub struct Iter<'a, T> {
    buffer: &'a RingBuffer<T>,
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.buffer.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.buffer.get(self.back)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//! Broadcast Slot Pool

use metrics::counter;
use std::sync::Arc;
use tracing::debug;

/// Bytes per slot, enough for one formatted state message
pub const SLOT_CAPACITY: usize = 512;

/// Default number of rotating slots
pub const DEFAULT_POOL_SIZE: usize = 4;

/// One reusable serialization buffer plus its valid length
#[derive(Clone)]
pub struct BroadcastSlot {
    data: [u8; SLOT_CAPACITY],
    len: usize,
    /// Pool-wide fill counter at the time this slot was written
    sequence: u64,
}

impl BroadcastSlot {
    pub fn new() -> Self {
        Self {
            data: [0; SLOT_CAPACITY],
            len: 0,
            sequence: 0,
        }
    }

    /// Valid bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Valid bytes as UTF-8 text, `None` if they are not
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Zero length means "nothing to send"
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for BroadcastSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastSlot")
            .field("len", &self.len)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Fixed ring of K shared slots, handed out round-robin.
///
/// A slot is only rewritten in place when the pool holds the sole
/// reference. If a slow consumer still holds the slot the pool is rotating
/// back to, that entry is replaced with a fresh slot and the old one is
/// freed when its last holder drops it.
pub struct BroadcastPool {
    slots: Vec<Arc<BroadcastSlot>>,
    next: usize,
    fills: u64,
    displaced: u64,
}

impl BroadcastPool {
    /// Create a pool of `size` slots
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "broadcast pool needs at least one slot");
        Self {
            slots: (0..size).map(|_| Arc::new(BroadcastSlot::new())).collect(),
            next: 0,
            fills: 0,
            displaced: 0,
        }
    }

    /// Write the next slot in round-robin order and return a shared handle.
    ///
    /// `write` receives the slot's full buffer and returns how many bytes
    /// it filled; 0 marks the slot as empty.
    pub fn next<F>(&mut self, write: F) -> Arc<BroadcastSlot>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let idx = self.next;
        self.next = (idx + 1) % self.slots.len();
        self.fills += 1;

        let entry = &mut self.slots[idx];
        if Arc::get_mut(entry).is_none() {
            *entry = Arc::new(BroadcastSlot::new());
            self.displaced += 1;
            counter!("crank_pool_slots_displaced_total").increment(1);
            debug!(slot = idx, "Slot still held by a consumer, displaced");
        }

        // Unique at this point, so this never clones
        let slot = Arc::make_mut(entry);
        slot.len = write(&mut slot.data).min(SLOT_CAPACITY);
        slot.sequence = self.fills;

        Arc::clone(entry)
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently shared with at least one consumer
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| Arc::strong_count(s) > 1)
            .count()
    }

    /// Times a still-held slot had to be replaced
    pub fn displaced(&self) -> u64 {
        self.displaced
    }
}

impl Default for BroadcastPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

//! Torn-read-free publication of the latest state
//!
//! Two slots plus a published index. The single writer fills the inactive
//! slot and then flips the index; readers load the index and copy that
//! slot. Each slot also carries a sequence number (odd while being
//! written) so a reader that was lapped by two full writes detects it and
//! retries instead of returning a mixed record.

use std::hint;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::StatePayload;

struct Slot {
    seq: AtomicU64,
    scalars: [AtomicU32; StatePayload::SCALARS],
    timestamp_ms: AtomicU64,
}

impl Slot {
    fn new(initial: &StatePayload) -> Self {
        Self {
            seq: AtomicU64::new(0),
            scalars: initial.scalars().map(|v| AtomicU32::new(v.to_bits())),
            timestamp_ms: AtomicU64::new(initial.timestamp_ms),
        }
    }

    fn write(&self, payload: &StatePayload) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        for (cell, value) in self.scalars.iter().zip(payload.scalars()) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
        self.timestamp_ms.store(payload.timestamp_ms, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    fn try_read(&self) -> Option<StatePayload> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let scalars =
            std::array::from_fn(|i| f32::from_bits(self.scalars[i].load(Ordering::Relaxed)));
        let timestamp_ms = self.timestamp_ms.load(Ordering::Relaxed);

        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);
        (before == after).then(|| StatePayload::from_scalars(scalars, timestamp_ms))
    }
}

/// Single-writer, multi-reader cell holding the latest [`StatePayload`]
pub struct SnapshotCell {
    slots: [Slot; 2],
    published: AtomicUsize,
    /// Total publications (for statistics)
    generation: AtomicU64,
}

impl SnapshotCell {
    pub fn new(initial: StatePayload) -> Self {
        Self {
            slots: [Slot::new(&initial), Slot::new(&initial)],
            published: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Publish a new payload.
    ///
    /// Must only be called from one thread at a time (the simulation
    /// thread); concurrent writers would race on the inactive slot.
    pub fn publish(&self, payload: &StatePayload) {
        let inactive = 1 - self.published.load(Ordering::Relaxed);
        self.slots[inactive].write(payload);
        self.published.store(inactive, Ordering::Release);
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy out the most recently published payload
    pub fn load(&self) -> StatePayload {
        loop {
            let idx = self.published.load(Ordering::Acquire);
            if let Some(payload) = self.slots[idx].try_read() {
                return payload;
            }
            hint::spin_loop();
        }
    }

    /// Number of payloads published so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(StatePayload::default())
    }
}

impl std::fmt::Debug for SnapshotCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("latest", &self.load())
            .field("generation", &self.generation())
            .finish()
    }
}

//! Consumer Registry and Per-Consumer Queues

use metrics::{counter, gauge};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::{BroadcastError, BroadcastSlot};

/// Default queue depth per consumer (256 ticks = 2.56 s at 100 Hz)
pub const DEFAULT_MAX_PENDING: usize = 256;

/// Stable identifier of one live consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Consumers that received the slot
    pub delivered: usize,
    /// Consumers removed during this pass
    pub evicted: usize,
}

type SlotSender = mpsc::Sender<Arc<BroadcastSlot>>;

/// Set of live consumers, keyed by [`ConsumerId`].
///
/// The accept path registers, teardown unregisters, the tick loop
/// dispatches. All three take the same mutex for the duration of a map
/// operation only; delivery is a non-blocking `try_send`.
pub struct ConsumerRegistry {
    consumers: Mutex<HashMap<ConsumerId, SlotSender>>,
    next_id: AtomicU64,
    max_pending: usize,
}

impl ConsumerRegistry {
    /// Create a registry whose consumers may queue up to `max_pending` slots
    pub fn new(max_pending: usize) -> Self {
        info!("Creating consumer registry: max_pending={}", max_pending);
        Self {
            consumers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_pending: max_pending.max(1),
        }
    }

    // Critical sections never panic, so a poisoned map is still consistent
    fn lock(&self) -> MutexGuard<'_, HashMap<ConsumerId, SlotSender>> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a consumer and return the receiving end of its queue
    pub fn register(self: &Arc<Self>) -> Subscription {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.max_pending);

        let live = {
            let mut consumers = self.lock();
            consumers.insert(id, tx);
            consumers.len()
        };
        gauge!("crank_consumers_live").set(live as f64);
        info!(consumer = %id, live, "Consumer registered");

        Subscription {
            id,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a consumer; returns whether it was still registered
    pub fn unregister(&self, id: ConsumerId) -> bool {
        let (removed, live) = {
            let mut consumers = self.lock();
            let removed = consumers.remove(&id).is_some();
            (removed, consumers.len())
        };
        if removed {
            gauge!("crank_consumers_live").set(live as f64);
            info!(consumer = %id, live, "Consumer unregistered");
        }
        removed
    }

    pub fn contains(&self, id: ConsumerId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of live consumers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of current member ids
    pub fn ids(&self) -> Vec<ConsumerId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    fn deliver(
        id: ConsumerId,
        tx: &SlotSender,
        slot: &Arc<BroadcastSlot>,
    ) -> Result<(), BroadcastError> {
        tx.try_send(Arc::clone(slot)).map_err(|e| match e {
            TrySendError::Full(_) => BroadcastError::QueueFull(id),
            TrySendError::Closed(_) => BroadcastError::Disconnected(id),
        })
    }

    /// Hand `slot` to every consumer's queue.
    ///
    /// Never blocks on a consumer. Consumers whose queue is full are
    /// evicted; consumers whose receiver is gone are dropped.
    pub fn dispatch(&self, slot: &Arc<BroadcastSlot>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let live = {
            let mut consumers = self.lock();
            consumers.retain(|id, tx| match Self::deliver(*id, tx, slot) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e @ BroadcastError::QueueFull(_)) => {
                    warn!("{}", e);
                    counter!("crank_consumers_evicted_total").increment(1);
                    report.evicted += 1;
                    false
                }
                Err(e @ BroadcastError::Disconnected(_)) => {
                    debug!("{}", e);
                    report.evicted += 1;
                    false
                }
            });
            consumers.len()
        };
        if report.evicted > 0 {
            gauge!("crank_consumers_live").set(live as f64);
        }
        report
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

/// Receiving end of one consumer's ordered queue.
///
/// Slots come out strictly in dispatch order. Dropping the subscription
/// unregisters the consumer and releases every slot still queued.
pub struct Subscription {
    id: ConsumerId,
    rx: mpsc::Receiver<Arc<BroadcastSlot>>,
    registry: Arc<ConsumerRegistry>,
}

impl Subscription {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Next queued slot; `None` once the consumer has been evicted
    pub async fn recv(&mut self) -> Option<Arc<BroadcastSlot>> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<Arc<BroadcastSlot>> {
        self.rx.try_recv().ok()
    }

    /// Slots waiting to be written
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BroadcastPool;

    fn fill(text: String) -> impl FnOnce(&mut [u8]) -> usize {
        move |buf| {
            buf[..text.len()].copy_from_slice(text.as_bytes());
            text.len()
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = Arc::new(ConsumerRegistry::default());
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);

        let a_id = a.id();
        drop(a);
        assert!(!registry.contains(a_id));
        assert_eq!(registry.ids(), vec![b.id()]);
        assert!(!registry.unregister(a_id));
    }

    #[test]
    fn test_three_consumers_get_identical_bytes() {
        let registry = Arc::new(ConsumerRegistry::default());
        let mut pool = BroadcastPool::default();
        let mut subs: Vec<_> = (0..3).map(|_| registry.register()).collect();

        let slot = pool.next(fill(r#"{"type":"state","payload":{"rpm":1200.00}}"#.to_string()));
        let report = registry.dispatch(&slot);
        assert_eq!(report, DispatchReport { delivered: 3, evicted: 0 });

        let received: Vec<_> = subs.iter_mut().map(|s| s.try_recv().unwrap()).collect();
        for r in &received {
            assert!(Arc::ptr_eq(r, &slot));
            assert_eq!(r.as_bytes(), received[0].as_bytes());
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let registry = Arc::new(ConsumerRegistry::default());
        let mut pool = BroadcastPool::new(4);
        let mut sub = registry.register();

        for n in 0..10 {
            let slot = pool.next(fill(format!("tick-{n}")));
            registry.dispatch(&slot);
        }

        for n in 0..10 {
            let slot = sub.try_recv().unwrap();
            assert_eq!(slot.as_str(), Some(format!("tick-{n}").as_str()));
        }
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_stalled_consumer_evicted_others_unaffected() {
        let registry = Arc::new(ConsumerRegistry::new(3));
        let mut pool = BroadcastPool::new(4);
        let mut stalled = registry.register();
        let mut healthy = registry.register();

        let mut evicted = 0;
        for n in 0..5 {
            let slot = pool.next(fill(format!("tick-{n}")));
            evicted += registry.dispatch(&slot).evicted;
            // Healthy consumer keeps draining
            assert!(healthy.try_recv().is_some());
        }

        assert_eq!(evicted, 1);
        assert!(!registry.contains(stalled.id()));
        assert!(registry.contains(healthy.id()));

        // The evicted queue still yields what it had, then ends
        let mut drained = 0;
        while stalled.try_recv().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 3);
    }

    #[test]
    fn test_dropped_subscription_releases_queued_slots() {
        let registry = Arc::new(ConsumerRegistry::default());
        let mut pool = BroadcastPool::new(4);
        let sub = registry.register();

        for n in 0..3 {
            let slot = pool.next(fill(format!("tick-{n}")));
            registry.dispatch(&slot);
        }
        assert_eq!(sub.pending(), 3);
        assert_eq!(pool.in_flight(), 3);

        drop(sub);
        assert!(registry.is_empty());
        assert_eq!(pool.in_flight(), 0);

        // Rotation reuses storage in place again
        pool.next(fill("after".to_string()));
        assert_eq!(pool.displaced(), 0);
    }

    #[tokio::test]
    async fn test_async_drain_in_order() {
        let registry = Arc::new(ConsumerRegistry::default());
        let mut sub = registry.register();

        let producer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let mut pool = BroadcastPool::new(4);
                for n in 0..50 {
                    let slot = pool.next(fill(format!("{n}")));
                    registry.dispatch(&slot);
                }
            })
        };

        for n in 0..50 {
            let slot = sub.recv().await.unwrap();
            assert_eq!(slot.as_str(), Some(n.to_string().as_str()));
        }
        producer.join().unwrap();
    }
}

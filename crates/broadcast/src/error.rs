//! Broadcast Error Types

use thiserror::Error;

use crate::ConsumerId;

/// Per-consumer delivery failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// Consumer fell too far behind and its queue is full
    #[error("Consumer {0} queue full, evicting")]
    QueueFull(ConsumerId),

    /// Consumer's receiving side is gone
    #[error("Consumer {0} disconnected")]
    Disconnected(ConsumerId),
}

//! Zero-Copy Broadcast Fan-Out
//!
//! The tick loop serializes state once into a [`BroadcastSlot`] taken from
//! a small [`BroadcastPool`], then hands the same `Arc` to every consumer
//! in the [`ConsumerRegistry`]. Each consumer drains its own FIFO queue at
//! its own pace; the producer never waits on a consumer.

mod error;
mod pool;
mod registry;

pub use error::BroadcastError;
pub use pool::{BroadcastPool, BroadcastSlot, DEFAULT_POOL_SIZE, SLOT_CAPACITY};
pub use registry::{
    ConsumerId, ConsumerRegistry, DispatchReport, Subscription, DEFAULT_MAX_PENDING,
};

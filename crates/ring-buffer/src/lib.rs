//! Fixed-Capacity Ring Buffer
//!
//! Provides the bounded history store used by the physics engine. Storage
//! is allocated once at construction; pushes never reallocate.

mod buffer;
mod error;

pub use buffer::{Iter, RingBuffer, DEFAULT_CAPACITY};
pub use error::RingBufferError;

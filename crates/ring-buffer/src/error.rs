//! Ring Buffer Error Types

use thiserror::Error;

/// Errors raised by checked ring buffer access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// Logical index past the number of retained items
    #[error("index {index} out of range for ring buffer of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

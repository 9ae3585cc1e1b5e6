//! Protocol Error Types

use thiserror::Error;

/// Errors while encoding or decoding wire messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound message is not valid JSON or has an unknown shape
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Formatted state did not fit the destination buffer
    #[error("State message does not fit in {capacity} bytes")]
    BufferTooSmall { capacity: usize },
}

//! Server Error Types

use thiserror::Error;

/// Errors that stop the server from starting or shutting down cleanly
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener bind or thread spawn failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The simulation thread panicked
    #[error("Tick thread terminated abnormally")]
    TickThread,
}

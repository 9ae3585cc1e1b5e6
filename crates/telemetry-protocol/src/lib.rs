//! Telemetry Wire Protocol
//!
//! Outbound `state` messages are formatted straight into a caller-owned
//! byte buffer so the tick loop never allocates. Inbound control messages
//! are small JSON objects tagged by `type`.

mod error;
mod message;
mod state;

pub use error::ProtocolError;
pub use message::{parse_client_message, ClientMessage, ReplayPayload, SetRpmPayload};
pub use state::{serialize_state, try_serialize_state, STATE_MESSAGE_CAPACITY};

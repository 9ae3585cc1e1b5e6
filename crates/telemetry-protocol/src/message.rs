//! Inbound control messages

use crank_physics::{ReplayMode, ReplayRequest};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// `set_rpm` payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetRpmPayload {
    pub rpm_target: f32,
}

/// `replay` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPayload {
    pub mode: ReplayMode,
    #[serde(default)]
    pub t_ms: u64,
}

impl From<ReplayPayload> for ReplayRequest {
    fn from(payload: ReplayPayload) -> Self {
        ReplayRequest {
            mode: payload.mode,
            t_ms: payload.t_ms,
        }
    }
}

/// Message sent by a viewer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    SetRpm(SetRpmPayload),
    Replay(ReplayPayload),
}

/// Decode one inbound text frame.
///
/// Unknown `type` values and malformed JSON both come back as
/// [`ProtocolError::Malformed`]; callers drop them without replying.
pub fn parse_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_rpm() {
        let msg = parse_client_message(r#"{"type":"set_rpm","payload":{"rpm_target":3500.5}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetRpm(SetRpmPayload { rpm_target: 3500.5 })
        );
    }

    #[test]
    fn test_parse_set_rpm_integer_target() {
        let msg =
            parse_client_message(r#"{"type":"set_rpm","payload":{"rpm_target":9999}}"#).unwrap();
        assert_eq!(msg, ClientMessage::SetRpm(SetRpmPayload { rpm_target: 9999.0 }));
    }

    #[test]
    fn test_parse_replay_modes() {
        let msg =
            parse_client_message(r#"{"type":"replay","payload":{"mode":"seek","t_ms":1500}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Replay(ReplayPayload {
                mode: ReplayMode::Seek,
                t_ms: 1500
            })
        );

        // t_ms is optional
        let msg = parse_client_message(r#"{"type":"replay","payload":{"mode":"freeze"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Replay(ReplayPayload {
                mode: ReplayMode::Freeze,
                t_ms: 0
            })
        );
    }

    #[test]
    fn test_reject_unknown_and_malformed() {
        assert!(parse_client_message(r#"{"type":"reboot","payload":{}}"#).is_err());
        assert!(parse_client_message(r#"{"type":"set_rpm"}"#).is_err());
        assert!(parse_client_message(r#"{"type":"set_rpm","payload":{"rpm_target":"fast"}}"#).is_err());
        assert!(parse_client_message(r#"{"type":"replay","payload":{"mode":"rewind"}}"#).is_err());
        assert!(parse_client_message("not json").is_err());
        assert!(parse_client_message("").is_err());
    }

    #[test]
    fn test_extra_fields_ignored() {
        let msg = parse_client_message(
            r#"{"type":"set_rpm","payload":{"rpm_target":100,"units":"rpm"},"id":7}"#,
        )
        .unwrap();
        assert_eq!(msg, ClientMessage::SetRpm(SetRpmPayload { rpm_target: 100.0 }));
    }

    #[test]
    fn test_replay_payload_into_request() {
        let request: ReplayRequest = ReplayPayload {
            mode: ReplayMode::Live,
            t_ms: 0,
        }
        .into();
        assert_eq!(request, ReplayRequest::default());
    }
}

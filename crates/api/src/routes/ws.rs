//! WebSocket Consumer Route
//!
//! Each upgraded socket becomes one broadcast consumer. A writer drains the
//! consumer's queue one frame at a time; a reader applies control messages.
//! Whichever side ends first tears the consumer down.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use broadcast::ConsumerId;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use std::sync::Arc;
use telemetry_protocol::{parse_client_message, ClientMessage};
use tracing::debug;

use crate::AppState;

/// Upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.registry.register();
    let id = subscription.id();
    let (mut sink, mut stream) = socket.split();

    // Single flight: the next slot is not taken until this write completes
    let writer = async {
        while let Some(slot) = subscription.recv().await {
            let Some(text) = slot.as_str() else {
                continue;
            };
            if let Err(e) = sink.send(Message::Text(text.to_owned())).await {
                debug!(consumer = %id, "Write failed: {}", e);
                return;
            }
        }
        debug!(consumer = %id, "Queue closed");
    };

    let reader = async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => apply_message(&state, id, &text),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(consumer = %id, "Read failed: {}", e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    let _ = sink.close().await;
    // Dropping the subscription unregisters and releases queued slots
    drop(subscription);
}

/// Apply one inbound text frame; anything unparseable is dropped silently
pub(crate) fn apply_message(state: &AppState, id: ConsumerId, raw: &str) {
    match parse_client_message(raw) {
        Ok(ClientMessage::SetRpm(payload)) => {
            counter!("crank_control_messages_total", "type" => "set_rpm").increment(1);
            state.engine.set_rpm_target(payload.rpm_target);
        }
        Ok(ClientMessage::Replay(payload)) => {
            counter!("crank_control_messages_total", "type" => "replay").increment(1);
            state.engine.request_replay(payload.into());
        }
        Err(e) => {
            debug!(consumer = %id, "Discarding message: {}", e);
        }
    }
}

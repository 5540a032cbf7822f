//! WebSocket connection handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::api::state::AppState;
use crate::broadcast::WelcomeMessage;

/// GET /ws/dashboard - Upgrade to a dashboard subscriber
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
///
/// Broadcast payloads arrive through a bounded subscriber channel, so a
/// slow socket only ever blocks this task. Text from the client is echoed
/// back for debugging.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut subscriber = state.broadcaster.subscribe();
    let subscriber_id = subscriber.id();
    let (mut sender, mut receiver) = socket.split();

    // Send welcome message with current sequence ID
    let welcome = WelcomeMessage::new(subscriber_id, state.current_sequence_id());
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(json)).await.is_err() {
            state.broadcaster.unsubscribe(subscriber_id);
            return; // Client disconnected immediately
        }
    }

    loop {
        tokio::select! {
            payload = subscriber.recv() => {
                match payload {
                    Some(payload) => {
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // Dropped by the broadcaster or server shutting down
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !text.trim().is_empty()
                            && sender.send(Message::Text(format!("Echo: {text}"))).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {} // Binary, ping and pong are ignored
                }
            }
        }
    }

    state.broadcaster.unsubscribe(subscriber_id);
    tracing::debug!(subscriber = subscriber_id, "WebSocket closed");
}

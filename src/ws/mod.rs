pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt, Sink};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub participant_id: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!(participant_id = %params.participant_id, "WebSocket connection request");

    match state.participant_exists(&params.participant_id).await {
        Ok(true) => {}
        Ok(false) => {
            return ApiError::NotFound(format!(
                "participant '{}' not found",
                params.participant_id
            ))
            .into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    }

    ws.on_upgrade(move |socket| handle_socket(socket, params.participant_id, state))
}

/// Serialize and send one message; false when the socket is gone
async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, participant_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let room = match state.open_room(&participant_id).await {
        Ok(room) => room,
        Err(e) => {
            tracing::error!(participant_id = %participant_id, "Failed to open waiting room: {}", e);
            send_json(&mut sender, &ServerMessage::error("ROOM_UNAVAILABLE", e.to_string())).await;
            return;
        }
    };

    // Subscribe before the snapshot so nothing falls between them;
    // clients drop chat ids they already hold
    let mut events = room.subscribe();

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        room: room.snapshot().await,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_json(&mut sender, &welcome).await {
        tracing::error!(participant_id = %participant_id, "Failed to send welcome message");
        state.close_room(&room).await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(participant_id = %participant_id, skipped, "WebSocket fell behind room events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(participant_id = %participant_id, "Received message: {}", text.as_str());

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &participant_id, &state).await
                                {
                                    if !send_json(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                let error = ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                );
                                send_json(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(participant_id = %participant_id, "WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.close_room(&room).await;
    tracing::info!(participant_id = %participant_id, "WebSocket connection closed");
}

//! WebSocket endpoint for realtime notifications.
//!
//! Browsers cannot set an Authorization header on the upgrade request,
//! so the bearer token travels as a query parameter, the way the
//! original SPA handed it to the socket handshake.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::AppState;
use crate::errors::AppResult;

/// Upgrade query parameters
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer token (sans prefix)
    pub token: String,
}

/// Authenticate and upgrade the connection
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let claims = state.auth_service.verify_token(&params.token)?;
    let user = claims.sub;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Forward room events to the socket until either side closes.
async fn handle_socket(socket: WebSocket, state: AppState, user: Uuid) {
    tracing::debug!(user = %user, "WebSocket connected");

    let mut events = state.hub.subscribe(user);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => {
                        if sink.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Slow consumer; drop the backlog and keep going
                    tracing::warn!(user = %user, skipped, "WebSocket consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Client pings and chatter are ignored
                }
                Some(Err(_)) => break,
            },
        }
    }

    state.hub.prune(user);
    tracing::debug!(user = %user, "WebSocket disconnected");
}

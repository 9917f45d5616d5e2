//! WebSocket handler for the realtime channel.
//!
//! The handshake token is verified before the upgrade: a rejected handshake
//! never becomes an open socket, so no frame is ever read from it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use vecino_core::models::auth::AccessClaims;
use vecino_core::realtime::{ChannelHub, ClientFrame, ServerFrame};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::bearer_token;

/// WebSocket connection query parameters.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Endpoint: `GET /ws?token=<access token>` (or `Authorization: Bearer`).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let token = params.token.as_deref().or_else(|| bearer_token(&headers));
    let claims = state.hub.authenticate(token).inspect_err(|e| {
        info!(error = %e, "realtime handshake rejected");
    })?;
    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, claims, hub)))
}

/// Handle WebSocket connection lifecycle.
async fn handle_socket(socket: WebSocket, claims: AccessClaims, hub: Arc<ChannelHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let conn = hub.attach(claims, tx.clone());

    // Forward frames from the hub to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_hub = hub.clone();
    let recv_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(frame) => recv_hub.handle_frame(&recv_conn, frame).await,
                    Err(e) => {
                        debug!(conn_id = recv_conn.conn_id(), error = %e, "unparseable frame");
                        let _ = tx.send(ServerFrame::error("bad_frame", "Unrecognized frame"));
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    hub.disconnect(&conn);
}

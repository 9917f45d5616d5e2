//! Connection registry and channel state.
//!
//! Connections live in a `DashMap` keyed by connection ID, each with an
//! unbounded sender drained by its socket task. Every state change and its
//! broadcast happen under one channel lock, so all peers observe broadcasts
//! in the order the server applied them.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use super::ConnectionIdentity;
use super::messages::{ChatMessage, ClientFrame, PrivilegedAction, ServerFrame};
use crate::auth::jwt::TokenFactory;
use crate::auth::{AuthError, AuthResult};
use crate::models::auth::AccessClaims;

/// Outbound frame channel of one connection.
pub type FrameSender = mpsc::UnboundedSender<ServerFrame>;

/// Unique connection identifier.
pub type ConnectionId = u64;

/// Number of recent messages kept for pinning.
pub const HISTORY_LIMIT: usize = 500;

/// Maximum chat message body length, in characters.
const MAX_BODY_CHARS: usize = 2000;

#[derive(Default)]
struct ChannelState {
    next_message_id: u64,
    history: VecDeque<ChatMessage>,
    pinned: BTreeSet<u64>,
}

pub struct ChannelHub {
    tokens: TokenFactory,
    connections: DashMap<ConnectionId, FrameSender>,
    next_conn_id: AtomicU64,
    state: Mutex<ChannelState>,
}

impl ChannelHub {
    pub fn new(tokens: TokenFactory) -> Self {
        Self {
            tokens,
            connections: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
            state: Mutex::new(ChannelState::default()),
        }
    }

    /// Verify the handshake token. Missing tokens count as invalid.
    pub fn authenticate(&self, handshake_token: Option<&str>) -> AuthResult<AccessClaims> {
        let token = handshake_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAccessToken)?;
        self.tokens.verify_access_token(token)
    }

    /// Register an authenticated connection and greet it.
    pub fn attach(&self, claims: AccessClaims, tx: FrameSender) -> ConnectionIdentity {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let identity = ConnectionIdentity::new(conn_id, claims);
        let _ = tx.send(ServerFrame::Connected {
            user_id: identity.user_id(),
            role: identity.role(),
        });
        self.connections.insert(conn_id, tx);
        info!(
            user_id = identity.user_id(),
            conn_id,
            total_connections = self.connections.len(),
            "realtime connection opened"
        );
        identity
    }

    /// Authenticate and register in one step. On failure nothing is
    /// registered and the caller must drop the connection.
    pub fn connect(
        &self,
        handshake_token: Option<&str>,
        tx: FrameSender,
    ) -> AuthResult<ConnectionIdentity> {
        match self.authenticate(handshake_token) {
            Ok(claims) => Ok(self.attach(claims, tx)),
            Err(e) => {
                info!(error = %e, "realtime handshake rejected");
                Err(e)
            }
        }
    }

    /// Remove a closed connection.
    pub fn disconnect(&self, conn: &ConnectionIdentity) {
        self.connections.remove(&conn.conn_id());
        info!(
            user_id = conn.user_id(),
            conn_id = conn.conn_id(),
            remaining_connections = self.connections.len(),
            "realtime connection closed"
        );
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Currently pinned message IDs, ascending.
    pub async fn pinned(&self) -> Vec<u64> {
        self.state.lock().await.pinned.iter().copied().collect()
    }

    /// Dispatch one inbound frame from `conn`. Errors are reported to the
    /// sender only.
    pub async fn handle_frame(&self, conn: &ConnectionIdentity, frame: ClientFrame) {
        let result = match frame {
            ClientFrame::Ping => {
                self.send_to(conn.conn_id(), ServerFrame::Pong);
                Ok(())
            }
            ClientFrame::Send { body } => self.post_message(conn, body).await.map(|_| ()),
            ClientFrame::Pin { message_id } => self
                .on_privileged_action(conn, PrivilegedAction::Pin { message_id })
                .await
                .map(|_| ()),
            ClientFrame::Unpin { message_id } => self
                .on_privileged_action(conn, PrivilegedAction::Unpin { message_id })
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            self.send_to(conn.conn_id(), error_frame(&e));
        }
    }

    /// Append a chat message from any authenticated connection and
    /// broadcast it.
    pub async fn post_message(
        &self,
        conn: &ConnectionIdentity,
        body: String,
    ) -> AuthResult<ChatMessage> {
        let body = body.trim().to_string();
        if body.is_empty() || body.chars().count() > MAX_BODY_CHARS {
            return Err(AuthError::Validation(format!(
                "Message must be 1 to {MAX_BODY_CHARS} characters"
            )));
        }

        let mut state = self.state.lock().await;
        state.next_message_id += 1;
        let message = ChatMessage {
            id: state.next_message_id,
            author_id: conn.user_id(),
            body,
            sent_at: Utc::now(),
        };
        state.history.push_back(message.clone());
        while state.history.len() > HISTORY_LIMIT {
            if let Some(evicted) = state.history.pop_front() {
                state.pinned.remove(&evicted.id);
            }
        }
        self.broadcast(&ServerFrame::Message {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Run a privileged action using the role bound at connect time.
    ///
    /// Non-admins get `AccessDenied`; channel state is untouched and nothing
    /// is broadcast.
    pub async fn on_privileged_action(
        &self,
        conn: &ConnectionIdentity,
        action: PrivilegedAction,
    ) -> AuthResult<ServerFrame> {
        if !conn.role().is_admin() {
            warn!(
                user_id = conn.user_id(),
                conn_id = conn.conn_id(),
                role = %conn.role(),
                ?action,
                "privileged realtime action denied"
            );
            return Err(AuthError::AccessDenied);
        }

        let mut state = self.state.lock().await;
        let frame = match action {
            PrivilegedAction::Pin { message_id } => {
                if !state.history.iter().any(|m| m.id == message_id) {
                    return Err(AuthError::NotFound(format!("message {message_id}")));
                }
                state.pinned.insert(message_id);
                ServerFrame::Pinned {
                    message_id,
                    pinned_by: conn.user_id(),
                }
            }
            PrivilegedAction::Unpin { message_id } => {
                if !state.pinned.remove(&message_id) {
                    return Err(AuthError::NotFound(format!("pinned message {message_id}")));
                }
                ServerFrame::Unpinned {
                    message_id,
                    unpinned_by: conn.user_id(),
                }
            }
        };
        self.broadcast(&frame);
        Ok(frame)
    }

    /// Send `frame` to every open connection. Callers hold the state lock.
    fn broadcast(&self, frame: &ServerFrame) {
        let mut delivered = 0usize;
        for entry in self.connections.iter() {
            if entry.value().send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                // Removal happens when the socket task ends.
                debug!(conn_id = *entry.key(), "broadcast to closed connection");
            }
        }
        debug!(recipients = delivered, "frame broadcast");
    }

    fn send_to(&self, conn_id: ConnectionId, frame: ServerFrame) {
        if let Some(tx) = self.connections.get(&conn_id) {
            let _ = tx.send(frame);
        }
    }
}

fn error_frame(e: &AuthError) -> ServerFrame {
    match e {
        AuthError::AccessDenied => ServerFrame::error("access_denied", "Access denied"),
        AuthError::NotFound(m) => ServerFrame::error("not_found", m.clone()),
        AuthError::Validation(m) => ServerFrame::error("validation_error", m.clone()),
        _ => ServerFrame::error("internal_error", "Internal server error"),
    }
}

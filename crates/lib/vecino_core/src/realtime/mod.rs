//! Realtime channel: connection authentication, in-band role checks and
//! ordered broadcast.
//!
//! A connection is authenticated exactly once, when it is established. The
//! resulting [`ConnectionIdentity`] is immutable and is handed to every
//! frame handler of that connection; nothing re-verifies the token later.

mod hub;
mod messages;

pub use hub::{ChannelHub, ConnectionId, FrameSender, HISTORY_LIMIT};
pub use messages::{ChatMessage, ClientFrame, PrivilegedAction, ServerFrame};

use crate::models::auth::{AccessClaims, Role};

/// Identity bound to one open connection for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    conn_id: ConnectionId,
    claims: AccessClaims,
}

impl ConnectionIdentity {
    pub(crate) fn new(conn_id: ConnectionId, claims: AccessClaims) -> Self {
        Self { conn_id, claims }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn user_id(&self) -> i64 {
        self.claims.identity_id()
    }

    pub fn phone(&self) -> &str {
        &self.claims.phone
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }
}

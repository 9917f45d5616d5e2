//! Realtime channel frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::auth::Role;

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
    Send { body: String },
    #[serde(rename_all = "camelCase")]
    Pin { message_id: u64 },
    #[serde(rename_all = "camelCase")]
    Unpin { message_id: u64 },
}

/// Actions that require the administrator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegedAction {
    Pin { message_id: u64 },
    Unpin { message_id: u64 },
}

/// A chat message held in the channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub author_id: i64,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Connected { user_id: i64, role: Role },
    Pong,
    Message { message: ChatMessage },
    #[serde(rename_all = "camelCase")]
    Pinned { message_id: u64, pinned_by: i64 },
    #[serde(rename_all = "camelCase")]
    Unpinned { message_id: u64, unpinned_by: i64 },
    Error { code: String, message: String },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

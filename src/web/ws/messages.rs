//! WebSocket frames sent by clients.
//!
//! Server frames are [`ServerFrame`](crate::chat::ServerFrame); both directions
//! use the `{"event": ..., "data": ...}` envelope.

use serde::Deserialize;

/// Frames sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Claim a nickname.
    Join(String),
    /// Chat line or `/command`.
    Message(String),
    /// Keep-alive.
    Ping,
}

/// Error text for frames that fail to parse.
pub const INVALID_FRAME: &str = "Invalid message format";

//! Outbound chat events and transport frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::role::Role;
use super::session::Session;
use crate::datetime::format_clock;

/// Type-specific payload of a chat event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// A session joined.
    Join {
        /// Nickname.
        nick: String,
        /// Role on join.
        role: Role,
    },
    /// A session left.
    Quit {
        /// Nickname.
        nick: String,
        /// Reason for leaving.
        reason: String,
    },
    /// Regular chat message.
    Message {
        /// Sender nickname.
        nick: String,
        /// Sender role.
        role: Role,
        /// Message text.
        text: String,
    },
    /// Action message (`/me`).
    Action {
        /// Sender nickname.
        nick: String,
        /// Sender role.
        role: Role,
        /// Action text.
        text: String,
    },
    /// Private message (`/msg`).
    Private {
        /// Sender nickname.
        from: String,
        /// Recipient nickname.
        to: String,
        /// Message text.
        text: String,
        /// True for the sender's echo, false for the recipient's copy.
        sent: bool,
    },
    /// Nickname change.
    Nick {
        /// Previous nickname.
        old_nick: String,
        /// New nickname.
        new_nick: String,
    },
    /// Role change.
    Role {
        /// Target nickname.
        nick: String,
        /// Role before the command.
        old_role: Role,
        /// Role after the command.
        new_role: Role,
        /// Issuing nickname.
        by: String,
    },
    /// A session was kicked.
    Kick {
        /// Target nickname.
        nick: String,
        /// Issuing nickname.
        by: String,
        /// Reason.
        reason: String,
    },
    /// A nickname was banned.
    Ban {
        /// Banned nickname as typed.
        nick: String,
        /// Issuing nickname.
        by: String,
        /// Reason.
        reason: String,
    },
    /// Server notice.
    System {
        /// Notice text.
        text: String,
    },
}

impl EventKind {
    /// Get the `type` discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Join { .. } => "join",
            EventKind::Quit { .. } => "quit",
            EventKind::Message { .. } => "message",
            EventKind::Action { .. } => "action",
            EventKind::Private { .. } => "private",
            EventKind::Nick { .. } => "nick",
            EventKind::Role { .. } => "role",
            EventKind::Kick { .. } => "kick",
            EventKind::Ban { .. } => "ban",
            EventKind::System { .. } => "system",
        }
    }

    /// Whether the event belongs in a recording.
    ///
    /// Private messages and server notices are never recorded.
    pub fn is_recordable(&self) -> bool {
        !matches!(self, EventKind::Private { .. } | EventKind::System { .. })
    }
}

/// A timestamped chat event as delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Human-readable local time at formatting.
    pub timestamp: String,
    /// Event payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ChatEvent {
    /// Stamp an event with the local wall-clock time.
    pub fn format(kind: EventKind, now: &DateTime<Utc>, timezone: &str) -> Self {
        Self {
            timestamp: format_clock(now, timezone),
            kind,
        }
    }
}

/// Payload of the `joined` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedPayload {
    /// Channel name.
    pub channel: String,
    /// The joining client's own session.
    pub session: Session,
    /// All current sessions, including the joining one.
    pub sessions: Vec<Session>,
    /// Message of the day.
    pub motd: String,
}

/// Frames sent from the server to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Join succeeded.
    Joined(JoinedPayload),
    /// A chat event.
    Message(ChatEvent),
    /// Current roster.
    UserList(Vec<Session>),
    /// Private error notice.
    Error(String),
    /// Keep-alive reply.
    Pong,
    /// The receiver was kicked.
    Kicked(String),
    /// The receiver was banned.
    Banned(String),
    /// The receiver quit.
    Quit,
}

impl ServerFrame {
    /// Create an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

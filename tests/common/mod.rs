//! Test helpers for hub integration tests.
//!
//! Provides a [`TestHub`] wired to in-memory collaborators plus helpers to
//! inspect what each connection received.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use parlor::chat::{
    ChatHub, Delivery, EventKind, Fanout, HubSettings, Identity, MemoryLogSink, MemoryTransport,
    ServerFrame,
};
use parlor::process::ProcessInfo;

/// Admin nickname used by every test hub.
pub const ADMIN: &str = "root";

/// Process collaborator with fixed figures.
pub struct FixedProcess;

impl ProcessInfo for FixedProcess {
    fn uptime(&self) -> Duration {
        Duration::from_secs(2 * 3600 + 5 * 60)
    }

    fn memory_bytes(&self) -> Option<u64> {
        Some(12 * 1024 * 1024)
    }
}

/// Hub settings for tests.
pub fn settings() -> HubSettings {
    HubSettings {
        channel: "Test Channel".to_string(),
        admin_nick: ADMIN.to_string(),
        motd: "Welcome!".to_string(),
        timezone: "UTC".to_string(),
        max_message_length: 500,
        inactivity_timeout: chrono::Duration::minutes(30),
    }
}

/// Fixed starting time.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
}

pub fn id(s: &str) -> Identity {
    Identity::new(s)
}

/// A hub with in-memory transport and log sink.
pub struct TestHub {
    pub hub: ChatHub,
    pub transport: Arc<MemoryTransport>,
    pub sink: Arc<MemoryLogSink>,
    pub now: DateTime<Utc>,
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_sink(MemoryLogSink::new())
    }

    pub fn with_sink(sink: MemoryLogSink) -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let sink = Arc::new(sink);
        let hub = ChatHub::new(
            settings(),
            Fanout::new(transport.clone()),
            sink.clone(),
            Arc::new(FixedProcess),
        );
        Self {
            hub,
            transport,
            sink,
            now: start_time(),
        }
    }

    /// Join `nick` on connection `conn`.
    pub fn join(&mut self, conn: &str, nick: &str) {
        self.hub.handle_join(id(conn), nick, self.now);
    }

    /// Send a chat line from connection `conn`.
    pub fn say(&mut self, conn: &str, text: &str) {
        self.hub.handle_message(&id(conn), text, self.now);
    }

    /// Join several connections and discard everything delivered so far.
    pub fn join_all(&mut self, users: &[(&str, &str)]) {
        for (conn, nick) in users {
            self.join(conn, nick);
        }
        self.clear();
    }

    pub fn advance(&mut self, by: chrono::Duration) {
        self.now += by;
    }

    pub fn clear(&self) {
        self.transport.drain();
    }

    pub fn frames(&self, conn: &str) -> Vec<ServerFrame> {
        self.transport.frames_for(&id(conn))
    }

    /// Chat event payloads delivered to `conn`, in order.
    pub fn events(&self, conn: &str) -> Vec<EventKind> {
        self.frames(conn)
            .into_iter()
            .filter_map(|f| match f {
                ServerFrame::Message(event) => Some(event.kind),
                _ => None,
            })
            .collect()
    }

    /// Error frames delivered to `conn`.
    pub fn errors(&self, conn: &str) -> Vec<String> {
        self.frames(conn)
            .into_iter()
            .filter_map(|f| match f {
                ServerFrame::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Text of system notices delivered to `conn`.
    pub fn notices(&self, conn: &str) -> Vec<String> {
        self.events(conn)
            .into_iter()
            .filter_map(|k| match k {
                EventKind::System { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn was_disconnected(&self, conn: &str) -> bool {
        self.transport.was_disconnected(&id(conn))
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.transport.drain()
    }
}

//! Broadcast fan-out over the connection transport.
//!
//! The transport is the per-connection channel provided by the web layer.
//! [`Fanout`] turns the three delivery primitives into `send` calls in call
//! order, so every recipient sees frames in the order the hub produced them.

use std::sync::{Arc, Mutex};

use super::event::ServerFrame;
use super::session::{Identity, SessionRegistry};

/// Per-connection message channel.
pub trait Transport: Send + Sync {
    /// Queue a frame for one connection. Unknown identities are ignored.
    fn send(&self, identity: &Identity, frame: ServerFrame);

    /// Close a connection after its queued frames are flushed.
    fn disconnect(&self, identity: &Identity);
}

/// Delivery primitives used by the hub.
#[derive(Clone)]
pub struct Fanout {
    transport: Arc<dyn Transport>,
}

impl Fanout {
    /// Create a fan-out over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Deliver to every joined session.
    pub fn to_all(&self, sessions: &SessionRegistry, frame: &ServerFrame) {
        for identity in sessions.identities() {
            self.transport.send(&identity, frame.clone());
        }
    }

    /// Deliver to one connection.
    pub fn to_one(&self, identity: &Identity, frame: ServerFrame) {
        self.transport.send(identity, frame);
    }

    /// Deliver to every joined session except the sender.
    pub fn to_all_except(&self, sessions: &SessionRegistry, sender: &Identity, frame: &ServerFrame) {
        for identity in sessions.identities() {
            if &identity != sender {
                self.transport.send(&identity, frame.clone());
            }
        }
    }

    /// Force-close a connection.
    pub fn disconnect(&self, identity: &Identity) {
        self.transport.disconnect(identity);
    }
}

/// Something the transport was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A frame queued for a connection.
    Frame(Identity, ServerFrame),
    /// A connection closed by the server.
    Disconnect(Identity),
}

/// Transport that captures deliveries in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    deliveries: Mutex<Vec<Delivery>>,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take and clear everything delivered so far.
    pub fn drain(&self) -> Vec<Delivery> {
        match self.deliveries.lock() {
            Ok(mut deliveries) => std::mem::take(&mut *deliveries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Frames delivered to one identity, in order, without clearing.
    pub fn frames_for(&self, identity: &Identity) -> Vec<ServerFrame> {
        self.snapshot()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Frame(id, frame) if &id == identity => Some(frame),
                _ => None,
            })
            .collect()
    }

    /// Whether the identity was disconnected by the server.
    pub fn was_disconnected(&self, identity: &Identity) -> bool {
        self.snapshot()
            .iter()
            .any(|d| matches!(d, Delivery::Disconnect(id) if id == identity))
    }

    fn snapshot(&self) -> Vec<Delivery> {
        match self.deliveries.lock() {
            Ok(deliveries) => deliveries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, delivery: Delivery) {
        match self.deliveries.lock() {
            Ok(mut deliveries) => deliveries.push(delivery),
            Err(poisoned) => poisoned.into_inner().push(delivery),
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&self, identity: &Identity, frame: ServerFrame) {
        self.push(Delivery::Frame(identity.clone(), frame));
    }

    fn disconnect(&self, identity: &Identity) {
        self.push(Delivery::Disconnect(identity.clone()));
    }
}

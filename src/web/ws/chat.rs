//! Chat WebSocket handler.
//!
//! Each socket gets a fresh [`Identity`] and an ordered outbound queue
//! registered with the [`ChannelTransport`]. The hub writes into the queue;
//! this handler drains it into the socket and forwards inbound frames to
//! the hub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

use crate::chat::{HubHandle, Identity, ServerFrame, Transport};

use super::messages::{ClientFrame, INVALID_FRAME};

/// Frames a connection may have queued before it is dropped as too slow.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Instruction queued for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a frame.
    Frame(ServerFrame),
    /// Close the socket once earlier frames are flushed.
    Close,
}

/// Receiving side of a connection's queue.
#[derive(Debug)]
pub struct OutboundQueue {
    /// Queued instructions, in order.
    pub rx: mpsc::Receiver<Outbound>,
    /// Notified when the queue overflowed and the connection must close.
    pub overflow: Arc<Notify>,
}

#[derive(Debug)]
struct Queue {
    tx: mpsc::Sender<Outbound>,
    overflow: Arc<Notify>,
}

/// Transport backed by one bounded queue per WebSocket.
///
/// A connection whose queue fills up is dropped: its queue is removed and
/// its socket task is told to close, which reports the departure to the hub.
#[derive(Debug)]
pub struct ChannelTransport {
    queues: Mutex<HashMap<Identity, Queue>>,
    capacity: usize,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose queues hold at most `capacity` instructions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<Identity, Queue>> {
        match self.queues.lock() {
            Ok(queues) => queues,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Open a queue for a new connection.
    pub fn register(&self, identity: Identity) -> OutboundQueue {
        let (tx, rx) = mpsc::channel(self.capacity);
        let overflow = Arc::new(Notify::new());
        self.queues().insert(
            identity,
            Queue {
                tx,
                overflow: overflow.clone(),
            },
        );
        OutboundQueue { rx, overflow }
    }

    /// Drop a connection's queue.
    pub fn unregister(&self, identity: &Identity) {
        self.queues().remove(identity);
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.queues().len()
    }

    fn push(&self, identity: &Identity, instruction: Outbound) {
        let mut queues = self.queues();
        let Some(queue) = queues.get(identity) else {
            return;
        };
        match queue.tx.try_send(instruction) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%identity, "Outbound queue full, dropping connection");
                if let Some(queue) = queues.remove(identity) {
                    queue.overflow.notify_one();
                }
            }
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, identity: &Identity, frame: ServerFrame) {
        self.push(identity, Outbound::Frame(frame));
    }

    fn disconnect(&self, identity: &Identity) {
        self.push(identity, Outbound::Close);
        // Later frames for this identity are dropped.
        self.unregister(identity);
    }
}

/// State for the WebSocket chat handler.
#[derive(Clone)]
pub struct ChatWsState {
    pub hub: HubHandle,
    pub transport: Arc<ChannelTransport>,
}

impl ChatWsState {
    pub fn new(hub: HubHandle, transport: Arc<ChannelTransport>) -> Self {
        Self { hub, transport }
    }
}

/// WebSocket chat handler.
///
/// GET /ws
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChatWsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ChatWsState>) {
    let identity = Identity::generate();
    let OutboundQueue {
        rx: mut outbound,
        overflow,
    } = state.transport.register(identity.clone());

    if state.hub.connected(identity.clone()).await.is_err() {
        state.transport.unregister(&identity);
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if forward(&state, &identity, &text).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws_sender.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(%identity, "WebSocket closed by client");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%identity, "WebSocket error: {}", e);
                    break;
                }
            },
            _ = overflow.notified() => break,
            instruction = outbound.recv() => match instruction {
                Some(Outbound::Frame(frame)) => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(%identity, "Failed to serialize frame: {}", e);
                            continue;
                        }
                    };
                    let sent = tokio::select! {
                        result = ws_sender.send(Message::Text(json)) => result.is_ok(),
                        _ = overflow.notified() => false,
                    };
                    if !sent {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    state.transport.unregister(&identity);
    let _ = state.hub.disconnected(identity).await;
}

/// Parse a client frame and hand it to the hub.
async fn forward(state: &ChatWsState, identity: &Identity, text: &str) -> crate::Result<()> {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%identity, "Failed to parse client frame: {}", e);
            state
                .transport
                .send(identity, ServerFrame::error(INVALID_FRAME));
            return Ok(());
        }
    };

    match frame {
        ClientFrame::Join(nick) => state.hub.join(identity.clone(), nick).await,
        ClientFrame::Message(text) => state.hub.message(identity.clone(), text).await,
        ClientFrame::Ping => state.hub.ping(identity.clone()).await,
    }
}

//! Serialized event loop for the chat hub.
//!
//! The hub runs as a single tokio task. Transport events arrive through an
//! mpsc mailbox and the inactivity sweep is an interval tick in the same
//! `select!`, so no two events are ever processed at the same time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::hub::{ChatHub, HubStats};
use super::session::Identity;
use crate::clock::Clock;
use crate::{ParlorError, Result};

/// Mailbox capacity of the hub task.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Inbound events processed by the hub task.
#[derive(Debug)]
pub enum HubEvent {
    /// A transport connection was opened.
    Connected { identity: Identity },
    /// The client asked to join with a nickname.
    Join { identity: Identity, nick: String },
    /// A chat line or command.
    Message { identity: Identity, text: String },
    /// Keep-alive.
    Ping { identity: Identity },
    /// The transport connection closed.
    Disconnected { identity: Identity },
    /// Statistics query.
    Stats { reply: oneshot::Sender<HubStats> },
    /// Run an inactivity sweep now.
    Sweep { reply: oneshot::Sender<usize> },
}

/// Cloneable handle to a running hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    async fn post(&self, event: HubEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| ParlorError::HubClosed)
    }

    pub async fn connected(&self, identity: Identity) -> Result<()> {
        self.post(HubEvent::Connected { identity }).await
    }

    pub async fn join(&self, identity: Identity, nick: impl Into<String>) -> Result<()> {
        self.post(HubEvent::Join {
            identity,
            nick: nick.into(),
        })
        .await
    }

    pub async fn message(&self, identity: Identity, text: impl Into<String>) -> Result<()> {
        self.post(HubEvent::Message {
            identity,
            text: text.into(),
        })
        .await
    }

    pub async fn ping(&self, identity: Identity) -> Result<()> {
        self.post(HubEvent::Ping { identity }).await
    }

    pub async fn disconnected(&self, identity: Identity) -> Result<()> {
        self.post(HubEvent::Disconnected { identity }).await
    }

    /// Query the current statistics.
    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.post(HubEvent::Stats { reply }).await?;
        rx.await.map_err(|_| ParlorError::HubClosed)
    }

    /// Sweep idle sessions immediately, returning how many were reaped.
    pub async fn sweep(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.post(HubEvent::Sweep { reply }).await?;
        rx.await.map_err(|_| ParlorError::HubClosed)
    }
}

/// Spawn the hub task.
///
/// The task stops once every [`HubHandle`] has been dropped.
pub fn spawn(
    hub: ChatHub,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let task = tokio::spawn(run(hub, rx, clock, sweep_interval));
    (HubHandle { tx }, task)
}

async fn run(
    mut hub: ChatHub,
    mut rx: mpsc::Receiver<HubEvent>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
) {
    let mut interval = tokio::time::interval(sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    tracing::info!(sweep_interval_secs = sweep_interval.as_secs(), "Chat hub started");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => dispatch(&mut hub, event, clock.now()),
                None => break,
            },
            _ = interval.tick() => {
                let reaped = hub.sweep_inactive(clock.now());
                if reaped > 0 {
                    tracing::info!(reaped, "Inactive sessions disconnected");
                }
            }
        }
    }

    tracing::info!("Chat hub stopped");
}

fn dispatch(hub: &mut ChatHub, event: HubEvent, now: chrono::DateTime<chrono::Utc>) {
    match event {
        HubEvent::Connected { identity } => {
            tracing::debug!(%identity, "Connection opened");
        }
        HubEvent::Join { identity, nick } => hub.handle_join(identity, &nick, now),
        HubEvent::Message { identity, text } => hub.handle_message(&identity, &text, now),
        HubEvent::Ping { identity } => hub.handle_ping(&identity, now),
        HubEvent::Disconnected { identity } => {
            tracing::debug!(%identity, "Connection closed");
            hub.handle_disconnect(&identity, now);
        }
        HubEvent::Stats { reply } => {
            let _ = reply.send(hub.stats());
        }
        HubEvent::Sweep { reply } => {
            let _ = reply.send(hub.sweep_inactive(now));
        }
    }
}

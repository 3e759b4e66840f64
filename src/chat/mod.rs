//! Chat engine.
//!
//! This module provides the single-room chat hub:
//! - Session registry with unique nicknames and roles
//! - Ban registry
//! - Slash-command interpreter with role checks
//! - Broadcast fan-out over an injected transport
//! - Session recording and inactivity reaping

pub mod ban;
pub mod command;
pub mod driver;
pub mod event;
pub mod fanout;
pub mod hub;
pub mod nick;
pub mod recorder;
pub mod role;
pub mod session;

pub use ban::BanRegistry;
pub use command::{find_command, format_help, format_who, parse_command_line, CommandError};
pub use driver::{spawn, HubEvent, HubHandle};
pub use event::{ChatEvent, EventKind, JoinedPayload, ServerFrame};
pub use fanout::{Delivery, Fanout, MemoryTransport, Transport};
pub use hub::{ChatHub, HubSettings, HubStats};
pub use recorder::{FileLogSink, LogSink, MemoryLogSink, Recorder, StopOutcome};
pub use role::Role;
pub use session::{Identity, JoinError, NickError, Session, SessionRegistry};

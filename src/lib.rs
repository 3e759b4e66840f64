//! Parlor - a single-room real-time chat hub.
//!
//! Clients connect over WebSocket, claim a nickname and chat; privileged
//! users moderate the room and control session recording.

pub mod chat;
pub mod clock;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod process;
pub mod web;

pub use chat::{ChatHub, HubHandle, Identity, Role, Session};
pub use config::Config;
pub use error::{ParlorError, Result};
pub use web::WebServer;

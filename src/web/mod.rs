//! Web transport for the chat hub.
//!
//! This module provides the WebSocket endpoint clients chat through, plus
//! the small HTTP surface served alongside it (statistics, health check,
//! static assets).

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;

//! WebSocket module for real-time chat.

pub mod chat;
pub mod messages;

pub use chat::{chat_ws_handler, ChannelTransport, ChatWsState, Outbound, OutboundQueue};
pub use messages::ClientFrame;

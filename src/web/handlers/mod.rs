//! HTTP handlers.

pub mod stats;

pub use stats::{get_stats, StatsResponse};

use crate::chat::HubHandle;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
}

impl AppState {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}

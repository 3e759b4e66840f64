//! Statistics handler.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::chat::HubStats;
use crate::web::error::ApiError;

/// Public chat statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Joined sessions.
    pub users: usize,
    /// Whether a recording is in progress.
    pub recording: bool,
    /// Process uptime in seconds.
    pub uptime: f64,
    /// Channel name.
    pub channel: String,
}

impl From<HubStats> for StatsResponse {
    fn from(stats: HubStats) -> Self {
        Self {
            users: stats.users,
            recording: stats.recording,
            uptime: stats.uptime.as_secs_f64(),
            channel: stats.channel,
        }
    }
}

/// Get chat statistics.
///
/// GET /api/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.hub.stats().await?;
    Ok(Json(stats.into()))
}

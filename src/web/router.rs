//! Router configuration.

use axum::{routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::handlers::{get_stats, AppState};
use super::middleware::create_cors_layer;
use super::ws::{chat_ws_handler, ChatWsState};

/// Create the API and WebSocket router.
pub fn create_router(
    app_state: Arc<AppState>,
    ws_state: Arc<ChatWsState>,
    cors_origins: &[String],
) -> Router {
    let api_routes = Router::new()
        .route("/stats", get(get_stats))
        .with_state(app_state);

    let ws_routes = Router::new()
        .route("/ws", get(chat_ws_handler))
        .with_state(ws_state);

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Create a router serving static assets, with `index.html` at `/`.
///
/// Returns `None` if the directory does not exist.
pub fn create_static_router(static_path: &str) -> Option<Router> {
    let dir = Path::new(static_path);
    if !dir.is_dir() {
        tracing::warn!("Static directory not found: {}", static_path);
        return None;
    }
    let serve_dir = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
    Some(Router::new().fallback_service(serve_dir))
}

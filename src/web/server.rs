//! Web server for Parlor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;

use crate::chat::{self, ChatHub, Fanout, FileLogSink, HubHandle, HubSettings};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, WebConfig};
use crate::process::SystemProcess;
use crate::{ParlorError, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_router, create_static_router};
use super::ws::{ChannelTransport, ChatWsState};

/// Web server hosting the chat hub.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Handle to the hub task.
    hub: HubHandle,
    /// Per-connection outbound queues.
    transport: Arc<ChannelTransport>,
    /// Web configuration.
    web_config: WebConfig,
    hub_task: JoinHandle<()>,
}

impl WebServer {
    /// Spawn the chat hub and prepare the server.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`WebServer::start`] with an explicit time source.
    pub fn start_with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| ParlorError::Config(format!("invalid server address: {e}")))?;

        let transport = Arc::new(ChannelTransport::new());
        let hub = ChatHub::new(
            HubSettings::from_config(config),
            Fanout::new(transport.clone()),
            Arc::new(FileLogSink::new(&config.recording.logs_dir)),
            Arc::new(SystemProcess::new()),
        );
        let (hub, hub_task) = chat::spawn(
            hub,
            clock,
            Duration::from_secs(config.chat.sweep_interval_secs),
        );

        Ok(Self {
            addr,
            hub,
            transport,
            web_config: config.web.clone(),
            hub_task,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle to the running hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Build the full application router.
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState::new(self.hub.clone()));
        let ws_state = Arc::new(ChatWsState::new(self.hub.clone(), self.transport.clone()));

        let mut router = create_router(app_state, ws_state, &self.web_config.cors_origins)
            .merge(create_health_router());

        if self.web_config.serve_static {
            if let Some(static_router) = create_static_router(&self.web_config.static_path) {
                router = router.merge(static_router);
            }
        }

        router.layer(CompressionLayer::new())
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> Result<()> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).await?;
        self.hub_task.abort();
        Ok(())
    }

    /// Run the server in the background and return the bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

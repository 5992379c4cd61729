use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::GatewayConfig;
use crate::web::{routes, EventHub};

/// Gateway HTTP server instance
pub struct GatewayServer {
    state: routes::AppState,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, events: Arc<EventHub>) -> Result<Self> {
        let state = routes::AppState::new(config, events).context("failed to build backend client")?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &routes::AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let config = Arc::clone(&self.state.config);
        let app = routes::create_router(self.state);

        let listener = tokio::net::TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;

        info!(target: "gateway", addr = %config.bind_addr, "gateway listening");
        info!(target: "gateway", backend = %config.backend_url, ws_port = config.backend_ws_port, "forwarding to backend");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("gateway server failed")?;

        info!(target: "gateway", "gateway stopped");
        Ok(())
    }
}

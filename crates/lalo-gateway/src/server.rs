//! Axum-based HTTP/SSE gateway server (spec §4.8, §6): wires the six
//! endpoints onto one [`LaloContext`] and serves it.

use crate::handlers::{chat, feedback, health, models};
use crate::state::LaloContext;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// TCP-level configuration for [`GatewayServer`]; everything else the
/// server needs travels through the already-built [`LaloContext`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Builds and serves the axum app over a [`LaloContext`].
pub struct GatewayServer {
    config: GatewayConfig,
    context: LaloContext,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, context: LaloContext) -> Self {
        Self { config, context }
    }

    /// Builds the routed [`Router`], with request tracing via
    /// `tower-http`'s `TraceLayer` rather than a bespoke logging filter.
    pub fn build_app(&self) -> Router {
        Router::new()
            .route("/ai/chat", post(chat::chat))
            .route("/ai/chat/stream", post(chat::chat_stream))
            .route("/ai/models", get(models::models))
            .route("/ai/feedback", post(feedback::feedback))
            .route("/health", get(health::health))
            .route("/ready", get(health::ready))
            .layer(TraceLayer::new_for_http())
            .with_state(self.context.clone())
    }

    /// Binds `0.0.0.0:{port}` and serves until the process exits.
    pub async fn start(self) -> std::io::Result<()> {
        let app = self.build_app();
        let addr = format!("0.0.0.0:{}", self.config.port);
        info!(addr = %addr, "LALO gateway starting");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

/// Background task sweeping stale rate-limiter entries, grounded on the
/// same periodic-`gc` pattern `RateLimiter::gc` documents.
pub async fn run_rate_limiter_gc(context: LaloContext, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        context.rate_limiter.gc();
    }
}

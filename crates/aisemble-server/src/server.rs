//! `AisembleServer` — Axum HTTP server and route wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use aisemble_runtime::{ChatOrchestrator, SessionService};
use aisemble_store::ChatStore;
use aisemble_youtube::InnerTubeClient;

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::metrics;
use crate::routes;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Chat turn engine.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Session create/list/rename/delete operations.
    pub sessions: Arc<SessionService>,
    /// Message and transcript persistence.
    pub store: Arc<ChatStore>,
    /// Video platform client.
    pub platform: Arc<InnerTubeClient>,
    /// Bearer-token verifier.
    pub auth: Arc<Authenticator>,
    /// Renders the `/metrics` endpoint.
    pub metrics: PrometheusHandle,
    /// Shutdown coordinator; chat streams watch its token.
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// The main HTTP server.
pub struct AisembleServer {
    config: ServerConfig,
    state: AppState,
}

impl AisembleServer {
    /// Create a new server over already-constructed services.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/api/agents", get(routes::agents::list))
            .route(
                "/api/chat-sessions",
                post(routes::sessions::create).get(routes::sessions::list),
            )
            .route(
                "/api/chat-sessions/{id}",
                get(routes::sessions::get_one)
                    .patch(routes::sessions::rename)
                    .delete(routes::sessions::remove),
            )
            .route(
                "/api/chat-sessions/{id}/messages",
                get(routes::sessions::messages),
            )
            .route("/api/youtube/chat", post(routes::chat::stream))
            .route(
                "/api/youtube/videos/{video_id}",
                get(routes::videos::details),
            )
            .layer(middleware::from_fn(metrics::track_http))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the task handle. The task exits once
    /// the shutdown coordinator cancels and in-flight requests drain.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let shutdown = self.state.shutdown.token();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "http server terminated");
            }
        });

        info!(%addr, "http server listening");
        Ok((addr, handle))
    }
}

/// GET /health
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::render(&state.metrics)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

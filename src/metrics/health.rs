//! Health, metrics and leaderboard HTTP endpoints
//!
//! Served locally by `arena-elo serve` using Axum. Besides monitoring, the
//! server exposes the leaderboard read views and a `POST /commands` entry
//! point that forwards JSON commands to the command bus.

use crate::command::bus::CommandClient;
use crate::command::messages::{CommandResponse, MessageUtils};
use crate::error::LeaderboardError;
use crate::metrics::collector::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::store::MatchStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to; loopback keeps the leaderboard local
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub store: Option<Arc<MatchStore>>,
    pub client: Option<CommandClient>,
    pub service_name: String,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                store: None,
                client: None,
                service_name: "arena-elo".to_string(),
            },
            shutdown_tx,
        }
    }

    /// Set the store used for health checks and read views
    pub fn with_store(mut self, store: Arc<MatchStore>) -> Self {
        self.state.store = Some(store);
        self
    }

    /// Set the client used to forward posted commands
    pub fn with_client(mut self, client: CommandClient) -> Self {
        self.state.client = Some(client);
        self
    }

    pub fn with_service_name(mut self, name: &str) -> Self {
        self.state.service_name = name.to_string();
        self
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Create the Axum router with all endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/leaderboard", get(leaderboard_handler))
            .route("/history", get(history_handler))
            .route("/commands", post(command_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub fn stop(&self) {
        info!("Stopping health server...");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }
    }
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/metrics", "/leaderboard", "/history", "/commands"]
    }))
}

async fn health_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Health check requested");

    let Some(store) = &state.store else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": state.service_name,
                "error": "Service not initialized"
            })),
        )
            .into_response();
    };

    let health = HealthCheck::check(store, &state.service_name).await;
    let code = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(health)).into_response()
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    match state.metrics_collector.export_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn leaderboard_handler(State(state): State<HealthServerState>) -> Response {
    let Some(store) = &state.store else {
        return not_initialized();
    };
    match store.standings().await {
        Ok(standings) => (StatusCode::OK, Json(standings)).into_response(),
        Err(e) => error_response(&LeaderboardError::classify(&e)),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Only the most recent `limit` matches
    limit: Option<usize>,
}

async fn history_handler(
    State(state): State<HealthServerState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(store) = &state.store else {
        return not_initialized();
    };
    match store.history().await {
        Ok(history) => {
            let skip = query
                .limit
                .map(|limit| history.len().saturating_sub(limit))
                .unwrap_or(0);
            let recent: Vec<_> = history.into_iter().skip(skip).collect();
            (StatusCode::OK, Json(recent)).into_response()
        }
        Err(e) => error_response(&LeaderboardError::classify(&e)),
    }
}

/// Forward one `{type, payload}` command to the bus, which adds the envelope
async fn command_handler(State(state): State<HealthServerState>, body: Bytes) -> Response {
    let Some(client) = &state.client else {
        return not_initialized();
    };

    let command = match MessageUtils::deserialize_command(&body) {
        Ok(command) => command,
        Err(e) => return error_response(&LeaderboardError::classify(&e)),
    };

    let response = client.send(command).await;
    (status_for(&response), Json(response)).into_response()
}

fn status_for(response: &CommandResponse) -> StatusCode {
    match response.error_kind() {
        None => StatusCode::OK,
        Some("invalid_input") | Some("invalid_format") => StatusCode::BAD_REQUEST,
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("conflict") => StatusCode::CONFLICT,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &LeaderboardError) -> Response {
    let response = CommandResponse::error(error);
    (status_for(&response), Json(response)).into_response()
}

fn not_initialized() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"status": "error", "message": "Service not initialized"})),
    )
        .into_response()
}

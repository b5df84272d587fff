//! Read-only HTTP API for the agent
//!
//! Serves the Prometheus exposition of the check counters and lets operators
//! browse the audit log.
//!
//! ## Endpoints
//!
//! - `GET /metrics` - Prometheus text format
//! - `GET /api/v1/health` - Health check (includes the audit store)
//! - `GET /api/v1/checks` - Checks with at least one recorded run
//! - `GET /api/v1/checks/:name/outputs?limit=N` - Oldest-first outputs of a check
//! - `GET /api/v1/checks/:name/outputs/:key` - One check output
//! - `GET /api/v1/actions/:key` - One action output

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{ChecksResponse, HealthResponse, OutputsResponse};

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "127.0.0.1:9967")
    pub bind_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_default_metrics_addr(),
        }
    }
}

/// All routes, without binding a listener
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/metrics", get(routes::metrics::exposition))
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/checks", get(routes::checks::list_checks))
        .route(
            "/api/v1/checks/:name/outputs",
            get(routes::checks::list_outputs),
        )
        .route(
            "/api/v1/checks/:name/outputs/:key",
            get(routes::checks::get_output),
        )
        .route("/api/v1/actions/:key", get(routes::checks::get_action))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}

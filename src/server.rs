//! HTTP front door.
//!
//! One POST route carries webhook bodies to the orchestrator; `/health`
//! answers liveness probes. Every response is JSON except the health check.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::Orchestrator;
use crate::domain::Outcome;
use crate::error::BridgeError;

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Build the router serving webhooks on `path`
pub fn router(orchestrator: Arc<Orchestrator>, path: &str) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route(path, post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(orchestrator)
}

async fn receive_webhook(
    State(orchestrator): State<Arc<Orchestrator>>,
    body: Bytes,
) -> Result<Json<Outcome>, BridgeError> {
    orchestrator.handle(&body).await.map(Json)
}

async fn health() -> &'static str {
    "ok"
}

/// Serve until Ctrl-C
pub async fn serve(orchestrator: Arc<Orchestrator>, address: &str, path: &str) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid listen address: {}", address))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(address = %addr, path, "Listening for webhooks");

    axum::serve(listener, router(orchestrator, path))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

//! Status and version endpoint handlers

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::server::server::AppState;
use crate::server::types::{HealthResponse, StatusResponse, VersionResponse};

/// GET /status - Service health and index size
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
  let items_indexed = state.retriever.count().await.unwrap_or(0);

  Json(StatusResponse {
    status: "healthy".to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    items_indexed,
  })
}

/// GET /healthz - Liveness probe
pub async fn healthz() -> Json<HealthResponse> {
  Json(HealthResponse { ok: true })
}

/// GET /version - Returns current API version
pub async fn version() -> Json<VersionResponse> {
  Json(VersionResponse { version: env!("CARGO_PKG_VERSION").to_string() })
}

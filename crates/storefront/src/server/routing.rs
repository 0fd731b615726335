//! Axum router configuration for all endpoints

use axum::{
  middleware::from_fn,
  routing::{get, post},
  Router,
};
use std::sync::Arc;

use crate::server::handlers::{logs, search, status};
use crate::server::middleware::request_context_middleware;
use crate::server::server::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
  Router::new()
    // Search endpoint
    .route("/search", post(search::search))
    // Status and version endpoints
    .route("/status", get(status::status))
    .route("/healthz", get(status::healthz))
    .route("/version", get(status::version))
    // Logs endpoint
    .route("/logs", get(logs::get_logs))
    // Every request gets a correlation id and completion log
    .layer(from_fn(request_context_middleware))
    .with_state(state)
}

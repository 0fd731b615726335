//! Logs endpoint handler

use axum::{
  extract::{Extension, Query},
  http::StatusCode,
  response::Json,
};

use crate::server::middleware::RequestContext;
use crate::server::types::{ErrorResponse, LogsQuery, LogsResponse};

const DEFAULT_LOG_LIMIT: usize = 100;

/// GET /logs - Recent structured service log entries
pub async fn get_logs(
  Extension(context): Extension<RequestContext>,
  Query(params): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, (StatusCode, Json<ErrorResponse>)> {
  let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);

  match context.logger.get_logs(Some(limit), params.level.as_deref()).await {
    Ok(logs) => Ok(Json(LogsResponse { logs })),
    Err(e) => {
      context.log_error(&format!("Failed to read logs: {e}"), "logs-api").await;
      Err((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::single("logs_read_failed", &format!("Failed to read logs: {e}"))),
      ))
    }
  }
}

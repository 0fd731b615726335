//! Request context and middleware for the REST API
//!
//! Gives every request a correlation id and a handle on the shared service
//! log, injected into handlers via request extensions.

use axum::{
  extract::{ConnectInfo, Request},
  middleware::Next,
  response::Response,
};
use marlowe::service_logs::{LogContext, ServiceLogs};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Per-request context carried into handlers
#[derive(Clone)]
pub struct RequestContext {
  /// Unique ID for this request
  pub request_id: Uuid,
  /// HTTP method
  pub method: String,
  /// Request path
  pub path: String,
  /// Originating client address, used as the rate-limit identity
  pub client: String,
  /// Shared logger instance
  pub logger: Arc<ServiceLogs>,
}

impl RequestContext {
  pub fn new(method: String, path: String, client: String, logger: Arc<ServiceLogs>) -> Self {
    Self { request_id: Uuid::new_v4(), method, path, client, logger }
  }

  fn log_context(&self, status_code: Option<u16>, duration_ms: Option<f64>) -> LogContext {
    LogContext {
      request_id: Some(self.request_id.to_string()),
      method: Some(self.method.clone()),
      path: Some(self.path.clone()),
      client: Some(self.client.clone()),
      duration_ms,
      status_code,
    }
  }

  /// Log an info message with request context
  pub async fn log_info(&self, message: &str, component: &str) {
    self.logger.info_with_context(message, component, self.log_context(None, None)).await;
  }

  /// Log a warning message with request context
  pub async fn log_warn(&self, message: &str, component: &str) {
    let _ = self
      .logger
      .add_log_with_context("warn", message, component, Some(self.log_context(None, None)))
      .await;
    marlowe::warn!(message);
  }

  /// Log an error message with request context
  pub async fn log_error(&self, message: &str, component: &str) {
    let _ = self
      .logger
      .add_log_with_context("error", message, component, Some(self.log_context(None, None)))
      .await;
    marlowe::error!(message);
  }

  /// Log request completion with status and duration
  pub async fn log_request_complete(&self, status_code: u16, duration_ms: f64) {
    let _ = self
      .logger
      .add_log_with_context(
        "info",
        "Request completed",
        "http-request",
        Some(self.log_context(Some(status_code), Some(duration_ms))),
      )
      .await;
  }
}

/// Global logger instance
static GLOBAL_LOGGER: once_cell::sync::OnceCell<Arc<ServiceLogs>> =
  once_cell::sync::OnceCell::new();

/// Initialize the global logger
pub fn init_global_logger(logger: Arc<ServiceLogs>) -> Result<(), Arc<ServiceLogs>> {
  GLOBAL_LOGGER.set(logger)
}

/// Get the global logger instance
pub fn get_global_logger() -> &'static Arc<ServiceLogs> {
  GLOBAL_LOGGER.get().expect("Global logger should be initialized before use")
}

/// Middleware injecting a RequestContext into every request and logging its
/// completion
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
  let logger = get_global_logger().clone();

  let method = request.method().to_string();
  let path = request.uri().path().to_string();
  let client = request
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|info| info.0.ip().to_string())
    .unwrap_or_else(|| "unknown".to_string());

  let context = RequestContext::new(method, path, client, logger);

  let start_time = std::time::Instant::now();

  let mut request = request;
  request.extensions_mut().insert(context.clone());

  let response = next.run(request).await;

  let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
  context.log_request_complete(response.status().as_u16(), duration_ms).await;

  response
}

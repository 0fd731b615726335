//! REST API types with schemars annotations for OpenAPI generation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::server::services::vector_database::ProductMatch;

/// Hard ceiling on results per search, matching the documented API contract
pub const MAX_RESULTS_CEILING: usize = 10;

/// Results returned when the caller does not say how many they want
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Shortest accepted query after trimming
pub const MIN_QUERY_LENGTH: usize = 2;

/// Longest accepted query
pub const MAX_QUERY_LENGTH: usize = 500;

// Search Endpoint
// ===============

/// Request for the /search endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
  /// Natural-language product query
  pub query: String,

  /// Desired number of results; clamped to [1, 10], defaults to 5
  #[serde(default)]
  pub max_results: Option<i64>,
}

/// One ranked product in a search response
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProductResult {
  pub sku: String,
  pub name: String,
  pub description: String,
  pub features: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  pub categories: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub in_stock: Option<bool>,

  /// Similarity to the query in [0, 1], non-increasing down the list
  pub similarity_score: f32,
}

impl ProductResult {
  pub fn from_match(m: &ProductMatch) -> Self {
    let product = &m.product;
    Self {
      sku: product.sku.clone(),
      name: product.name.clone(),
      description: product.description.clone(),
      features: product.features.clone(),
      price: product.price,
      categories: product.categories.clone(),
      in_stock: product.in_stock,
      similarity_score: m.similarity,
    }
  }
}

/// Execution details attached to every search response
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchMetadata {
  /// Wall-clock time spent answering this request
  pub execution_time_ms: f64,

  /// Whether the response came from the cache
  pub cache_hit: bool,

  /// Chunk count in the index at query time
  pub total_index_size: usize,

  /// The resolved max_results this request ran with
  pub k: usize,

  /// How many products were actually returned
  pub results_count: usize,
}

/// Response for the /search endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
  pub products: Vec<ProductResult>,
  pub summary: String,
  pub metadata: SearchMetadata,
}

// Status Endpoints
// ================

/// Response for the /status endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  pub items_indexed: usize,
}

/// Response for the /healthz endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
  pub ok: bool,
}

/// Response for the /version endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionResponse {
  pub version: String,
}

// Logs Endpoint
// =============

/// Query parameters for the /logs endpoint
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogsQuery {
  /// Maximum number of entries to return
  pub limit: Option<usize>,

  /// Filter by log level (info, warn, error, all)
  pub level: Option<String>,
}

/// Response for the /logs endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LogsResponse {
  pub logs: Vec<marlowe::service_logs::LogEntry>,
}

// Errors
// ======

/// API error information
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
  /// Error key, unique to the error source
  pub key: String,

  /// Human readable error message
  pub message: String,
}

impl ApiError {
  pub fn new(key: &str, message: &str) -> Self {
    Self { key: key.to_string(), message: message.to_string() }
  }
}

/// Error envelope for non-2xx responses
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorResponse {
  pub errors: Vec<ApiError>,
}

impl ErrorResponse {
  pub fn single(key: &str, message: &str) -> Self {
    Self { errors: vec![ApiError::new(key, message)] }
  }
}

/// Clamp the caller's requested result count into [1, 10], defaulting when
/// absent. Out-of-range values are a boundary concern resolved right here,
/// before the core ever sees them.
pub fn resolve_max_results(requested: Option<i64>) -> usize {
  match requested {
    None => DEFAULT_MAX_RESULTS,
    Some(value) => (value.max(1) as usize).min(MAX_RESULTS_CEILING),
  }
}

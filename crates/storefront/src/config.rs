//! Runtime configuration for the search service
//!
//! Everything here is read once at process startup from the environment and
//! handed to the components that need it. The components themselves never
//! touch the environment.

use std::path::PathBuf;

/// Embedding model used when none is configured
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Configuration consumed by the search service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// Path to the catalog CSV dataset
  pub dataset_path: PathBuf,
  /// Directory holding the vector index
  pub index_dir: PathBuf,
  /// Identifier of the embedding model the index is built with
  pub embedding_model: String,
  /// Seconds a cached search response stays servable
  pub cache_ttl_secs: u64,
  /// Maximum number of cached responses held at once
  pub cache_capacity: usize,
  /// Admitted requests allowed per client within the rate window
  pub rate_limit_max: usize,
  /// Length of the trailing rate-limit window in seconds
  pub rate_limit_window_secs: u64,
  /// Similarity floor below which matches are dropped
  pub min_similarity: f32,
  /// Upper bound on embedding and vector store calls, in seconds
  pub retrieval_timeout_secs: u64,
  /// API key for the remote summarizer; template fallback when absent
  pub summarizer_api_key: Option<String>,
  /// Model name used by the remote summarizer
  pub summarizer_model: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      dataset_path: PathBuf::from("catalog.csv"),
      index_dir: PathBuf::from("vectorstore"),
      embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
      cache_ttl_secs: 60,
      cache_capacity: 256,
      rate_limit_max: 60,
      rate_limit_window_secs: 60,
      min_similarity: 0.2,
      retrieval_timeout_secs: 30,
      summarizer_api_key: None,
      summarizer_model: "gpt-4o-mini".to_string(),
    }
  }
}

impl ServiceConfig {
  /// Build a configuration from the environment, falling back to defaults
  /// for anything unset. Unparseable numeric values fall back with a warning
  /// rather than being silently coerced.
  pub fn from_env() -> Self {
    let defaults = Self::default();

    Self {
      dataset_path: env_path("DATASET_PATH", defaults.dataset_path),
      index_dir: env_path("INDEX_DIR", defaults.index_dir),
      embedding_model: env_string("EMBEDDING_MODEL", defaults.embedding_model),
      cache_ttl_secs: env_parsed("CACHE_TTL", defaults.cache_ttl_secs),
      cache_capacity: env_parsed("CACHE_CAPACITY", defaults.cache_capacity),
      rate_limit_max: env_parsed("RATE_LIMIT", defaults.rate_limit_max),
      rate_limit_window_secs: env_parsed("RATE_LIMIT_WINDOW", defaults.rate_limit_window_secs),
      min_similarity: env_parsed("MIN_SIMILARITY", defaults.min_similarity),
      retrieval_timeout_secs: env_parsed("RETRIEVAL_TIMEOUT", defaults.retrieval_timeout_secs),
      summarizer_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
      summarizer_model: env_string("OPENAI_MODEL", defaults.summarizer_model),
    }
  }
}

fn env_string(key: &str, default: String) -> String {
  std::env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
  std::env::var(key).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
  match std::env::var(key) {
    Ok(raw) => match raw.trim().parse() {
      Ok(value) => value,
      Err(_) => {
        marlowe::warn!(&format!("Ignoring unparseable {key}={raw}, using default {default}"));
        default
      }
    },
    Err(_) => default,
  }
}

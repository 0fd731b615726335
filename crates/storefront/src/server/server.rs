//! REST server startup and configuration

use anyhow::Result;
use axum::serve;
use marlowe::service_logs::ServiceLogs;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::server::middleware::init_global_logger;
use crate::server::routing::create_router;
use crate::server::services::rate_limiter::RateLimiter;
use crate::server::services::response_cache::ResponseCache;
use crate::server::services::retriever::Retriever;
use crate::server::services::summarizer::Summarizer;

/// Shared state handed to every handler
pub struct AppState {
  pub retriever: Retriever,
  pub cache: ResponseCache,
  pub rate_limiter: RateLimiter,
  pub summarizer: Box<dyn Summarizer>,
}

/// Start the REST server
pub async fn start_server(addr: SocketAddr, config: ServiceConfig) -> Result<()> {
  // Persistent structured logging for the /logs endpoint and CLI
  let logs_path = get_server_logs_path();
  let service_logs = Arc::new(ServiceLogs::new(&logs_path)?);
  let _ = init_global_logger(service_logs.clone());

  service_logs.info(&format!("Starting product search server on {addr}"), "server").await;

  let state = build_state(config).await?;
  let items = state.retriever.count().await.unwrap_or(0);
  service_logs.info(&format!("Vector index ready with {items} chunks"), "server").await;

  let app = create_router(state).layer(
    ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()), // TODO: Configure CORS properly for production
  );

  let listener = TcpListener::bind(addr).await?;
  service_logs.info(&format!("Server listening on {addr}"), "server").await;
  marlowe::info!(&format!("Server listening on {addr}"));

  // Client addresses feed the rate limiter, so serve with connect info
  match serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
    Ok(_) => {
      service_logs.info("Server shutdown gracefully", "server").await;
      Ok(())
    }
    Err(e) => {
      service_logs.error(&format!("Server error: {}", e), "server").await;
      Err(anyhow::anyhow!("Server error: {}", e))
    }
  }
}

/// Wire up the retrieval pipeline and shared components. Refuses to start
/// when the configured embedding model does not match the persisted index.
#[cfg(feature = "ml-features")]
async fn build_state(config: ServiceConfig) -> Result<Arc<AppState>> {
  use crate::server::services::embeddings::{ensure_model, Embedder, ModelEmbedder};
  use crate::server::services::lancedb::LanceDbVectorDatabase;
  use crate::server::services::vector_database::VectorDatabase;
  use crate::server::services::{catalog, index_meta, indexer, summarizer};
  use std::time::Duration;

  // Model identity is a startup precondition, not a per-query concern
  index_meta::validate_model_identity(&config.index_dir, &config.embedding_model)?;

  let dimension = ensure_model(&config.embedding_model).await?;
  let index: Arc<dyn VectorDatabase> = Arc::new(
    LanceDbVectorDatabase::new(config.index_dir.clone(), "products", dimension).await?,
  );

  let embedder: Arc<dyn Embedder> = Arc::new(ModelEmbedder::new(&config.embedding_model));

  // First boot on an empty index ingests the catalog; later boots skip it
  if index.count().await? == 0 {
    let products = catalog::load_catalog(&config.dataset_path)?;
    indexer::ensure_index(embedder.as_ref(), index.as_ref(), &config.index_dir, products, false)
      .await?;
  }

  let retriever = Retriever::new(
    Arc::clone(&embedder),
    Arc::clone(&index),
    config.min_similarity,
    Duration::from_secs(config.retrieval_timeout_secs),
  );

  let cache = ResponseCache::new(Duration::from_secs(config.cache_ttl_secs), config.cache_capacity);
  let rate_limiter =
    RateLimiter::new(config.rate_limit_max, Duration::from_secs(config.rate_limit_window_secs));
  let summarizer = summarizer::select_summarizer(&config);

  Ok(Arc::new(AppState { retriever, cache, rate_limiter, summarizer }))
}

#[cfg(not(feature = "ml-features"))]
async fn build_state(_config: ServiceConfig) -> Result<Arc<AppState>> {
  Err(anyhow::anyhow!(
    "The search server requires the ml-features build; rebuild with default features enabled"
  ))
}

/// Get the path for server logs
pub fn get_server_logs_path() -> std::path::PathBuf {
  dirs::home_dir()
    .unwrap_or_else(|| std::path::Path::new("/tmp").to_path_buf())
    .join(".storefront")
    .join("server.logs.jsonl")
}

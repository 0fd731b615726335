//! CLI command implementations
//!
//! The CLI drives the same services the server uses, directly in-process:
//! index builds, one-off searches, index inspection and log queries.

use anyhow::Result;
use colored::*;

use crate::config::ServiceConfig;
use crate::server::server::get_server_logs_path;

/// Build or refresh the vector index from the catalog dataset
#[cfg(feature = "ml-features")]
pub async fn index_catalog(config: &ServiceConfig, force: bool) -> Result<()> {
  use crate::server::services::{catalog, indexer};

  let (embedder, index) = open_index(config).await?;
  let products = catalog::load_catalog(&config.dataset_path)?;

  let total =
    indexer::ensure_index(embedder.as_ref(), index.as_ref(), &config.index_dir, products, force)
      .await?;

  println!("{} Index ready with {} chunks", "✓".green(), total.to_string().cyan());
  Ok(())
}

#[cfg(not(feature = "ml-features"))]
pub async fn index_catalog(_config: &ServiceConfig, _force: bool) -> Result<()> {
  Err(anyhow::anyhow!("Indexing requires the ml-features build"))
}

/// Run a one-off search against the local index
#[cfg(feature = "ml-features")]
pub async fn search_catalog(
  config: &ServiceConfig,
  query: &str,
  max_results: usize,
) -> Result<()> {
  use crate::server::services::retriever::Retriever;
  use crate::server::services::summarizer;
  use std::time::Duration;

  let (embedder, index) = open_index(config).await?;

  let retriever = Retriever::new(
    embedder,
    index,
    config.min_similarity,
    Duration::from_secs(config.retrieval_timeout_secs),
  );

  let retrieval = retriever.search(query, max_results).await?;

  if retrieval.matches.is_empty() {
    println!("No matches found for: {}", query.yellow());
  } else {
    for m in &retrieval.matches {
      let product = &m.product;
      let price = product.price.map(|p| format!("${p:.2}")).unwrap_or_else(|| "N/A".to_string());
      println!(
        "{} {} ({}) - {} [score {:.3}]",
        "•".cyan(),
        product.name.bold(),
        product.sku.yellow(),
        price,
        m.similarity
      );
      if !product.description.is_empty() {
        println!("  {}", product.description.dimmed());
      }
    }
  }

  let summarizer = summarizer::select_summarizer(config);
  let summary = summarizer.summarize(query, &retrieval.matches).await;
  println!("\n{summary}");

  Ok(())
}

#[cfg(not(feature = "ml-features"))]
pub async fn search_catalog(
  _config: &ServiceConfig,
  _query: &str,
  _max_results: usize,
) -> Result<()> {
  Err(anyhow::anyhow!("Search requires the ml-features build"))
}

/// Show the chunk count in the index
#[cfg(feature = "ml-features")]
pub async fn count_chunks(config: &ServiceConfig) -> Result<()> {
  use crate::server::services::vector_database::VectorDatabase;

  let index = open_index_readonly(config).await?;
  let count = index.count().await?;
  println!("{} chunks indexed", count.to_string().cyan());
  Ok(())
}

#[cfg(not(feature = "ml-features"))]
pub async fn count_chunks(_config: &ServiceConfig) -> Result<()> {
  Err(anyhow::anyhow!("Index inspection requires the ml-features build"))
}

/// Query the server's structured logs
pub async fn logs(limit: usize, level: &str) -> Result<()> {
  let logs_path = get_server_logs_path();
  let store = marlowe::service_logs::ServiceLogs::new_with_silent(&logs_path, true)?;

  let entries = store.get_logs(Some(limit), Some(level)).await?;

  if entries.is_empty() {
    println!("No log entries found at {}", logs_path.display());
    return Ok(());
  }

  for entry in entries {
    let level_colored = match entry.level.as_str() {
      "error" => entry.level.red().bold(),
      "warn" => entry.level.yellow().bold(),
      "success" => entry.level.green().bold(),
      _ => entry.level.blue().bold(),
    };
    println!(
      "{} [{}] [{}] {}",
      entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
      level_colored,
      entry.component.cyan(),
      entry.message
    );
  }

  Ok(())
}

/// Load the embedding model and open the index for read/write use
#[cfg(feature = "ml-features")]
async fn open_index(
  config: &ServiceConfig,
) -> Result<(
  std::sync::Arc<dyn crate::server::services::embeddings::Embedder>,
  std::sync::Arc<dyn crate::server::services::vector_database::VectorDatabase>,
)> {
  use crate::server::services::embeddings::{ensure_model, ModelEmbedder};
  use crate::server::services::index_meta;
  use crate::server::services::lancedb::LanceDbVectorDatabase;
  use std::sync::Arc;

  index_meta::validate_model_identity(&config.index_dir, &config.embedding_model)?;

  let dimension = ensure_model(&config.embedding_model).await?;
  let index =
    LanceDbVectorDatabase::new(config.index_dir.clone(), "products", dimension).await?;

  Ok((Arc::new(ModelEmbedder::new(&config.embedding_model)), Arc::new(index)))
}

/// Open the index without loading the model, for read-only inspection
#[cfg(feature = "ml-features")]
async fn open_index_readonly(
  config: &ServiceConfig,
) -> Result<crate::server::services::lancedb::LanceDbVectorDatabase> {
  use crate::server::services::embeddings::declared_dimension;
  use crate::server::services::index_meta;
  use crate::server::services::lancedb::LanceDbVectorDatabase;

  // Best-effort dimension: sidecar metadata, then the model's declaration.
  // Inspection never writes, so a wrong guess cannot corrupt anything.
  let dimension = index_meta::load_meta(&config.index_dir)?
    .map(|meta| meta.dimension)
    .or_else(|| declared_dimension(&config.embedding_model))
    .unwrap_or(384);

  LanceDbVectorDatabase::new(config.index_dir.clone(), "products", dimension).await
}

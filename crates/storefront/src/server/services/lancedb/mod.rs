//! LanceDB-backed vector index for product chunks
//!
//! Stores one record per catalog chunk (embedding plus the full metadata
//! payload) and serves nearest-neighbor queries over the embedding column.

pub mod connection;
pub mod models;
pub mod records;
pub mod search;
pub mod table_manager;
pub mod vector_database;

use anyhow::Result;
use std::path::PathBuf;

use crate::server::models::product::ProductChunk;
use connection::create_connection;
use search::search_similar_chunks;
use table_manager::TableManager;

// Re-export commonly used types for external use
pub use models::ChunkRecord;
pub use vector_database::LanceDbVectorDatabase;

/// LanceDB service for vector operations
pub struct LanceDbService {
  table_manager: TableManager,
  dimension: usize,
}

impl LanceDbService {
  /// Open (or create) the database under `data_dir`. `dimension` fixes the
  /// embedding column width for any table this service creates.
  pub async fn new(data_dir: PathBuf, table_name: &str, dimension: usize) -> Result<Self> {
    let connection = create_connection(data_dir).await?;
    let table_manager = TableManager::new(connection, table_name.to_string());

    Ok(Self { table_manager, dimension })
  }

  /// Store a chunk's embedding, replacing any prior record with the same sku
  pub async fn upsert_chunk(&self, chunk: &ProductChunk, embedding: &[f32]) -> Result<()> {
    validate_embedding_width(embedding, self.dimension)?;
    let record = ChunkRecord::from_chunk(chunk, embedding);

    if self.table_manager.table_exists().await? {
      // Upsert: any earlier vector for this sku goes away first
      self.table_manager.delete_sku(&record.sku).await?;
      self.table_manager.add_record(&record, self.dimension).await
    } else {
      self.table_manager.create_table_with_first_record(&record, self.dimension).await
    }
  }

  /// Nearest-neighbor search over the embedding column
  pub async fn search(
    &self,
    query_embedding: &[f32],
    k: usize,
  ) -> Result<Vec<models::ChunkMatch>> {
    if !self.table_manager.table_exists().await? {
      return Ok(Vec::new());
    }
    validate_embedding_width(query_embedding, self.dimension)?;

    let table = self.table_manager.get_table().await?;
    search_similar_chunks(&table, query_embedding, k).await
  }

  /// Number of chunks currently stored
  pub async fn count(&self) -> Result<usize> {
    if !self.table_manager.table_exists().await? {
      return Ok(0);
    }
    self.table_manager.count_rows().await
  }

  /// Remove every stored chunk
  pub async fn clear_all(&self) -> Result<()> {
    if self.table_manager.table_exists().await? {
      let table = self.table_manager.get_table().await?;
      table.delete("sku IS NOT NULL").await?;
      marlowe::info!("Cleared all chunks from the vector index");
    }
    Ok(())
  }
}

/// A query or stored vector whose width disagrees with the index dimension
/// would silently produce nonsense distances; refuse it instead
fn validate_embedding_width(embedding: &[f32], dimension: usize) -> Result<()> {
  if embedding.len() != dimension {
    return Err(anyhow::anyhow!(
      "Embedding has {} dimensions but the index expects {dimension}",
      embedding.len()
    ));
  }
  Ok(())
}

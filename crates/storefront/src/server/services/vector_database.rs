//! Vector index abstraction for product chunk storage and retrieval
//!
//! Generic interface over the underlying vector engine so the storage
//! backend can be swapped without touching retrieval or serving code.

use anyhow::Result;
use async_trait::async_trait;

use crate::server::models::product::{Product, ProductChunk};

/// A product returned from a similarity search, with its score attached
#[derive(Debug, Clone)]
pub struct ProductMatch {
  /// Full metadata payload carried alongside the embedding
  pub product: Product,
  /// Similarity score in [0, 1], higher is more similar
  pub similarity: f32,
}

/// Vector index interface for storing and searching product chunks
#[async_trait]
pub trait VectorDatabase: Send + Sync {
  /// Store a chunk and its embedding. Upserts by the chunk's sku: any prior
  /// vector for that sku is replaced, never duplicated.
  async fn upsert_chunk(&self, chunk: &ProductChunk, embedding: &[f32]) -> Result<()>;

  /// Return up to `k` nearest chunks for a query embedding, closest first.
  /// Asking for more than the index holds returns everything; an empty
  /// index returns an empty list.
  async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ProductMatch>>;

  /// Number of chunks currently in the index
  async fn count(&self) -> Result<usize>;

  /// Remove every chunk from the index
  async fn clear_all(&self) -> Result<()>;
}

//! Query-time retrieval: embed, search, score, rank
//!
//! The retriever assumes the embedding model identity was validated against
//! the index at startup; by the time a query arrives here, mixing models is
//! no longer possible.

use std::sync::Arc;
use std::time::Duration;

use crate::server::services::embeddings::Embedder;
use crate::server::services::vector_database::{ProductMatch, VectorDatabase};

/// Outcome of one retrieval pass
#[derive(Debug)]
pub struct Retrieval {
  /// Ranked matches, similarity non-increasing, at most `max_results` long.
  /// Empty when the index is empty or nothing cleared the similarity floor.
  pub matches: Vec<ProductMatch>,
  /// Chunk count in the index at query time
  pub index_size: usize,
}

/// Retrieval failures the handler needs to tell apart
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
  /// The embedding or vector store call exceeded its budget; the caller
  /// may retry later. Never cached.
  #[error("retrieval timed out after {0:?}")]
  Timeout(Duration),

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

/// Embeds incoming queries and ranks nearest catalog chunks
pub struct Retriever {
  embedder: Arc<dyn Embedder>,
  index: Arc<dyn VectorDatabase>,
  min_similarity: f32,
  timeout: Duration,
}

impl Retriever {
  pub fn new(
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorDatabase>,
    min_similarity: f32,
    timeout: Duration,
  ) -> Self {
    Self { embedder, index, min_similarity, timeout }
  }

  /// Run one search. `max_results` arrives already clamped by the boundary
  /// layer. Matches below the similarity floor are dropped rather than
  /// padded - an empty result is a valid outcome, not an error.
  pub async fn search(
    &self,
    query: &str,
    max_results: usize,
  ) -> Result<Retrieval, RetrievalError> {
    let query_embedding = self.bounded(self.embedder.embed_query(query)).await??;

    let mut matches = self.bounded(self.index.search(&query_embedding, max_results)).await??;

    matches.retain(|m| m.similarity >= self.min_similarity);
    // The engine returns closest-first already; re-sort so the ordering
    // contract holds regardless of backend
    matches.sort_by(|a, b| {
      b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(max_results);

    let index_size = self.index.count().await.map_err(RetrievalError::Internal)?;

    Ok(Retrieval { matches, index_size })
  }

  /// Current chunk count, for status reporting
  pub async fn count(&self) -> Result<usize, RetrievalError> {
    self.index.count().await.map_err(RetrievalError::Internal)
  }

  async fn bounded<T>(
    &self,
    future: impl std::future::Future<Output = T>,
  ) -> Result<T, RetrievalError> {
    tokio::time::timeout(self.timeout, future)
      .await
      .map_err(|_| RetrievalError::Timeout(self.timeout))
  }
}

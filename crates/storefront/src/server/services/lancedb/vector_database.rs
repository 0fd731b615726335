//! LanceDB implementation of the VectorDatabase trait

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

use crate::server::models::product::ProductChunk;
use crate::server::services::lancedb::LanceDbService;
use crate::server::services::vector_database::{ProductMatch, VectorDatabase};

/// LanceDB adapter behind the generic vector index interface
pub struct LanceDbVectorDatabase {
  service: LanceDbService,
}

impl LanceDbVectorDatabase {
  /// Create a new LanceDB vector database instance
  pub async fn new(data_dir: PathBuf, table_name: &str, dimension: usize) -> Result<Self> {
    let service = LanceDbService::new(data_dir, table_name, dimension).await?;
    Ok(Self { service })
  }
}

#[async_trait]
impl VectorDatabase for LanceDbVectorDatabase {
  async fn upsert_chunk(&self, chunk: &ProductChunk, embedding: &[f32]) -> Result<()> {
    self.service.upsert_chunk(chunk, embedding).await
  }

  async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ProductMatch>> {
    let chunk_matches = self.service.search(query_embedding, k).await?;

    let matches = chunk_matches
      .into_iter()
      .map(|result| ProductMatch { product: result.product, similarity: result.similarity })
      .collect();

    Ok(matches)
  }

  async fn count(&self) -> Result<usize> {
    self.service.count().await
  }

  async fn clear_all(&self) -> Result<()> {
    self.service.clear_all().await
  }
}

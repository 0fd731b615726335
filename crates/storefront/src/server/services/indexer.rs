//! Index construction from the product catalog
//!
//! The offline half of the pipeline: loaded products become chunks, chunks
//! become embeddings, embeddings land in the vector index keyed by sku.
//! Individual failures warn and continue; only a totally unusable setup is
//! fatal.

use anyhow::Result;
use std::path::Path;

use crate::server::models::product::{Product, ProductChunk};
use crate::server::services::embeddings::Embedder;
use crate::server::services::index_meta::{self, IndexMeta};
use crate::server::services::vector_database::VectorDatabase;

/// Ensure the index is populated. Without `force`, a non-empty index is
/// left untouched; with it, everything is rebuilt from the given products.
/// Returns the chunk count after the call.
pub async fn ensure_index(
  embedder: &dyn Embedder,
  index: &dyn VectorDatabase,
  index_dir: &Path,
  products: Vec<Product>,
  force: bool,
) -> Result<usize> {
  let existing = index.count().await?;
  if !force && existing > 0 {
    index_meta::validate_model_identity(index_dir, embedder.model_id())?;
    marlowe::info!(&format!("Vector index already holds {existing} chunks, skipping build"));
    return Ok(existing);
  }

  if force && existing > 0 {
    marlowe::info!("Forced rebuild: clearing existing chunks");
    index.clear_all().await?;
  }

  build_index(embedder, index, index_dir, products).await
}

/// Embed every product and upsert it into the index, then record the model
/// identity next to the data
async fn build_index(
  embedder: &dyn Embedder,
  index: &dyn VectorDatabase,
  index_dir: &Path,
  products: Vec<Product>,
) -> Result<usize> {
  let total = products.len();
  marlowe::info!(&format!("Building vector index from {total} products"));

  let mut embedded = 0usize;
  let mut errors = 0usize;
  let mut dimension = 0usize;

  for (position, product) in products.into_iter().enumerate() {
    let chunk = ProductChunk::from_product(product);

    match embedder.embed_document(&chunk.text).await {
      Ok(embedding) => {
        dimension = embedding.len();
        if let Err(e) = index.upsert_chunk(&chunk, &embedding).await {
          errors += 1;
          marlowe::warn!(&format!("Failed to store chunk for sku {}: {e}", chunk.product.sku));
        } else {
          embedded += 1;
        }
      }
      Err(e) => {
        errors += 1;
        marlowe::warn!(&format!("Failed to embed sku {}: {e}", chunk.product.sku));
      }
    }

    if (position + 1) % 50 == 0 || position + 1 == total {
      marlowe::info!(&format!(
        "Index build progress: {}/{total} (embedded: {embedded}, errors: {errors})",
        position + 1
      ));
    }
  }

  if embedded > 0 {
    index_meta::write_meta(index_dir, &IndexMeta::new(embedder.model_id(), dimension))?;
  }

  let count = index.count().await?;
  marlowe::success!(&format!("Index build complete: {count} chunks, {errors} errors"));
  Ok(count)
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::anyhow;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::Mutex;
  use tempfile::TempDir;

  use crate::server::services::vector_database::ProductMatch;

  /// Deterministic embedder: hashes text length into a tiny vector
  struct StubEmbedder {
    fail_for: Option<String>,
  }

  #[async_trait]
  impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
      "stub-model"
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
      self.embed_document(text).await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
      if let Some(needle) = &self.fail_for {
        if text.contains(needle.as_str()) {
          return Err(anyhow!("embedding refused for test"));
        }
      }
      Ok(vec![text.len() as f32, 1.0])
    }
  }

  /// In-memory index keyed by sku, mirroring the upsert contract
  #[derive(Default)]
  struct MemoryIndex {
    chunks: Mutex<HashMap<String, Vec<f32>>>,
  }

  #[async_trait]
  impl VectorDatabase for MemoryIndex {
    async fn upsert_chunk(&self, chunk: &ProductChunk, embedding: &[f32]) -> Result<()> {
      let mut chunks = self.chunks.lock().unwrap();
      chunks.insert(chunk.product.sku.clone(), embedding.to_vec());
      Ok(())
    }

    async fn search(&self, _query_embedding: &[f32], _k: usize) -> Result<Vec<ProductMatch>> {
      Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize> {
      Ok(self.chunks.lock().unwrap().len())
    }

    async fn clear_all(&self) -> Result<()> {
      self.chunks.lock().unwrap().clear();
      Ok(())
    }
  }

  fn product(sku: &str, name: &str) -> Product {
    Product {
      sku: sku.to_string(),
      name: name.to_string(),
      description: "desc".to_string(),
      features: vec![],
      price: None,
      categories: vec![],
      in_stock: None,
    }
  }

  #[tokio::test]
  async fn test_chunk_count_equals_unique_skus() {
    let temp = TempDir::new().unwrap();
    let embedder = StubEmbedder { fail_for: None };
    let index = MemoryIndex::default();

    // A duplicated sku collapses to one chunk through upsert
    let products = vec![product("A1", "Monitor"), product("B2", "Chair"), product("A1", "Monitor v2")];

    let count = ensure_index(&embedder, &index, temp.path(), products, false).await.unwrap();
    assert_eq!(count, 2);
  }

  #[tokio::test]
  async fn test_reingestion_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let embedder = StubEmbedder { fail_for: None };
    let index = MemoryIndex::default();

    let products = vec![product("A1", "Monitor"), product("B2", "Chair")];

    let first =
      ensure_index(&embedder, &index, temp.path(), products.clone(), true).await.unwrap();
    let second = ensure_index(&embedder, &index, temp.path(), products, true).await.unwrap();

    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_existing_index_skipped_without_force() {
    let temp = TempDir::new().unwrap();
    let embedder = StubEmbedder { fail_for: None };
    let index = MemoryIndex::default();

    ensure_index(&embedder, &index, temp.path(), vec![product("A1", "Monitor")], false)
      .await
      .unwrap();

    // Second call offers more products but must not touch the index
    let count = ensure_index(
      &embedder,
      &index,
      temp.path(),
      vec![product("A1", "Monitor"), product("B2", "Chair")],
      false,
    )
    .await
    .unwrap();

    assert_eq!(count, 1);
  }

  #[tokio::test]
  async fn test_embedding_failure_warns_and_continues() {
    let temp = TempDir::new().unwrap();
    let embedder = StubEmbedder { fail_for: Some("Cursed".to_string()) };
    let index = MemoryIndex::default();

    let products = vec![product("A1", "Monitor"), product("X0", "Cursed Gadget")];

    let count = ensure_index(&embedder, &index, temp.path(), products, false).await.unwrap();
    assert_eq!(count, 1);
  }

  #[tokio::test]
  async fn test_build_records_model_identity() {
    let temp = TempDir::new().unwrap();
    let embedder = StubEmbedder { fail_for: None };
    let index = MemoryIndex::default();

    ensure_index(&embedder, &index, temp.path(), vec![product("A1", "Monitor")], false)
      .await
      .unwrap();

    let meta = index_meta::load_meta(temp.path()).unwrap().unwrap();
    assert_eq!(meta.embedding_model, "stub-model");
    assert_eq!(meta.dimension, 2);
  }

  #[tokio::test]
  async fn test_skipping_existing_index_still_checks_model_identity() {
    let temp = TempDir::new().unwrap();
    let index = MemoryIndex::default();

    let first = StubEmbedder { fail_for: None };
    ensure_index(&first, &index, temp.path(), vec![product("A1", "Monitor")], false)
      .await
      .unwrap();

    // Same index, different configured model: must refuse to serve
    struct OtherModel;
    #[async_trait]
    impl Embedder for OtherModel {
      fn model_id(&self) -> &str {
        "different-model"
      }
      async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0, 0.0])
      }
      async fn embed_document(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0, 0.0])
      }
    }

    let result =
      ensure_index(&OtherModel, &index, temp.path(), vec![product("A1", "Monitor")], false).await;
    assert!(result.is_err());
  }
}

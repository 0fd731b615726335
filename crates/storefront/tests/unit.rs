//! Cross-module pipeline tests with deterministic in-memory substitutes
//!
//! A keyword-driven embedder and a real nearest-neighbor memory index stand
//! in for the neural model and LanceDB, so the retrieval pipeline's
//! contracts can be exercised end to end without network or model files.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use storefront::server::models::product::{Product, ProductChunk};
use storefront::server::services::embeddings::Embedder;
use storefront::server::services::indexer;
use storefront::server::services::response_cache::{CachedSearch, ResponseCache};
use storefront::server::services::retriever::Retriever;
use storefront::server::services::summarizer::{Summarizer, TemplateSummarizer};
use storefront::server::services::vector_database::{ProductMatch, VectorDatabase};

/// Maps keyword families onto axis-aligned unit vectors so similarity
/// behaves predictably
struct KeywordEmbedder;

fn keyword_vector(text: &str) -> Vec<f32> {
  let lowered = text.to_lowercase();
  if lowered.contains("monitor") || lowered.contains("display") {
    vec![1.0, 0.0, 0.0]
  } else if lowered.contains("chair") || lowered.contains("seat") {
    vec![0.0, 1.0, 0.0]
  } else {
    vec![0.0, 0.0, 1.0]
  }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
  fn model_id(&self) -> &str {
    "keyword-test-model"
  }

  async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
    Ok(keyword_vector(text))
  }

  async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
    Ok(keyword_vector(text))
  }
}

/// In-memory vector index with genuine cosine ranking and upsert-by-sku
#[derive(Default)]
struct MemoryIndex {
  chunks: Mutex<HashMap<String, (Product, Vec<f32>)>>,
}

fn cosine_similarity_score(a: &[f32], b: &[f32]) -> f32 {
  let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }
  // Same [0, 1] mapping the service applies to engine distances
  ((dot / (norm_a * norm_b)) + 1.0) / 2.0
}

#[async_trait]
impl VectorDatabase for MemoryIndex {
  async fn upsert_chunk(&self, chunk: &ProductChunk, embedding: &[f32]) -> Result<()> {
    let mut chunks = self.chunks.lock().unwrap();
    chunks.insert(chunk.product.sku.clone(), (chunk.product.clone(), embedding.to_vec()));
    Ok(())
  }

  async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ProductMatch>> {
    let chunks = self.chunks.lock().unwrap();
    let mut matches: Vec<ProductMatch> = chunks
      .values()
      .map(|(product, embedding)| ProductMatch {
        product: product.clone(),
        similarity: cosine_similarity_score(query_embedding, embedding),
      })
      .collect();
    matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    matches.truncate(k);
    Ok(matches)
  }

  async fn count(&self) -> Result<usize> {
    Ok(self.chunks.lock().unwrap().len())
  }

  async fn clear_all(&self) -> Result<()> {
    self.chunks.lock().unwrap().clear();
    Ok(())
  }
}

fn product(sku: &str, name: &str, description: &str, price: f64) -> Product {
  Product {
    sku: sku.to_string(),
    name: name.to_string(),
    description: description.to_string(),
    features: vec![],
    price: Some(price),
    categories: vec![],
    in_stock: Some(true),
  }
}

fn sample_catalog() -> Vec<Product> {
  vec![
    product("A1", "UltraWide Monitor", "34-inch display for productivity", 399.99),
    product("B2", "Office Chair", "Ergonomic seat with lumbar support", 249.00),
  ]
}

async fn indexed_retriever() -> (Retriever, TempDir) {
  let temp = TempDir::new().unwrap();
  let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
  let index: Arc<dyn VectorDatabase> = Arc::new(MemoryIndex::default());

  indexer::ensure_index(&KeywordEmbedder, index.as_ref(), temp.path(), sample_catalog(), false)
    .await
    .unwrap();

  let retriever = Retriever::new(embedder, index, 0.2, Duration::from_secs(5));
  (retriever, temp)
}

#[tokio::test]
async fn test_monitor_query_returns_the_monitor_not_the_chair() {
  let (retriever, _temp) = indexed_retriever().await;

  let retrieval = retriever.search("monitor for productivity", 1).await.unwrap();

  assert_eq!(retrieval.matches.len(), 1);
  assert_eq!(retrieval.matches[0].product.sku, "A1");

  let summary = TemplateSummarizer.summarize("monitor for productivity", &retrieval.matches).await;
  assert!(summary.contains("UltraWide Monitor"));
  assert!(!summary.contains("Office Chair"));
}

#[tokio::test]
async fn test_results_count_bounded_by_max_results_and_index_size() {
  let (retriever, _temp) = indexed_retriever().await;

  for k in 1..=10 {
    let retrieval = retriever.search("monitor", k).await.unwrap();
    assert!(retrieval.matches.len() <= k);
    assert!(retrieval.matches.len() <= retrieval.index_size);
  }
}

#[tokio::test]
async fn test_scores_non_increasing_by_rank() {
  let (retriever, _temp) = indexed_retriever().await;

  let retrieval = retriever.search("monitor", 10).await.unwrap();

  for pair in retrieval.matches.windows(2) {
    assert!(pair[0].similarity >= pair[1].similarity);
  }
}

#[tokio::test]
async fn test_empty_index_yields_empty_results_and_graceful_summary() {
  let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
  let index: Arc<dyn VectorDatabase> = Arc::new(MemoryIndex::default());
  let retriever = Retriever::new(embedder, index, 0.2, Duration::from_secs(5));

  let retrieval = retriever.search("anything at all", 5).await.unwrap();
  assert!(retrieval.matches.is_empty());
  assert_eq!(retrieval.index_size, 0);

  let summary = TemplateSummarizer.summarize("anything at all", &retrieval.matches).await;
  assert!(summary.contains("No relevant products found"));
}

#[tokio::test]
async fn test_reingestion_keeps_index_size_stable() {
  let temp = TempDir::new().unwrap();
  let index = MemoryIndex::default();

  let first =
    indexer::ensure_index(&KeywordEmbedder, &index, temp.path(), sample_catalog(), true)
      .await
      .unwrap();
  let second =
    indexer::ensure_index(&KeywordEmbedder, &index, temp.path(), sample_catalog(), true)
      .await
      .unwrap();

  assert_eq!(first, 2);
  assert_eq!(first, second);
}

#[tokio::test]
async fn test_cached_payload_is_identical_within_ttl() {
  let (retriever, _temp) = indexed_retriever().await;
  let cache = ResponseCache::new(Duration::from_secs(60), 16);

  let query = "monitor for productivity";
  let retrieval = retriever.search(query, 5).await.unwrap();
  let summary = TemplateSummarizer.summarize(query, &retrieval.matches).await;

  cache.put(query, 5, CachedSearch { matches: retrieval.matches, summary: summary.clone() });

  let hit = cache.get(query, 5).expect("fresh entry must hit");
  assert_eq!(hit.summary, summary);
  assert_eq!(hit.matches[0].product.sku, "A1");

  // The near-identical query is intentionally a separate key
  assert!(cache.get("monitor for productivity!", 5).is_none());
}

#[tokio::test]
async fn test_cache_expires_after_ttl() {
  let cache = ResponseCache::new(Duration::from_millis(20), 16);
  cache.put("monitor", 5, CachedSearch { matches: vec![], summary: "s".to_string() });

  assert!(cache.get("monitor", 5).is_some());
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(cache.get("monitor", 5).is_none());
}

#[tokio::test]
async fn test_duplicate_skus_collapse_to_one_chunk() {
  let temp = TempDir::new().unwrap();
  let index = MemoryIndex::default();

  let mut products = sample_catalog();
  products.push(product("A1", "UltraWide Monitor rev2", "updated display", 429.99));

  let count =
    indexer::ensure_index(&KeywordEmbedder, &index, temp.path(), products, false).await.unwrap();
  assert_eq!(count, 2);
}

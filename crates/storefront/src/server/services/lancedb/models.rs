//! Data models for LanceDB operations

use serde::{Deserialize, Serialize};

use crate::server::models::product::{Product, ProductChunk};

/// Record structure for storing in LanceDB. List-valued product fields are
/// kept as JSON strings so the Arrow schema stays flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
  pub sku: String,
  pub name: String,
  pub description: String,
  pub features: String,
  pub categories: String,
  pub price: Option<f64>,
  pub in_stock: Option<bool>,
  pub chunk_text: String,
  pub embedding: Vec<f32>,
  pub indexed_at: String,
}

impl ChunkRecord {
  pub fn from_chunk(chunk: &ProductChunk, embedding: &[f32]) -> Self {
    let product = &chunk.product;
    Self {
      sku: product.sku.clone(),
      name: product.name.clone(),
      description: product.description.clone(),
      features: serde_json::to_string(&product.features).unwrap_or_else(|_| "[]".to_string()),
      categories: serde_json::to_string(&product.categories).unwrap_or_else(|_| "[]".to_string()),
      price: product.price,
      in_stock: product.in_stock,
      chunk_text: chunk.text.clone(),
      embedding: embedding.to_vec(),
      indexed_at: chrono::Utc::now().to_rfc3339(),
    }
  }
}

/// Result of a chunk similarity search
#[derive(Debug, Clone)]
pub struct ChunkMatch {
  pub product: Product,
  pub similarity: f32,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_round_trips_product_fields() {
    let product = Product {
      sku: "A1".to_string(),
      name: "Monitor".to_string(),
      description: "A display".to_string(),
      features: vec!["HDR10".to_string()],
      price: Some(399.99),
      categories: vec!["monitors".to_string()],
      in_stock: Some(true),
    };
    let chunk = ProductChunk::from_product(product);

    let record = ChunkRecord::from_chunk(&chunk, &[0.1, 0.2]);

    assert_eq!(record.sku, "A1");
    assert_eq!(record.features, r#"["HDR10"]"#);
    assert_eq!(record.price, Some(399.99));
    assert_eq!(record.embedding, vec![0.1, 0.2]);
    assert_eq!(record.chunk_text, chunk.text);
  }
}

//! Product entity and its retrievable chunk representation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One catalog entry. Immutable once loaded; re-ingestion replaces the
/// indexed chunk for the same sku rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Product {
  /// Unique identifier across the catalog
  pub sku: String,

  /// Display name
  pub name: String,

  /// Free-text description
  pub description: String,

  /// Ordered list of short feature bullets
  pub features: Vec<String>,

  /// Resolved price; absent when the source row had no parseable price
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,

  /// Category labels
  pub categories: Vec<String>,

  /// Stock availability when the source row carried it
  #[serde(skip_serializing_if = "Option::is_none")]
  pub in_stock: Option<bool>,
}

impl Product {
  /// Build the single retrievable text blob for this product.
  ///
  /// Shape: `name. description. Features: a; b; c` - absent pieces are
  /// omitted entirely, never rendered as a literal placeholder.
  pub fn chunk_text(&self) -> String {
    let mut parts: Vec<String> = Vec::new();

    let name = self.name.trim();
    if !name.is_empty() {
      parts.push(name.to_string());
    }

    let description = self.description.trim();
    if !description.is_empty() {
      parts.push(description.to_string());
    }

    let features: Vec<&str> =
      self.features.iter().map(|f| f.trim()).filter(|f| !f.is_empty()).collect();
    if !features.is_empty() {
      parts.push(format!("Features: {}", features.join("; ")));
    }

    parts.join(". ")
  }
}

/// The retrievable unit: one chunk per product, identified by the product's
/// sku, carrying the full metadata payload so search results can be
/// displayed without a second lookup.
#[derive(Debug, Clone)]
pub struct ProductChunk {
  pub product: Product,
  pub text: String,
}

impl ProductChunk {
  pub fn from_product(product: Product) -> Self {
    let text = product.chunk_text();
    Self { product, text }
  }
}

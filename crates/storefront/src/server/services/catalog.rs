//! Catalog loading and row validation
//!
//! Reads the tabular product dataset into normalized [`Product`] entities.
//! Row policy: a missing or empty sku drops the row with a warning; an
//! unparseable price becomes an absent price with a warning, never a silent
//! zero; malformed JSON list columns become empty lists with a warning.
//! Only an unreadable source is fatal.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::server::models::product::Product;

/// Raw CSV row as it appears in the dataset. List-valued columns arrive as
/// JSON-encoded strings; prices arrive as free-form text.
#[derive(Debug, Deserialize)]
struct CatalogRow {
  #[serde(default)]
  sku: String,
  #[serde(default)]
  name: String,
  #[serde(default)]
  description: String,
  #[serde(default)]
  category: String,
  #[serde(default)]
  bullet_features: String,
  #[serde(default)]
  msrp: String,
  #[serde(default)]
  final_price: String,
  #[serde(default)]
  in_stock: String,
}

/// Load the catalog from a CSV file. Returns the valid products in source
/// order; invalid rows are dropped with warnings. Fails only if the source
/// cannot be opened or read.
pub fn load_catalog(path: &Path) -> Result<Vec<Product>> {
  let mut reader = csv::Reader::from_path(path)
    .with_context(|| format!("Failed to open catalog dataset at {}", path.display()))?;

  let mut products = Vec::new();
  let mut dropped = 0usize;

  for (index, row_result) in reader.deserialize::<CatalogRow>().enumerate() {
    let line = index + 2; // header is line 1
    let row = match row_result {
      Ok(row) => row,
      Err(e) => {
        marlowe::warn!(&format!("Dropping malformed catalog row at line {line}: {e}"));
        dropped += 1;
        continue;
      }
    };

    match parse_row(row, line) {
      Some(product) => products.push(product),
      None => dropped += 1,
    }
  }

  if dropped > 0 {
    marlowe::warn!(&format!("Dropped {dropped} invalid catalog rows"));
  }
  marlowe::info!(&format!("Loaded {} products from {}", products.len(), path.display()));

  Ok(products)
}

/// Validate and normalize a single row. `None` means the row was dropped.
fn parse_row(row: CatalogRow, line: usize) -> Option<Product> {
  let sku = row.sku.trim();
  if sku.is_empty() {
    marlowe::warn!(&format!("Dropping catalog row at line {line}: missing sku"));
    return None;
  }

  let features = parse_feature_list(&row.bullet_features, sku);
  let categories = parse_string_list(&row.category, sku, "category");

  // final_price wins over msrp when both are present
  let price = parse_price(&row.final_price, sku, "final_price")
    .or_else(|| parse_price(&row.msrp, sku, "msrp"));

  Some(Product {
    sku: sku.to_string(),
    name: row.name.trim().to_string(),
    description: row.description.trim().to_string(),
    features,
    price,
    categories,
    in_stock: parse_availability(&row.in_stock),
  })
}

/// Parse a JSON-encoded list of strings, tolerating malformed input
fn parse_string_list(raw: &str, sku: &str, column: &str) -> Vec<String> {
  if raw.trim().is_empty() {
    return Vec::new();
  }

  match serde_json::from_str::<Vec<String>>(raw) {
    Ok(values) => values,
    Err(_) => {
      marlowe::warn!(&format!("Unparseable {column} column for sku {sku}, treating as empty"));
      Vec::new()
    }
  }
}

/// Feature bullets appear either as plain strings or as objects carrying a
/// `bullet_feature` field, depending on the export that produced the file
fn parse_feature_list(raw: &str, sku: &str) -> Vec<String> {
  if raw.trim().is_empty() {
    return Vec::new();
  }

  let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) else {
    marlowe::warn!(&format!("Unparseable bullet_features column for sku {sku}, treating as empty"));
    return Vec::new();
  };

  values
    .into_iter()
    .filter_map(|value| match value {
      serde_json::Value::String(s) => Some(s),
      serde_json::Value::Object(map) => {
        map.get("bullet_feature").and_then(|v| v.as_str()).map(|s| s.to_string())
      }
      _ => None,
    })
    .collect()
}

/// Parse a price column. Empty is a legitimate absence; anything non-empty
/// that fails to parse (or is negative) is surfaced with a warning and
/// treated as absent rather than coerced.
fn parse_price(raw: &str, sku: &str, column: &str) -> Option<f64> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  match trimmed.parse::<f64>() {
    Ok(value) if value >= 0.0 => Some(value),
    Ok(value) => {
      marlowe::warn!(&format!("Negative {column} {value} for sku {sku}, treating as absent"));
      None
    }
    Err(_) => {
      marlowe::warn!(&format!("Unparseable {column} '{trimmed}' for sku {sku}, treating as absent"));
      None
    }
  }
}

fn parse_availability(raw: &str) -> Option<bool> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  Some(matches!(trimmed.to_uppercase().as_str(), "Y" | "YES" | "TRUE" | "1"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  const HEADER: &str = "sku,name,description,category,bullet_features,msrp,final_price,in_stock";

  fn write_catalog(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
      writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
  }

  #[test]
  fn test_load_valid_rows() {
    let file = write_catalog(&[
      r#"A1,UltraWide Monitor,34-inch curved display,"[""monitors""]","[""3440x1440""]",449.99,399.99,Y"#,
      r#"B2,Office Chair,Ergonomic task chair,"[""furniture""]","[""lumbar support""]",299.00,249.00,N"#,
    ]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].sku, "A1");
    assert_eq!(products[0].price, Some(399.99));
    assert_eq!(products[0].in_stock, Some(true));
    assert_eq!(products[1].categories, vec!["furniture".to_string()]);
    assert_eq!(products[1].in_stock, Some(false));
  }

  #[test]
  fn test_missing_sku_drops_row() {
    let file = write_catalog(&[
      r#",No Sku Product,desc,"[]","[]",10.0,9.0,Y"#,
      r#"C3,Kept Product,desc,"[]","[]",10.0,9.0,Y"#,
    ]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].sku, "C3");
  }

  #[test]
  fn test_unparseable_price_becomes_absent() {
    let file = write_catalog(&[r#"D4,Widget,desc,"[]","[]",call us,,Y"#]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].price, None);
  }

  #[test]
  fn test_final_price_wins_over_msrp() {
    let file = write_catalog(&[r#"E5,Widget,desc,"[]","[]",100.0,80.0,Y"#]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products[0].price, Some(80.0));
  }

  #[test]
  fn test_msrp_fallback_when_final_price_missing() {
    let file = write_catalog(&[r#"F6,Widget,desc,"[]","[]",100.0,,Y"#]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products[0].price, Some(100.0));
  }

  #[test]
  fn test_negative_price_is_absent() {
    let file = write_catalog(&[r#"G7,Widget,desc,"[]","[]",,-5.0,Y"#]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products[0].price, None);
  }

  #[test]
  fn test_feature_objects_and_strings() {
    let file = write_catalog(&[
      r#"H8,Widget,desc,"[]","[{""bullet_feature"": ""fast""}, ""light""]",,10.0,Y"#,
    ]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products[0].features, vec!["fast".to_string(), "light".to_string()]);
  }

  #[test]
  fn test_malformed_json_columns_become_empty() {
    let file = write_catalog(&[r#"I9,Widget,desc,not-json,also-not-json,,10.0,"#]);

    let products = load_catalog(file.path()).unwrap();
    assert_eq!(products.len(), 1);
    assert!(products[0].features.is_empty());
    assert!(products[0].categories.is_empty());
    assert_eq!(products[0].in_stock, None);
  }

  #[test]
  fn test_unreadable_source_is_fatal() {
    let result = load_catalog(Path::new("/definitely/not/a/real/catalog.csv"));
    assert!(result.is_err());
  }

  #[test]
  fn test_rereading_is_idempotent() {
    let file = write_catalog(&[
      r#"A1,Monitor,desc,"[]","[]",,399.99,Y"#,
      r#"B2,Chair,desc,"[]","[]",,249.00,Y"#,
    ]);

    let first = load_catalog(file.path()).unwrap();
    let second = load_catalog(file.path()).unwrap();
    assert_eq!(first, second);
  }
}

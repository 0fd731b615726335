//! Vector search operations and result processing for LanceDB

use anyhow::{anyhow, Result};
use arrow::array::{Array, BooleanArray, Float32Array, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use futures::stream::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use super::models::ChunkMatch;
use crate::server::models::product::Product;

/// Perform a nearest-neighbor search and return processed matches,
/// closest first
pub async fn search_similar_chunks(
  table: &Table,
  query_embedding: &[f32],
  k: usize,
) -> Result<Vec<ChunkMatch>> {
  let mut results_stream = table
    .vector_search(query_embedding)?
    .distance_type(DistanceType::Cosine)
    .column("embedding")
    .limit(k)
    .execute()
    .await
    .map_err(|e| anyhow!("Vector search failed: {}", e))?;

  let mut matches = Vec::new();
  while let Some(batch_result) = results_stream.next().await {
    let batch = batch_result.map_err(|e| anyhow!("Error reading batch: {}", e))?;
    matches.extend(process_result_batch(&batch)?);
  }

  if matches.is_empty() {
    marlowe::verbose!("No similar chunks found");
  }
  Ok(matches)
}

fn process_result_batch(batch: &RecordBatch) -> Result<Vec<ChunkMatch>> {
  let columns = extract_column_arrays(batch)?;
  let mut batch_matches = Vec::new();

  for i in 0..batch.num_rows() {
    let distance = extract_distance(columns.distance_array, i);
    let similarity = convert_distance_to_similarity(distance);
    batch_matches.push(create_match(&columns, i, similarity));
  }

  Ok(batch_matches)
}

/// Container for all column arrays extracted from a batch
struct BatchColumnArrays<'a> {
  sku_array: &'a StringArray,
  name_array: &'a StringArray,
  description_array: &'a StringArray,
  features_array: &'a StringArray,
  categories_array: &'a StringArray,
  price_array: Option<&'a Float64Array>,
  in_stock_array: Option<&'a BooleanArray>,
  distance_array: Option<&'a Float32Array>,
}

fn extract_column_arrays(batch: &RecordBatch) -> Result<BatchColumnArrays<'_>> {
  Ok(BatchColumnArrays {
    sku_array: extract_string_column(batch, "sku")?,
    name_array: extract_string_column(batch, "name")?,
    description_array: extract_string_column(batch, "description")?,
    features_array: extract_string_column(batch, "features")?,
    categories_array: extract_string_column(batch, "categories")?,
    price_array: batch
      .column_by_name("price")
      .and_then(|col| col.as_any().downcast_ref::<Float64Array>()),
    in_stock_array: batch
      .column_by_name("in_stock")
      .and_then(|col| col.as_any().downcast_ref::<BooleanArray>()),
    distance_array: batch
      .column_by_name("_distance")
      .and_then(|col| col.as_any().downcast_ref::<Float32Array>()),
  })
}

fn extract_string_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a StringArray> {
  batch
    .column_by_name(column_name)
    .ok_or_else(|| anyhow!("Missing '{}' column", column_name))?
    .as_any()
    .downcast_ref::<StringArray>()
    .ok_or_else(|| anyhow!("Failed to cast '{}' column to StringArray", column_name))
}

fn extract_distance(distance_array: Option<&Float32Array>, row_index: usize) -> f32 {
  const DEFAULT_DISTANCE: f32 = 2.0; // worst case when the engine omits it

  match distance_array {
    Some(array) if row_index < array.len() && !array.is_null(row_index) => array.value(row_index),
    _ => DEFAULT_DISTANCE,
  }
}

/// Convert cosine distance to a similarity score.
///
/// Cosine distance over unit-normalized vectors lies in [0, 2]; the linear
/// transform `(2 - d) / 2` maps it monotonically onto [0, 1], with 1 for
/// identical direction and 0 for opposite direction.
pub fn convert_distance_to_similarity(distance: f32) -> f32 {
  (2.0 - distance.clamp(0.0, 2.0)) / 2.0
}

fn create_match(columns: &BatchColumnArrays<'_>, row_index: usize, similarity: f32) -> ChunkMatch {
  let features =
    serde_json::from_str(columns.features_array.value(row_index)).unwrap_or_default();
  let categories =
    serde_json::from_str(columns.categories_array.value(row_index)).unwrap_or_default();

  let price = columns
    .price_array
    .filter(|array| !array.is_null(row_index))
    .map(|array| array.value(row_index));
  let in_stock = columns
    .in_stock_array
    .filter(|array| !array.is_null(row_index))
    .map(|array| array.value(row_index));

  ChunkMatch {
    product: Product {
      sku: columns.sku_array.value(row_index).to_string(),
      name: columns.name_array.value(row_index).to_string(),
      description: columns.description_array.value(row_index).to_string(),
      features,
      price,
      categories,
      in_stock,
    },
    similarity,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_similarity_bounds() {
    assert_eq!(convert_distance_to_similarity(0.0), 1.0);
    assert_eq!(convert_distance_to_similarity(2.0), 0.0);
    assert_eq!(convert_distance_to_similarity(1.0), 0.5);
  }

  #[test]
  fn test_similarity_clamps_out_of_range_distances() {
    assert_eq!(convert_distance_to_similarity(-0.5), 1.0);
    assert_eq!(convert_distance_to_similarity(3.0), 0.0);
  }

  #[test]
  fn test_similarity_is_monotonic() {
    let distances = [0.0f32, 0.3, 0.7, 1.2, 1.9, 2.0];
    let scores: Vec<f32> = distances.iter().map(|&d| convert_distance_to_similarity(d)).collect();

    for pair in scores.windows(2) {
      assert!(pair[0] >= pair[1], "similarity must not increase with distance");
    }
  }
}

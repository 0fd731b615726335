//! Arrow RecordBatch conversion utilities for LanceDB

use anyhow::{anyhow, Result};
use arrow::array::{Array, BooleanArray, Float32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use super::models::ChunkRecord;

/// Convert chunk records to an Arrow RecordBatch with the given embedding
/// column width
pub fn records_to_arrow_batch(
  records: Vec<ChunkRecord>,
  embedding_dimension: usize,
) -> Result<RecordBatch> {
  if records.is_empty() {
    return Err(anyhow!("Cannot create RecordBatch from empty records"));
  }

  let schema = create_chunk_record_schema(embedding_dimension);
  let columns = create_column_arrays(&records, embedding_dimension);

  RecordBatch::try_new(schema, columns).map_err(|e| anyhow!("Failed to create RecordBatch: {}", e))
}

/// Arrow schema for a stored chunk. Price and stock status are genuinely
/// optional in the catalog, so those columns are nullable.
pub fn create_chunk_record_schema(embedding_dimension: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("sku", DataType::Utf8, false),
    Field::new("name", DataType::Utf8, false),
    Field::new("description", DataType::Utf8, false),
    Field::new("features", DataType::Utf8, false),
    Field::new("categories", DataType::Utf8, false),
    Field::new("price", DataType::Float64, true),
    Field::new("in_stock", DataType::Boolean, true),
    Field::new("chunk_text", DataType::Utf8, false),
    Field::new(
      "embedding",
      DataType::FixedSizeList(
        Arc::new(Field::new("item", DataType::Float32, true)),
        embedding_dimension as i32,
      ),
      false,
    ),
    Field::new("indexed_at", DataType::Utf8, false),
  ]))
}

fn create_column_arrays(
  records: &[ChunkRecord],
  embedding_dimension: usize,
) -> Vec<Arc<dyn Array>> {
  vec![
    Arc::new(string_column(records, |r| &r.sku)),
    Arc::new(string_column(records, |r| &r.name)),
    Arc::new(string_column(records, |r| &r.description)),
    Arc::new(string_column(records, |r| &r.features)),
    Arc::new(string_column(records, |r| &r.categories)),
    Arc::new(Float64Array::from(records.iter().map(|r| r.price).collect::<Vec<_>>())),
    Arc::new(BooleanArray::from(records.iter().map(|r| r.in_stock).collect::<Vec<_>>())),
    Arc::new(string_column(records, |r| &r.chunk_text)),
    Arc::new(embedding_column(records, embedding_dimension)),
    Arc::new(string_column(records, |r| &r.indexed_at)),
  ]
}

fn string_column<F>(records: &[ChunkRecord], field_fn: F) -> StringArray
where
  F: Fn(&ChunkRecord) -> &str,
{
  let values: Vec<Option<&str>> = records.iter().map(|r| Some(field_fn(r))).collect();
  StringArray::from(values)
}

fn embedding_column(
  records: &[ChunkRecord],
  embedding_dimension: usize,
) -> arrow::array::FixedSizeListArray {
  use arrow::array::FixedSizeListBuilder;

  let mut builder = FixedSizeListBuilder::new(
    Float32Array::builder(embedding_dimension * records.len()),
    embedding_dimension as i32,
  );

  for record in records {
    for &value in &record.embedding {
      builder.values().append_value(value);
    }
    builder.append(true);
  }

  builder.finish()
}

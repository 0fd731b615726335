//! Table management operations for LanceDB

use anyhow::{anyhow, Result};
use arrow::record_batch::RecordBatchIterator;
use lancedb::{Connection, Table};

use super::models::ChunkRecord;
use super::records::records_to_arrow_batch;

/// Table manager for LanceDB operations
pub struct TableManager {
  connection: Connection,
  table_name: String,
}

impl TableManager {
  pub fn new(connection: Connection, table_name: String) -> Self {
    Self { connection, table_name }
  }

  /// Check if the target table exists
  pub async fn table_exists(&self) -> Result<bool> {
    let tables = self
      .connection
      .table_names()
      .execute()
      .await
      .map_err(|e| anyhow!("Failed to list tables: {}", e))?;
    Ok(tables.contains(&self.table_name))
  }

  /// Get the table instance
  pub async fn get_table(&self) -> Result<Table> {
    self
      .connection
      .open_table(&self.table_name)
      .execute()
      .await
      .map_err(|e| anyhow!("Failed to open table '{}': {}", self.table_name, e))
  }

  /// Create a new table seeded with the first record
  pub async fn create_table_with_first_record(
    &self,
    record: &ChunkRecord,
    embedding_dimension: usize,
  ) -> Result<()> {
    let batch = records_to_arrow_batch(vec![record.clone()], embedding_dimension)?;
    let schema = batch.schema();
    let batch_iter = RecordBatchIterator::new(vec![Ok(batch)], schema);

    self
      .connection
      .create_table(&self.table_name, batch_iter)
      .execute()
      .await
      .map_err(|e| anyhow!("Failed to create table with first record: {}", e))?;

    marlowe::info!(&format!(
      "Created table '{}' with first chunk for sku {}",
      self.table_name, record.sku
    ));
    Ok(())
  }

  /// Add a record to the existing table
  pub async fn add_record(&self, record: &ChunkRecord, embedding_dimension: usize) -> Result<()> {
    let batch = records_to_arrow_batch(vec![record.clone()], embedding_dimension)?;
    let schema = batch.schema();
    let batch_iter = RecordBatchIterator::new(vec![Ok(batch)], schema);

    let table = self.get_table().await?;
    table
      .add(batch_iter)
      .execute()
      .await
      .map_err(|e| anyhow!("Failed to store chunk: {}", e))?;

    Ok(())
  }

  /// Delete any stored chunk for the given sku
  pub async fn delete_sku(&self, sku: &str) -> Result<()> {
    let table = self.get_table().await?;

    // Sku is the chunk identity; escape quotes for the filter expression
    let escaped = sku.replace('\'', "''");
    table
      .delete(&format!("sku = '{escaped}'"))
      .await
      .map_err(|e| anyhow!("Failed to delete chunk for sku {sku}: {}", e))?;

    Ok(())
  }

  /// Count stored chunks
  pub async fn count_rows(&self) -> Result<usize> {
    let table = self.get_table().await?;
    let count = table.count_rows(None).await?;
    Ok(count)
  }
}

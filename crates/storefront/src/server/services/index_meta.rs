//! Index metadata sidecar
//!
//! The vector index is only meaningful together with the embedding model
//! that produced it; distances between vectors from different models are
//! nonsense. A small JSON file next to the index records the producing
//! model's identity and dimension so startup can refuse a mismatch instead
//! of serving bad similarity scores.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const META_FILE: &str = "index_meta.json";

/// Identity of the index as persisted on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
  /// Identifier of the embedding model that produced every stored vector
  pub embedding_model: String,
  /// Output dimension of that model
  pub dimension: usize,
  /// Distance metric the index is queried with
  pub distance: String,
  /// When the index was last (re)built
  pub built_at: String,
}

impl IndexMeta {
  pub fn new(embedding_model: &str, dimension: usize) -> Self {
    Self {
      embedding_model: embedding_model.to_string(),
      dimension,
      distance: "cosine".to_string(),
      built_at: chrono::Utc::now().to_rfc3339(),
    }
  }
}

fn meta_path(index_dir: &Path) -> PathBuf {
  index_dir.join(META_FILE)
}

/// Read the metadata sidecar if one exists
pub fn load_meta(index_dir: &Path) -> Result<Option<IndexMeta>> {
  let path = meta_path(index_dir);
  if !path.exists() {
    return Ok(None);
  }

  let raw = std::fs::read_to_string(&path)
    .with_context(|| format!("Failed to read index metadata at {}", path.display()))?;
  let meta = serde_json::from_str(&raw)
    .with_context(|| format!("Malformed index metadata at {}", path.display()))?;
  Ok(Some(meta))
}

/// Write the metadata sidecar, creating the index directory if needed
pub fn write_meta(index_dir: &Path, meta: &IndexMeta) -> Result<()> {
  std::fs::create_dir_all(index_dir)
    .with_context(|| format!("Failed to create index directory {}", index_dir.display()))?;

  let path = meta_path(index_dir);
  let raw = serde_json::to_string_pretty(meta)?;
  std::fs::write(&path, raw)
    .with_context(|| format!("Failed to write index metadata at {}", path.display()))?;
  Ok(())
}

/// Validate that the persisted index was built with the configured model.
/// A mismatch is fatal; an index without metadata gets a warning (it may
/// predate the sidecar) and is otherwise trusted.
pub fn validate_model_identity(index_dir: &Path, configured_model: &str) -> Result<()> {
  match load_meta(index_dir)? {
    Some(meta) if meta.embedding_model == configured_model => Ok(()),
    Some(meta) => Err(anyhow!(
      "Vector index at {} was built with embedding model '{}' but the service is configured \
       for '{}'; rebuild the index or fix the configuration",
      index_dir.display(),
      meta.embedding_model,
      configured_model
    )),
    None => {
      if index_dir.exists() {
        marlowe::warn!(&format!(
          "Vector index at {} has no model metadata; assuming it matches '{configured_model}'",
          index_dir.display()
        ));
      }
      Ok(())
    }
  }
}

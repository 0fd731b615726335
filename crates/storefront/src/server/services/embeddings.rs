//! Neural embedding generation for catalog chunks and queries
//!
//! One fixed sentence-transformer model produces every vector the service
//! compares. The model is loaded lazily into a process-wide singleton; a
//! later request for a different model identifier is refused, because
//! vectors from different models live in incompatible spaces.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

#[cfg(feature = "ml-features")]
use hf_hub::api::tokio::Api;
#[cfg(feature = "ml-features")]
use ndarray::Array2;
#[cfg(feature = "ml-features")]
use ort::{
  execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch},
  session::Session,
  value::Value,
};
#[cfg(feature = "ml-features")]
use std::collections::HashMap;
#[cfg(feature = "ml-features")]
use std::sync::Mutex;
#[cfg(feature = "ml-features")]
use tokenizers::Tokenizer;

#[cfg(feature = "ml-features")]
const TOKENIZER_FILE: &str = "tokenizer.json";
#[cfg(feature = "ml-features")]
const MODEL_FILE: &str = "onnx/model.onnx";

/// Embedding capability consumed by the retriever and indexer. The
/// production implementation drives the singleton model; tests inject
/// deterministic substitutes.
#[async_trait]
pub trait Embedder: Send + Sync {
  /// Identifier of the model every vector comes from
  fn model_id(&self) -> &str;

  /// Embed a search query
  async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

  /// Embed a catalog document chunk
  async fn embed_document(&self, text: &str) -> Result<Vec<f32>>;
}

/// Production embedder backed by the process-wide model singleton
pub struct ModelEmbedder {
  model_id: String,
}

impl ModelEmbedder {
  pub fn new(model_id: &str) -> Self {
    Self { model_id: model_id.to_string() }
  }
}

#[async_trait]
impl Embedder for ModelEmbedder {
  fn model_id(&self) -> &str {
    &self.model_id
  }

  async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
    create_query_embedding(&self.model_id, text).await
  }

  async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
    create_document_embedding(&self.model_id, text).await
  }
}

/// Declared output dimension for the models this service knows how to pin.
/// An unknown model is still usable; its dimension is taken from a probe
/// embedding instead of being cross-checked.
pub fn declared_dimension(model_id: &str) -> Option<usize> {
  if model_id.ends_with("all-MiniLM-L6-v2") || model_id.ends_with("all-MiniLM-L12-v2") {
    Some(384)
  } else if model_id.ends_with("all-mpnet-base-v2") || model_id.ends_with("gte-base-en-v1.5") {
    Some(768)
  } else {
    None
  }
}

/// Mean pooling over the sequence dimension of a `[batch, seq, hidden]`
/// tensor, producing one sentence vector
pub fn mean_pool(shape: &[i64], data: &[f32]) -> Result<Vec<f32>> {
  if shape.len() != 3 {
    return Err(anyhow!("Expected a rank-3 hidden state tensor, got shape {shape:?}"));
  }

  let seq_length = shape[1] as usize;
  let hidden_size = shape[2] as usize;

  if seq_length == 0 {
    return Err(anyhow!("Cannot pool an empty token sequence"));
  }

  let mut embedding = vec![0.0f32; hidden_size];
  for token_idx in 0..seq_length {
    let start = token_idx * hidden_size;
    let end = start + hidden_size;
    for (i, &value) in data[start..end].iter().enumerate() {
      embedding[i] += value;
    }
  }

  for value in embedding.iter_mut() {
    *value /= seq_length as f32;
  }

  Ok(embedding)
}

/// Normalize an embedding to unit length so distance comparisons stay
/// consistent across vectors
pub fn normalize_embedding(mut embedding: Vec<f32>) -> Vec<f32> {
  let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

  if magnitude < f32::EPSILON {
    marlowe::warn!("Zero-magnitude embedding detected - returning unchanged");
    return embedding;
  }

  for value in embedding.iter_mut() {
    *value /= magnitude;
  }

  embedding
}

// Trait seams for testing the tensor plumbing without a real ONNX session
// ========================================================================

#[cfg(feature = "ml-features")]
trait TokenEncoding {
  fn get_ids(&self) -> &[u32];
  fn get_attention_mask(&self) -> &[u32];
  fn get_type_ids(&self) -> &[u32];
}

#[cfg(feature = "ml-features")]
trait SessionInputs {
  fn input_names(&self) -> Vec<String>;
}

#[cfg(feature = "ml-features")]
trait TextTokenizer {
  fn encode_text(&self, text: &str, add_special_tokens: bool) -> Result<Box<dyn TokenizerOutput>>;
}

#[cfg(feature = "ml-features")]
trait TokenizerOutput: std::fmt::Debug + TokenEncoding {}

#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
impl TokenEncoding for tokenizers::Encoding {
  fn get_ids(&self) -> &[u32] {
    self.get_ids()
  }
  fn get_attention_mask(&self) -> &[u32] {
    self.get_attention_mask()
  }
  fn get_type_ids(&self) -> &[u32] {
    self.get_type_ids()
  }
}

#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
impl TokenizerOutput for tokenizers::Encoding {}

#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
impl SessionInputs for Session {
  fn input_names(&self) -> Vec<String> {
    self.inputs.iter().map(|input| input.name.to_string()).collect()
  }
}

#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
impl TextTokenizer for Tokenizer {
  fn encode_text(&self, text: &str, add_special_tokens: bool) -> Result<Box<dyn TokenizerOutput>> {
    let encoding =
      self.encode(text, add_special_tokens).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    Ok(Box::new(encoding))
  }
}

// Model loading and inference
// ===========================

#[cfg(feature = "ml-features")]
pub struct EmbeddingModel {
  session: Session,
  tokenizer: Tokenizer,
  model_id: String,
  dimension: usize,
}

#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
impl EmbeddingModel {
  /// Download and load the model from HuggingFace, then probe its output
  /// dimension. A probe that contradicts the model's declared dimension is
  /// a fatal configuration error.
  pub async fn load(model_id: &str) -> Result<Self> {
    marlowe::info!(&format!("Loading embedding model {model_id}..."));

    let api = Api::new().map_err(|e| anyhow!("HF API initialization failed: {}", e))?;
    let repo = api.model(model_id.to_string());

    let tokenizer_file =
      repo.get(TOKENIZER_FILE).await.map_err(|e| anyhow!("Failed to download tokenizer: {}", e))?;
    let model_path =
      repo.get(MODEL_FILE).await.map_err(|e| anyhow!("Failed to download ONNX model: {}", e))?;

    let tokenizer =
      Tokenizer::from_file(tokenizer_file).map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

    let providers: Vec<ExecutionProviderDispatch> = vec![CPUExecutionProvider::default().into()];
    let session =
      Session::builder()?.with_execution_providers(providers)?.commit_from_file(model_path)?;

    let mut model =
      Self { session, tokenizer, model_id: model_id.to_string(), dimension: 0 };

    // Probe the output dimension and cross-check against the declaration
    let probe = model.embed("dimension probe")?;
    if let Some(declared) = declared_dimension(model_id) {
      if probe.len() != declared {
        return Err(anyhow!(
          "Embedding model {model_id} produced {}-dimensional vectors but declares {declared}; \
           refusing to serve with a misconfigured model",
          probe.len()
        ));
      }
    }
    model.dimension = probe.len();

    marlowe::success!(&format!(
      "Embedding model {model_id} ready ({} dimensions)",
      model.dimension
    ));
    Ok(model)
  }

  /// Generate a unit-normalized embedding for a single text
  pub fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
    let tokens = Self::tokenize(text, &self.tokenizer)?;
    let input = Self::prepare(tokens.as_ref(), &self.session)?;
    let output = self.session.run(input)?;

    let tensor = output
      .get("last_hidden_state")
      .or_else(|| output.get("0"))
      .ok_or_else(|| anyhow!("No output found from model - expected 'last_hidden_state' or '0'"))?;
    let (shape, data) = tensor.try_extract_tensor::<f32>()?;

    let pooled = mean_pool(shape.as_ref(), data)?;
    let embedding = normalize_embedding(pooled);

    if self.dimension != 0 && embedding.len() != self.dimension {
      return Err(anyhow!(
        "Embedding dimension drifted from {} to {} mid-run",
        self.dimension,
        embedding.len()
      ));
    }

    Ok(embedding)
  }

  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn dimension(&self) -> usize {
    self.dimension
  }
}

// Tensor preparation, kept behind trait seams so it stays testable
#[cfg(feature = "ml-features")]
impl EmbeddingModel {
  fn tokenize(text: &str, tokenizer: &dyn TextTokenizer) -> Result<Box<dyn TokenizerOutput>> {
    tokenizer.encode_text(text, true)
  }

  fn prepare(
    tokens: &dyn TokenEncoding,
    session: &dyn SessionInputs,
  ) -> Result<HashMap<String, Value>> {
    let mut input = HashMap::new();
    input.insert("input_ids".to_string(), Self::to_tensor(tokens.get_ids())?);
    input.insert("attention_mask".to_string(), Self::to_tensor(tokens.get_attention_mask())?);

    // Only hand over token type ids when the model asks for them
    let model_input_names = session.input_names();
    if model_input_names.contains(&"token_type_ids".to_string()) {
      input.insert("token_type_ids".to_string(), Self::to_tensor(tokens.get_type_ids())?);
    }

    Ok(input)
  }

  fn to_tensor<T: Copy + Into<i64>>(values: &[T]) -> Result<Value> {
    let seq_len = values.len();
    let as_i64: Vec<i64> = values.iter().map(|&x| x.into()).collect();
    let array: Array2<i64> = Array2::from_shape_vec((1, seq_len), as_i64)?;
    let tensor: Value = Value::from_array(array)?.into();
    Ok(tensor)
  }
}

// Process-wide singleton
// ======================

#[cfg(feature = "ml-features")]
static MODEL: std::sync::OnceLock<Mutex<Option<EmbeddingModel>>> = std::sync::OnceLock::new();

/// Load the model into the singleton (or validate an already-loaded one)
/// and return its output dimension. Requesting a model that differs from
/// the loaded one is refused.
#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
pub async fn ensure_model(model_id: &str) -> Result<usize> {
  let mutex = MODEL.get_or_init(|| Mutex::new(None));

  let loaded = {
    let guard = mutex.lock().map_err(|_| anyhow!("Failed to lock model mutex"))?;
    guard.as_ref().map(|m| (m.model_id().to_string(), m.dimension()))
  };

  if let Some((loaded_id, dimension)) = loaded {
    if loaded_id != model_id {
      return Err(anyhow!(
        "Embedding model already loaded as {loaded_id}; refusing to switch to {model_id}"
      ));
    }
    return Ok(dimension);
  }

  // Load outside the lock so it is not held across await points
  let model = EmbeddingModel::load(model_id).await?;
  let dimension = model.dimension();
  let mut guard = mutex.lock().map_err(|_| anyhow!("Failed to lock model mutex"))?;
  *guard = Some(model);
  Ok(dimension)
}

/// Create a unit-normalized embedding with the singleton model
#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
async fn create_embedding(model_id: &str, text: &str) -> Result<Vec<f32>> {
  ensure_model(model_id).await?;

  let mutex = MODEL.get_or_init(|| Mutex::new(None));
  let mut guard = mutex.lock().map_err(|_| anyhow!("Failed to lock model mutex"))?;
  let model = guard.as_mut().ok_or_else(|| anyhow!("Model not initialized"))?;
  model.embed(text)
}

/// Embed a search query. The pinned sentence-transformer uses a symmetric
/// embedding space, so queries and documents share one formatting.
#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
pub async fn create_query_embedding(model_id: &str, query: &str) -> Result<Vec<f32>> {
  create_embedding(model_id, query).await
}

/// Embed a catalog document chunk
#[cfg(all(feature = "ml-features", not(tarpaulin_include)))]
pub async fn create_document_embedding(model_id: &str, content: &str) -> Result<Vec<f32>> {
  create_embedding(model_id, content).await
}

// No-op functions when ML features are not available
#[cfg(not(feature = "ml-features"))]
pub async fn ensure_model(_model_id: &str) -> Result<usize> {
  Err(anyhow!("ML features not available"))
}

#[cfg(not(feature = "ml-features"))]
pub async fn create_query_embedding(_model_id: &str, _query: &str) -> Result<Vec<f32>> {
  Err(anyhow!("ML features not available"))
}

#[cfg(not(feature = "ml-features"))]
pub async fn create_document_embedding(_model_id: &str, _content: &str) -> Result<Vec<f32>> {
  Err(anyhow!("ML features not available"))
}


#[cfg(all(test, feature = "ml-features"))]
mod tensor_preparation_tests {
  use super::*;

  struct MockTokenEncoding {
    ids: Vec<u32>,
    attention_mask: Vec<u32>,
    type_ids: Vec<u32>,
  }

  impl TokenEncoding for MockTokenEncoding {
    fn get_ids(&self) -> &[u32] {
      &self.ids
    }
    fn get_attention_mask(&self) -> &[u32] {
      &self.attention_mask
    }
    fn get_type_ids(&self) -> &[u32] {
      &self.type_ids
    }
  }

  struct MockSessionInputs {
    input_names: Vec<String>,
  }

  impl SessionInputs for MockSessionInputs {
    fn input_names(&self) -> Vec<String> {
      self.input_names.clone()
    }
  }

  fn encoding() -> MockTokenEncoding {
    MockTokenEncoding {
      ids: vec![101, 7592, 102], // [CLS] hello [SEP]
      attention_mask: vec![1, 1, 1],
      type_ids: vec![0, 0, 0],
    }
  }

  #[test]
  fn test_prepare_includes_token_type_ids_when_expected() {
    let session = MockSessionInputs {
      input_names: vec![
        "input_ids".to_string(),
        "attention_mask".to_string(),
        "token_type_ids".to_string(),
      ],
    };

    let result = EmbeddingModel::prepare(&encoding(), &session).unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.contains_key("input_ids"));
    assert!(result.contains_key("attention_mask"));
    assert!(result.contains_key("token_type_ids"));
  }

  #[test]
  fn test_prepare_omits_token_type_ids_when_not_expected() {
    let session = MockSessionInputs {
      input_names: vec!["input_ids".to_string(), "attention_mask".to_string()],
    };

    let result = EmbeddingModel::prepare(&encoding(), &session).unwrap();

    assert_eq!(result.len(), 2);
    assert!(!result.contains_key("token_type_ids"));
  }

  #[test]
  fn test_prepare_ignores_unknown_input_names() {
    let session = MockSessionInputs {
      input_names: vec![
        "input_ids".to_string(),
        "attention_mask".to_string(),
        "custom_input".to_string(),
      ],
    };

    let result = EmbeddingModel::prepare(&encoding(), &session).unwrap();
    assert_eq!(result.len(), 2);
  }
}

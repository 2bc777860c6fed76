//! Embedding service trait and implementations.
//!
//! - `HashingEmbedding` maps lower-cased word tokens into signed buckets
//!   with FNV-1a (feature hashing). It needs no model files, is fully
//!   deterministic, and gives texts that share words a positive cosine
//!   similarity. It is the default backend and the one tests use.
//! - `OnnxEmbeddingService` runs a sentence-transformer ONNX export (e.g.
//!   all-MiniLM-L6-v2) through ort, tokenizing with the HuggingFace
//!   tokenizers crate.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

use catalog_core::error::CatalogError;

/// Service for generating text embeddings.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector of exactly `dimensions()` floats.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, CatalogError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, which rules out trait
/// objects. This trait boxes the future instead so services can be shared
/// as `Arc<dyn DynEmbeddingService>`. Every `EmbeddingService` gets it via
/// the blanket impl below.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, CatalogError>> + Send + 'a>,
    >;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, CatalogError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Scale `values` to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in values.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - FNV-1a feature hashing
// ---------------------------------------------------------------------------

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Split text into lower-cased alphanumeric tokens.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// Deterministic bag-of-words embedding via signed feature hashing.
///
/// Each token adds ±1 to bucket `fnv1a(token) % dimensions`, the sign coming
/// from the hash's top bit, and the result is L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        if text.trim().is_empty() {
            return Err(CatalogError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        let mut tokens = 0usize;
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(CatalogError::Embedding(format!(
                "No indexable tokens in {:?}",
                text
            )));
        }
        if vector.iter().all(|v| *v == 0.0) {
            // Colliding tokens with opposite signs cancelled out.
            return Err(CatalogError::Embedding(format!(
                "Degenerate embedding for {:?}",
                text
            )));
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - ONNX Runtime inference
// ---------------------------------------------------------------------------

/// Token limit for all-MiniLM-L6-v2; longer descriptions are truncated.
const MAX_SEQUENCE_TOKENS: usize = 256;

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// The model directory must contain `model.onnx` (taking `input_ids`,
/// `attention_mask` and `token_type_ids` as i64 and producing token-level
/// embeddings) and `tokenizer.json`. Token embeddings are mean-pooled over
/// the attention mask and L2-normalised.
#[derive(Clone)]
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load a sentence-transformer model from the given directory.
    pub fn from_directory(model_dir: &Path) -> Result<Self, CatalogError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, CatalogError> {
        for (what, path) in [("ONNX model", model_path), ("Tokenizer", tokenizer_path)] {
            if !path.exists() {
                return Err(CatalogError::Config(format!(
                    "{} not found at {}",
                    what,
                    path.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(|e| CatalogError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| CatalogError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| CatalogError::Embedding(format!("ONNX load model: {}", e)))?;

        // Output is [batch, seq_len, hidden_dim]; fall back to MiniLM's 384.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|d| *d > 0)
            .map(|d| d as usize)
            .unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| CatalogError::Config(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| CatalogError::Config(format!("Tokenizer truncation: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        if text.trim().is_empty() {
            return Err(CatalogError::Embedding("Cannot embed empty text".to_string()));
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| CatalogError::Embedding(format!("Tokenization failed: {}", e)))?;

        let widen = |values: &[u32]| values.iter().map(|&v| v as i64).collect::<Vec<i64>>();
        let input_ids = widen(encoding.get_ids());
        let attention_mask = widen(encoding.get_attention_mask());
        let token_type_ids = widen(encoding.get_type_ids());
        let seq_len = input_ids.len();

        let shape_err =
            |e: ndarray::ShapeError| CatalogError::Embedding(format!("Input shape: {}", e));
        let ids = ndarray::Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?;
        let mask = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(shape_err)?;
        let types =
            ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?;

        let ids_ref = TensorRef::from_array_view(&ids)
            .map_err(|e| CatalogError::Embedding(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask)
            .map_err(|e| CatalogError::Embedding(format!("TensorRef attention_mask: {}", e)))?;
        let types_ref = TensorRef::from_array_view(&types)
            .map_err(|e| CatalogError::Embedding(format!("TensorRef token_type_ids: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| CatalogError::Embedding(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, types_ref])
            .map_err(|e| CatalogError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CatalogError::Embedding(format!("Extract embeddings: {}", e)))?;

        let hidden_dim = match shape.iter().copied().collect::<Vec<i64>>().as_slice() {
            [.., _, last] if *last > 0 => *last as usize,
            other => {
                return Err(CatalogError::Embedding(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };

        let mut pooled = mean_pool(data, &attention_mask, hidden_dim);
        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

/// Average the token rows of `data` whose attention mask is set.
///
/// `data` is `[seq_len * hidden_dim]` row-major.
fn mean_pool(data: &[f32], attention_mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (row, _) in data
        .chunks_exact(hidden_dim)
        .zip(attention_mask)
        .filter(|(_, mask)| **mask > 0)
    {
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
        count += 1.0;
    }

    if count > 0.0 {
        for val in &mut pooled {
            *val /= count;
        }
    }
    pooled
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        // Inference is CPU-bound; keep it off the async workers.
        let service = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || service.embed_sync(&text))
            .await
            .map_err(|e| CatalogError::Embedding(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

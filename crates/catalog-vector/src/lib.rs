//! Catalog Vector crate - embedding, flat vector index, ingestion, and query.
//!
//! Provides an in-memory vector index with cosine or inner-product ranking,
//! an embedding service trait with feature-hashing and ONNX backends, the
//! idempotent ingestion pipeline, the query service, and the JSON catalog
//! loader.

pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod search;
pub mod source;

pub use embedding::{DynEmbeddingService, EmbeddingService, HashingEmbedding, OnnxEmbeddingService};
pub use index::{SearchHit, UpsertOutcome, VectorIndex};
pub use pipeline::{IngestPipeline, IngestReport, IngestResult};
pub use search::{QueryService, SearchOptions};
pub use source::{load_catalog, SourceMapping};

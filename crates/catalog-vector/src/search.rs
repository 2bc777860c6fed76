//! Query service combining query embedding with vector search.
//!
//! QueryService embeds the raw query text with the same embedder used at
//! ingest time, ranks the index against it, and applies the optional payload
//! projection and score cut-off from `SearchOptions`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use catalog_core::error::CatalogError;
use catalog_core::types::SearchResult;

use crate::embedding::DynEmbeddingService;
use crate::index::{SearchHit, VectorIndex};

/// Options for a single search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub k: usize,
    /// Payload fields to return. `None` returns the whole payload.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Drop hits scoring below this value.
    #[serde(default)]
    pub min_score: Option<f64>,
}

impl SearchOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            fields: None,
            min_score: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Query service over a shared index and embedder.
///
/// Uses dynamic dispatch so production code can supply
/// `OnnxEmbeddingService` while tests use `HashingEmbedding`.
pub struct QueryService {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn DynEmbeddingService>,
    timeout: Option<Duration>,
}

impl QueryService {
    /// Create a query service.
    ///
    /// Fails with `DimensionMismatch` if the embedder and index disagree on
    /// the vector dimension.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Result<Self, CatalogError> {
        if embedder.dimensions() != index.dimension() {
            return Err(CatalogError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self {
            index,
            embedder,
            timeout: None,
        })
    }

    /// Bound each query embedding call. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return the `k` records most similar to `text`, best first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>, CatalogError> {
        self.search(text, &SearchOptions::new(k)).await
    }

    /// Search with projection and score cut-off.
    pub async fn search(
        &self,
        text: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, CatalogError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CatalogError::Embedding("Query text is empty".to_string()));
        }

        let vector = self.embed_query(text).await?;
        let hits = self.index.search(&vector, options.k)?;
        debug!(query = %text, k = options.k, hits = hits.len(), "Query ranked");

        Ok(hits
            .into_iter()
            .filter(|hit| options.min_score.map_or(true, |min| hit.score >= min))
            .map(|hit| project(hit, options.fields.as_deref()))
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        let fut = self.embedder.embed_boxed(text);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                CatalogError::Embedding(format!(
                    "Query embedding timed out after {} ms",
                    limit.as_millis()
                ))
            })?,
            None => fut.await,
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

fn project(hit: SearchHit, fields: Option<&[String]>) -> SearchResult {
    let payload = match fields {
        Some(fields) => hit
            .payload
            .into_iter()
            .filter(|(name, _)| fields.contains(name))
            .collect(),
        None => hit.payload,
    };
    SearchResult {
        id: hit.id,
        payload,
        score: hit.score,
    }
}

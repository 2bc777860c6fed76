//! Catalog ingestion pipeline.
//!
//! The IngestPipeline takes a batch of records through validation, the
//! duplicate policy, embedding, optional write-through to the record store,
//! and finally the vector index.
//!
//! Per-record problems (blank text, embedder rejections, wrong vector
//! length) are reported in the batch result and ingestion moves on. A record
//! store failure aborts the batch; records handled before it stay committed.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use catalog_core::error::CatalogError;
use catalog_core::types::{DuplicatePolicy, IngestRecord, Record};
use catalog_storage::RecordRepository;

use crate::embedding::DynEmbeddingService;
use crate::index::{UpsertOutcome, VectorIndex};

/// Outcome of ingesting a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestResult {
    /// The record was new and is now indexed.
    Stored { id: String },
    /// The record replaced an existing one (overwrite policy).
    Replaced { id: String },
    /// The record was left out, e.g. a duplicate id under the skip policy.
    Skipped { id: String, reason: String },
    /// Embedding or validation failed for this record.
    Failed { id: String, error: String },
}

impl IngestResult {
    pub fn id(&self) -> &str {
        match self {
            IngestResult::Stored { id }
            | IngestResult::Replaced { id }
            | IngestResult::Skipped { id, .. }
            | IngestResult::Failed { id, .. } => id,
        }
    }
}

/// Per-record outcomes of one ingest batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub results: Vec<IngestResult>,
}

impl IngestReport {
    pub fn stored(&self) -> usize {
        self.count(|r| matches!(r, IngestResult::Stored { .. }))
    }

    pub fn replaced(&self) -> usize {
        self.count(|r| matches!(r, IngestResult::Replaced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, IngestResult::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, IngestResult::Failed { .. }))
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    fn count(&self, pred: impl Fn(&IngestResult) -> bool) -> usize {
        self.results.iter().filter(|r| pred(r)).count()
    }
}

/// Ingestion pipeline over a shared index and embedder.
pub struct IngestPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn DynEmbeddingService>,
    policy: DuplicatePolicy,
    repository: Option<RecordRepository>,
}

impl IngestPipeline {
    /// Create a pipeline.
    ///
    /// Fails with `DimensionMismatch` if the embedder does not produce
    /// vectors of the index dimension.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn DynEmbeddingService>,
        policy: DuplicatePolicy,
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
            policy,
            repository: None,
        })
    }

    /// Write every stored record through to `repository` before indexing it.
    pub fn with_repository(mut self, repository: RecordRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Load every persisted record into the index.
    ///
    /// Rows whose vector length no longer matches the index are skipped.
    /// Returns the number of records loaded.
    pub fn warm_from_store(&self) -> Result<usize, CatalogError> {
        let Some(repository) = &self.repository else {
            return Ok(0);
        };

        let mut loaded = 0;
        for record in repository.load_all()? {
            let id = record.id.clone();
            match self.index.upsert_record(record) {
                Ok(_) => loaded += 1,
                Err(CatalogError::DimensionMismatch { expected, actual }) => {
                    warn!(id = %id, expected, actual, "Skipping stored record with stale dimension");
                }
                Err(e) => return Err(e),
            }
        }
        info!(count = loaded, "Index warmed from record store");
        Ok(loaded)
    }

    /// Ingest a batch of records in order.
    pub async fn ingest(&self, records: Vec<IngestRecord>) -> Result<IngestReport, CatalogError> {
        let mut report = IngestReport::default();

        for record in records {
            let id = record.id.clone();
            match self.ingest_one(record).await {
                Ok(result) => report.results.push(result),
                Err(e) => {
                    error!(
                        id = %id,
                        committed = report.stored() + report.replaced(),
                        error = %e,
                        "Ingest aborted by record store failure"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            total = report.total(),
            stored = report.stored(),
            replaced = report.replaced(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Ingest batch complete"
        );
        Ok(report)
    }

    /// Ingest one record. Only record store failures are returned as `Err`.
    pub async fn ingest_one(&self, record: IngestRecord) -> Result<IngestResult, CatalogError> {
        let IngestRecord { id, text, payload } = record;

        if text.trim().is_empty() {
            debug!(id = %id, "Skipping record with empty text");
            return Ok(IngestResult::Skipped {
                id,
                reason: "Empty text".to_string(),
            });
        }

        if self.policy == DuplicatePolicy::Skip && self.index.exists(&id) {
            debug!(id = %id, "Skipping already indexed record");
            return Ok(IngestResult::Skipped {
                id,
                reason: "Already indexed".to_string(),
            });
        }

        let vector = match self.embedder.embed_boxed(&text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(id = %id, error = %e, "Embedding failed");
                return Ok(IngestResult::Failed {
                    id,
                    error: e.to_string(),
                });
            }
        };

        if vector.len() != self.index.dimension() {
            let e = CatalogError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: vector.len(),
            };
            warn!(id = %id, error = %e, "Rejecting record");
            return Ok(IngestResult::Failed {
                id,
                error: e.to_string(),
            });
        }

        let record = Record {
            id,
            payload,
            vector,
            ingested_at: Utc::now(),
        };

        match self.policy {
            DuplicatePolicy::Skip => self.store_if_absent(record),
            DuplicatePolicy::Overwrite => self.store_or_replace(record),
        }
    }

    fn store_if_absent(&self, record: Record) -> Result<IngestResult, CatalogError> {
        let id = record.id.clone();
        if let Some(repository) = &self.repository {
            if !repository.insert_if_absent(&record)? {
                if self.index.exists(&id) {
                    return Ok(already_stored(id));
                }
                // Row the index never loaded, e.g. written at another dimension.
                repository.upsert(&record)?;
            }
        }

        if self
            .index
            .insert_if_absent(record.id, record.vector, record.payload)?
        {
            debug!(id = %id, "Record ingested");
            Ok(IngestResult::Stored { id })
        } else {
            Ok(already_stored(id))
        }
    }

    fn store_or_replace(&self, record: Record) -> Result<IngestResult, CatalogError> {
        if let Some(repository) = &self.repository {
            repository.upsert(&record)?;
        }
        let id = record.id.clone();
        match self.index.upsert_record(record)? {
            UpsertOutcome::Inserted => {
                debug!(id = %id, "Record ingested");
                Ok(IngestResult::Stored { id })
            }
            UpsertOutcome::Replaced => {
                debug!(id = %id, "Record replaced");
                Ok(IngestResult::Replaced { id })
            }
        }
    }

    /// Get a reference to the underlying vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }
}

fn already_stored(id: String) -> IngestResult {
    IngestResult::Skipped {
        id,
        reason: "Already stored".to_string(),
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name to text value mapping carried alongside each vector.
///
/// A `BTreeMap` keeps payload serialization order stable across runs.
pub type Payload = BTreeMap<String, String>;

// =============================================================================
// Enums
// =============================================================================

/// Similarity function used to rank stored vectors against a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Angle between the vectors, magnitude invariant. Range -1.0 to 1.0.
    #[default]
    Cosine,
    /// Raw dot product. Equivalent to cosine for unit vectors.
    InnerProduct,
}

/// What ingestion does when a record id is already in the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first-seen record; the new one is reported as skipped.
    #[default]
    Skip,
    /// Re-embed and replace the stored record.
    Overwrite,
}

// =============================================================================
// Records
// =============================================================================

/// A record as it arrives for ingestion, before embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Unique record identifier (the product id).
    pub id: String,
    /// Text that gets embedded (the product description).
    pub text: String,
    /// Metadata returned with search results.
    #[serde(default)]
    pub payload: Payload,
}

impl IngestRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            payload: Payload::new(),
        }
    }

    /// Attach a payload field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }
}

/// A record stored in the index: id, payload, and its embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub payload: Payload,
    pub vector: Vec<f32>,
    /// When the record was first written.
    pub ingested_at: DateTime<Utc>,
}

/// A single ranked hit returned by a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matching record.
    pub id: String,
    /// Payload of the matching record, possibly projected to a field subset.
    pub payload: Payload,
    /// Similarity to the query under the index metric. Higher is closer.
    pub score: f64,
}

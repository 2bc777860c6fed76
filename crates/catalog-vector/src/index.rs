//! In-memory vector index with brute-force similarity search.
//!
//! Records live in insertion order behind a reader-writer lock: upserts take
//! the write lock, searches share the read lock. Search is a flat O(n·D)
//! scan followed by a stable sort, so equal scores come back in insertion
//! order.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;

use catalog_core::error::CatalogError;
use catalog_core::types::{Payload, Record, SimilarityMetric};

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The id of the matching record.
    pub id: String,
    /// Similarity under the index metric. Higher is closer.
    pub score: f64,
    /// Payload stored with the record.
    pub payload: Payload,
}

/// Whether an upsert created a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug, Default)]
struct IndexInner {
    /// Records in first-insertion order.
    entries: Vec<Record>,
    /// Record id to position in `entries`.
    positions: HashMap<String, usize>,
}

/// Flat vector index of fixed dimension.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: SimilarityMetric,
    inner: RwLock<IndexInner>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` floats.
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            inner: RwLock::new(IndexInner::default()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Insert or replace the record for `id`.
    ///
    /// A replaced record keeps its insertion position and `ingested_at`.
    /// A vector of the wrong length fails with `DimensionMismatch` and
    /// leaves the index unchanged.
    pub fn upsert(
        &self,
        id: impl Into<String>,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<UpsertOutcome, CatalogError> {
        self.upsert_record(Record {
            id: id.into(),
            payload,
            vector,
            ingested_at: Utc::now(),
        })
    }

    /// Insert or replace a fully formed record, e.g. one loaded from storage.
    pub fn upsert_record(&self, record: Record) -> Result<UpsertOutcome, CatalogError> {
        self.check_dimension(record.vector.len())?;
        let mut inner = self.write()?;

        if let Some(&pos) = inner.positions.get(&record.id) {
            let existing = &mut inner.entries[pos];
            existing.vector = record.vector;
            existing.payload = record.payload;
            debug!(id = %existing.id, "Replaced indexed record");
            return Ok(UpsertOutcome::Replaced);
        }

        let pos = inner.entries.len();
        inner.positions.insert(record.id.clone(), pos);
        inner.entries.push(record);
        Ok(UpsertOutcome::Inserted)
    }

    /// Insert the record only if `id` is not yet present.
    ///
    /// The check and the insert happen under one write lock. Returns `true`
    /// when the record was inserted.
    pub fn insert_if_absent(
        &self,
        id: impl Into<String>,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<bool, CatalogError> {
        self.check_dimension(vector.len())?;
        let id = id.into();
        let mut inner = self.write()?;
        if inner.positions.contains_key(&id) {
            return Ok(false);
        }
        let pos = inner.entries.len();
        inner.positions.insert(id.clone(), pos);
        inner.entries.push(Record {
            id,
            payload,
            vector,
            ingested_at: Utc::now(),
        });
        Ok(true)
    }

    /// Return up to `k` hits ordered by decreasing similarity.
    ///
    /// An empty index or `k == 0` yields an empty result, whatever the query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, CatalogError> {
        let inner = self.read()?;
        if k == 0 || inner.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let mut scored: Vec<(usize, f64)> = inner
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, similarity(self.metric, query, &entry.vector)))
            .collect();

        // sort_by is stable: ties keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| {
                let entry = &inner.entries[pos];
                SearchHit {
                    id: entry.id.clone(),
                    score,
                    payload: entry.payload.clone(),
                }
            })
            .collect())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.positions.contains_key(id))
            .unwrap_or(false)
    }

    /// Clone out the stored record for `id`.
    pub fn get(&self, id: &str) -> Option<Record> {
        let inner = self.inner.read().ok()?;
        let pos = *inner.positions.get(id)?;
        Some(inner.entries[pos].clone())
    }

    /// Return the number of records currently stored in the index.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dimension(&self, actual: usize) -> Result<(), CatalogError> {
        if actual != self.dimension {
            return Err(CatalogError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexInner>, CatalogError> {
        self.inner
            .read()
            .map_err(|e| CatalogError::Storage(format!("Index lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexInner>, CatalogError> {
        self.inner
            .write()
            .map_err(|e| CatalogError::Storage(format!("Index lock poisoned: {}", e)))
    }
}

/// Score two equal-length vectors under `metric`.
///
/// NaN scores rank last.
pub fn similarity(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f64 {
    let score = match metric {
        SimilarityMetric::Cosine => cosine_similarity(a, b),
        SimilarityMetric::InnerProduct => inner_product(a, b),
    };
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot = inner_product(a, b);
    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str) -> Payload {
        let mut p = Payload::new();
        p.insert("productName".to_string(), name.to_string());
        p
    }

    fn cosine_index(dimension: usize) -> VectorIndex {
        VectorIndex::new(dimension, SimilarityMetric::Cosine)
    }

    #[test]
    fn test_upsert_and_exists() {
        let index = cosine_index(3);
        let outcome = index.upsert("P1", vec![1.0, 0.0, 0.0], payload("Mouse")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert!(index.exists("P1"));
        assert!(!index.exists("P2"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_search_empty_index() {
        let index = cosine_index(3);
        assert!(index.search(&[1.0, 0.0, 0.0], 10).unwrap().is_empty());
        // Even a malformed query is not an error against an empty index.
        assert!(index.search(&[1.0], 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_k_zero() {
        let index = cosine_index(2);
        index.upsert("a", vec![1.0, 0.0], Payload::new()).unwrap();
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_wrong_dimension_leaves_index_unchanged() {
        let index = cosine_index(3);
        index.upsert("P1", vec![1.0, 0.0, 0.0], payload("Mouse")).unwrap();

        let err = index.upsert("P2", vec![1.0, 0.0], payload("Keyboard")).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));

        // Replacing an existing id with a bad vector is rejected too.
        assert!(index.upsert("P1", vec![0.0; 4], payload("Changed")).is_err());

        assert_eq!(index.len(), 1);
        assert!(!index.exists("P2"));
        let stored = index.get("P1").unwrap();
        assert_eq!(stored.vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(stored.payload["productName"], "Mouse");
    }

    #[test]
    fn test_search_wrong_query_dimension() {
        let index = cosine_index(3);
        index.upsert("P1", vec![1.0, 0.0, 0.0], Payload::new()).unwrap();
        let result = index.search(&[1.0, 0.0], 1);
        assert!(matches!(result, Err(CatalogError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_search_orders_by_increasing_distance() {
        let index = cosine_index(2);
        // Inserted far-to-near so ordering cannot come from insertion order.
        index.upsert("far", vec![0.0, 1.0], Payload::new()).unwrap();
        index.upsert("mid", vec![1.0, 1.0], Payload::new()).unwrap();
        index.upsert("near", vec![1.0, 0.1], Payload::new()).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(hits[0].score > hits[1].score && hits[1].score > hits[2].score);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let index = cosine_index(2);
        for id in ["c", "a", "b"] {
            index.upsert(id, vec![1.0, 0.0], Payload::new()).unwrap();
        }
        let hits = index.search(&[2.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_replace_keeps_insertion_position() {
        let index = cosine_index(2);
        index.upsert("first", vec![0.0, 1.0], Payload::new()).unwrap();
        index.upsert("second", vec![1.0, 0.0], Payload::new()).unwrap();
        let outcome = index.upsert("first", vec![1.0, 0.0], payload("new")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(index.len(), 2);

        // Both now tie; "first" was inserted first.
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[0].payload["productName"], "new");
    }

    #[test]
    fn test_insert_if_absent() {
        let index = cosine_index(2);
        assert!(index.insert_if_absent("P1", vec![1.0, 0.0], payload("A")).unwrap());
        assert!(!index.insert_if_absent("P1", vec![0.0, 1.0], payload("B")).unwrap());
        let stored = index.get("P1").unwrap();
        assert_eq!(stored.vector, vec![1.0, 0.0]);
        assert_eq!(stored.payload["productName"], "A");
    }

    #[test]
    fn test_search_respects_k_limit() {
        let index = cosine_index(4);
        for i in 0..10 {
            index
                .upsert(format!("id-{}", i), vec![1.0, i as f32, 0.0, 0.0], Payload::new())
                .unwrap();
        }
        assert_eq!(index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap().len(), 3);
        assert_eq!(index.search(&[1.0, 0.0, 0.0, 0.0], 50).unwrap().len(), 10);
    }

    #[test]
    fn test_inner_product_metric_prefers_magnitude() {
        let index = VectorIndex::new(2, SimilarityMetric::InnerProduct);
        index.upsert("unit", vec![1.0, 0.0], Payload::new()).unwrap();
        index.upsert("long", vec![3.0, 0.5], Payload::new()).unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "long");
        assert!((hits[0].score - 3.0).abs() < 1e-9);
        assert!((hits[1].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_readers() {
        let index = std::sync::Arc::new(cosine_index(2));
        index.upsert("x", vec![1.0, 0.0], Payload::new()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let index = std::sync::Arc::clone(&index);
                std::thread::spawn(move || index.search(&[1.0, 0.0], 1).unwrap().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0f32; 100];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let mut a = vec![0.0f32; 100];
        let mut b = vec![0.0f32; 100];
        a[0] = 1.0;
        b[1] = 1.0;
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0f32; 10];
        let b = vec![1.0f32; 10];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        assert_eq!(
            similarity(SimilarityMetric::InnerProduct, &[f32::NAN], &[1.0]),
            f64::NEG_INFINITY
        );
    }
}

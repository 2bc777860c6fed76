//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters from the request, calls into the shared
//! services, and returns a JSON response.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::types::{IngestRecord, Payload, SearchResult};
use catalog_vector::{IngestResult, SearchOptions};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter / body types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub k: Option<usize>,
    /// Comma-separated payload fields to return.
    pub fields: Option<String>,
    pub min_score: Option<f64>,
}

/// Request body for POST /ingest.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<IngestRecord>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub index_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub k: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub total: usize,
    pub stored: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<IngestResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub id: String,
    pub payload: Payload,
    pub ingested_at: DateTime<Utc>,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness and index size.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        index_size: state.index.len() as u64,
    })
}

/// GET /search - semantic search over the catalog.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = params
        .q
        .ok_or_else(|| ApiError::BadRequest("Parameter 'q' is required for search".to_string()))?;

    if q.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Parameter 'q' must not be empty".to_string(),
        ));
    }

    let k = state.config.search.clamp_k(params.k);
    let fields = match params.fields.as_deref() {
        Some(list) => parse_fields(list),
        None => state.config.search.fields.clone(),
    };

    let mut options = SearchOptions::new(k);
    if !fields.is_empty() {
        options = options.with_fields(fields);
    }
    if let Some(min_score) = params.min_score {
        options = options.with_min_score(min_score);
    }

    let results = state.query_service.search(&q, &options).await?;

    Ok(Json(SearchResponse {
        query: q,
        k,
        results,
    }))
}

/// POST /ingest - embed and index a batch of records.
pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if body.records.is_empty() {
        return Err(ApiError::BadRequest(
            "'records' must not be empty".to_string(),
        ));
    }

    let report = state.pipeline.ingest(body.records).await?;

    Ok(Json(IngestResponse {
        total: report.total(),
        stored: report.stored(),
        replaced: report.replaced(),
        skipped: report.skipped(),
        failed: report.failed(),
        results: report.results,
    }))
}

/// GET /records/{id} - payload of an indexed record.
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = state
        .index
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Record '{}' not found", id)))?;

    Ok(Json(RecordResponse {
        id: record.id,
        payload: record.payload,
        ingested_at: record.ingested_at,
    }))
}

fn parse_fields(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

//! Application state shared across all route handlers.
//!
//! AppState holds the configuration and the shared index services. It is
//! passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use catalog_core::config::CatalogConfig;
use catalog_vector::{IngestPipeline, QueryService, VectorIndex};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-only after startup.
    pub config: Arc<CatalogConfig>,
    /// Vector index shared by the pipeline and the query service.
    pub index: Arc<VectorIndex>,
    /// Query embedding + ranking.
    pub query_service: Arc<QueryService>,
    /// Ingestion pipeline (embed + duplicate policy + index).
    pub pipeline: Arc<IngestPipeline>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: CatalogConfig, pipeline: IngestPipeline, query_service: QueryService) -> Self {
        Self {
            config: Arc::new(config),
            index: Arc::clone(pipeline.index()),
            query_service: Arc::new(query_service),
            pipeline: Arc::new(pipeline),
            start_time: Instant::now(),
        }
    }
}

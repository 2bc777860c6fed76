//! Catalog application binary - composition root.
//!
//! Ties together all catalog crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Build the embedder and the shared vector index
//! 3. Open the SQLite record store and warm the index from it
//! 4. Ingest the product catalog file
//! 5. Answer a one-shot `--query`, or start the axum REST API server

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use catalog_api::state::AppState;
use catalog_core::config::{expand_home, CatalogConfig, EmbeddingConfig};
use catalog_core::error::CatalogError;
use catalog_storage::{Database, RecordRepository};
use catalog_vector::{
    load_catalog, DynEmbeddingService, HashingEmbedding, IngestPipeline, OnnxEmbeddingService,
    QueryService, SearchOptions, SourceMapping, VectorIndex,
};

use cli::CliArgs;

/// Build the configured embedding backend.
fn build_embedder(
    config: &EmbeddingConfig,
    dimension: usize,
) -> Result<Arc<dyn DynEmbeddingService>, CatalogError> {
    match config.backend.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedding::new(dimension))),
        "onnx" => {
            let dir = config.model_dir.as_deref().ok_or_else(|| {
                CatalogError::Config("embedding.model_dir is required for the onnx backend".to_string())
            })?;
            tracing::info!(model = %config.model_name, dir = %dir, "Loading ONNX embedding model");
            let service = OnnxEmbeddingService::from_directory(&expand_home(dir))?;
            Ok(Arc::new(service))
        }
        other => Err(CatalogError::Config(format!(
            "Unknown embedding backend '{}'. Must be one of: hashing, onnx",
            other
        ))),
    }
}

/// Load the config file if it exists. A missing file means defaults.
fn load_config(path: &Path) -> Result<Option<CatalogConfig>, CatalogError> {
    if path.exists() {
        CatalogConfig::load(path).map(Some)
    } else {
        Ok(None)
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = load_config(&config_file);

    let log_level = args
        .resolve_log_level()
        .or_else(|| {
            loaded
                .as_ref()
                .ok()
                .and_then(|c| c.as_ref())
                .map(|c| c.general.log_level.clone())
        })
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&log_level);

    tracing::info!("Starting catalog v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(Some(config)) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Ok(None) => {
            tracing::info!(path = %config_file.display(), "No config file, using defaults");
            CatalogConfig::default()
        }
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(path) = args.resolve_catalog_path() {
        config.ingest.catalog_path = path;
    }
    config.server.port = args.resolve_port(config.server.port);
    config.validate()?;

    // Embedder and index (single shared instances).
    let embedder = build_embedder(&config.embedding, config.index.dimension)?;
    tracing::info!(
        backend = %config.embedding.backend,
        dimensions = embedder.dimensions(),
        "Embedding service ready"
    );

    let index = Arc::new(VectorIndex::new(config.index.dimension, config.index.metric));

    let mut pipeline = IngestPipeline::new(
        Arc::clone(&index),
        Arc::clone(&embedder),
        config.ingest.duplicate_policy,
    )?;

    // Record store.
    if config.index.persist {
        let db_path = config.data_dir().join("catalog.db");
        let db = Database::new(&db_path)?;
        tracing::info!(path = %db_path.display(), "SQLite record store opened");

        pipeline = pipeline.with_repository(RecordRepository::new(Arc::new(db)));
        pipeline.warm_from_store()?;
    }

    // Catalog file.
    if args.skip_ingest || !config.ingest.load_on_startup {
        tracing::info!("Catalog ingest skipped");
    } else {
        let catalog_path = expand_home(&config.ingest.catalog_path);
        if catalog_path.exists() {
            let records = load_catalog(&catalog_path, &SourceMapping::from(&config.ingest))?;
            let report = pipeline.ingest(records).await?;
            if report.failed() > 0 {
                tracing::warn!(failed = report.failed(), "Some catalog records were not indexed");
            }
        } else {
            tracing::warn!(path = %catalog_path.display(), "Catalog file not found, nothing ingested");
        }
    }
    tracing::info!(records = index.len(), "Index ready");

    let query_service =
        QueryService::new(Arc::clone(&index), embedder)?.with_timeout(config.embedding.timeout());

    // One-shot query.
    if let Some(query) = args.query.as_deref() {
        let mut options = SearchOptions::new(config.search.clamp_k(args.k));
        if !config.search.fields.is_empty() {
            options = options.with_fields(config.search.fields.iter().cloned());
        }
        let results = query_service.search(query, &options).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    // === API server ===

    let state = AppState::new(config, pipeline, query_service);
    catalog_api::serve(state, shutdown_signal()).await?;

    Ok(())
}

//! End-to-end tests over the bundled sample catalog: load, ingest with a
//! record store, query, and restart from the store.

use std::path::PathBuf;
use std::sync::Arc;

use catalog_core::types::{DuplicatePolicy, SimilarityMetric};
use catalog_storage::{Database, RecordRepository};
use catalog_vector::{
    load_catalog, DynEmbeddingService, HashingEmbedding, IngestPipeline, QueryService,
    SearchOptions, SourceMapping, VectorIndex,
};

const DIMS: usize = 384;

fn sample_catalog() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/products.json")
}

fn build(repository: RecordRepository) -> (IngestPipeline, QueryService) {
    let index = Arc::new(VectorIndex::new(DIMS, SimilarityMetric::Cosine));
    let embedder: Arc<dyn DynEmbeddingService> = Arc::new(HashingEmbedding::new(DIMS));
    let pipeline =
        IngestPipeline::new(Arc::clone(&index), Arc::clone(&embedder), DuplicatePolicy::Skip)
            .unwrap()
            .with_repository(repository);
    let service = QueryService::new(index, embedder).unwrap();
    (pipeline, service)
}

#[tokio::test]
async fn test_sample_catalog_end_to_end() {
    let records = load_catalog(&sample_catalog(), &SourceMapping::default()).unwrap();
    assert_eq!(records.len(), 12);

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let repository = RecordRepository::new(Arc::new(Database::new(&db_path).unwrap()));
    let (pipeline, service) = build(repository.clone());

    let report = pipeline.ingest(records.clone()).await.unwrap();
    assert_eq!(report.stored(), 12);
    assert_eq!(repository.count().unwrap(), 12);

    let results = service.query("wireless mouse", 2).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P7"]);

    let projected = service
        .search(
            "coffee mug",
            &SearchOptions::new(1).with_fields(["productName", "description"]),
        )
        .await
        .unwrap();
    assert_eq!(projected[0].id, "P6");
    assert_eq!(projected[0].payload.len(), 2);
    assert_eq!(projected[0].payload["productName"], "Coffee Mug");

    // Loading the same file again changes nothing.
    let again = pipeline.ingest(records).await.unwrap();
    assert_eq!(again.skipped(), 12);
    assert_eq!(pipeline.index().len(), 12);
}

#[tokio::test]
async fn test_restart_restores_index_from_store() {
    let records = load_catalog(&sample_catalog(), &SourceMapping::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");

    let before = {
        let repository = RecordRepository::new(Arc::new(Database::new(&db_path).unwrap()));
        let (pipeline, service) = build(repository);
        pipeline.ingest(records).await.unwrap();
        service.query("bluetooth keyboard", 3).await.unwrap()
    };

    let repository = RecordRepository::new(Arc::new(Database::new(&db_path).unwrap()));
    let (pipeline, service) = build(repository);
    assert_eq!(pipeline.warm_from_store().unwrap(), 12);

    let after = service.query("bluetooth keyboard", 3).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after[0].id, "P2");
}

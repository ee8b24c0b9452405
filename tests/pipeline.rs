use docretrieve::{
    chunking::ChunkStrategy,
    config::{Config, EmbeddingProvider, IndexConfig, IngestionConfig, OllamaConfig},
    embedding::build_embedding_client,
    extraction::ExtractorRegistry,
    processing::{IngestionService, chunk_id},
    qdrant::{DeleteOutcome, DistanceMetric, MetadataFilter, QdrantIndex},
    retry::RetryPolicy,
};
use httpmock::{
    Method::{GET, POST, PUT},
    MockServer,
};
use serde_json::json;
use std::{path::PathBuf, time::Duration};

fn config(ollama_url: String, qdrant_url: String) -> Config {
    Config {
        ingestion: IngestionConfig {
            raw_data_dir: PathBuf::from("data/raw"),
            chunk_strategy: ChunkStrategy::Semantic { max: 1000, min: 500 },
            upsert_batch_size: 100,
            workers: 2,
            ocr_enabled: false,
            ocr_endpoint: None,
            ocr_api_key: None,
            content_preview_chars: 500,
        },
        ollama: OllamaConfig {
            embedding_provider: EmbeddingProvider::Ollama,
            base_url: ollama_url,
            embedding_model: "nomic-embed-text".into(),
            embedding_dimension: 4,
            generation_model: "qwen2.5:14b".into(),
            temperature: 0.7,
            max_tokens: 256,
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(2, Duration::ZERO),
        },
        index: IndexConfig {
            url: qdrant_url,
            api_key: Some("secret".into()),
            collection: "ecowas_docs".into(),
            dimension: 4,
            metric: DistanceMetric::Cosine,
            default_namespace: "ecowas".into(),
        },
    }
}

#[tokio::test]
async fn ingest_search_and_delete_against_mocked_services() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ECOWAS_Mining_Vision_2025.txt");
    std::fs::write(
        &path,
        "Member states harmonise mining codes. Royalties follow a shared schedule. Artisanal miners get licences.",
    )?;
    let source = path.display().to_string();

    let ollama = MockServer::start_async().await;
    let qdrant = MockServer::start_async().await;

    let embeddings = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(200)
                .json_body(json!({"embedding": [0.5, 0.25, 0.75, 1.0]}));
        })
        .await;

    qdrant
        .mock_async(|when, then| {
            when.method(GET).path("/collections/ecowas_docs");
            then.status(404);
        })
        .await;
    let create = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/ecowas_docs")
                .header("api-key", "secret")
                .json_body(json!({"vectors": {"size": 4, "distance": "Cosine"}}));
            then.status(200).json_body(json!({"result": true}));
        })
        .await;
    qdrant
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/ecowas_docs/index");
            then.status(200).json_body(json!({"result": {}}));
        })
        .await;
    let upsert = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/ecowas_docs/points")
                .query_param("wait", "true")
                .json_body_partial(
                    json!({"points": [{
                        "id": chunk_id(&source, 0),
                        "vector": [0.5, 0.25, 0.75, 1.0],
                        "payload": {
                            "source": source,
                            "namespace": "ecowas",
                            "document_type": "policy",
                            "sector": "minerals",
                            "date": "2025",
                            "chunk_index": 0,
                            "total_chunks": 1
                        }
                    }]})
                    .to_string(),
                );
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;
    let query = qdrant
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/ecowas_docs/points/query")
                .json_body_partial(
                    json!({"limit": 3, "filter": {"must": [
                        {"key": "sector", "match": {"value": "minerals"}},
                        {"key": "namespace", "match": {"value": "ecowas"}}
                    ]}})
                    .to_string(),
                );
            then.status(200).json_body(json!({"result": {"points": [{
                "id": chunk_id(&source, 0),
                "score": 0.93,
                "payload": {
                    "source": source,
                    "sector": "minerals",
                    "document_type": "policy",
                    "chunk_index": 0,
                    "total_chunks": 1,
                    "content": "Member states harmonise mining codes."
                }
            }]}}));
        })
        .await;
    let delete = qdrant
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/ecowas_docs/points/delete")
                .json_body(json!({"filter": {"must": [
                    {"key": "source", "match": {"value": source}},
                    {"key": "namespace", "match": {"value": "ecowas"}}
                ]}}));
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;

    let config = config(ollama.base_url(), qdrant.base_url());
    let service = IngestionService::new(
        &config,
        ExtractorRegistry::default(),
        build_embedding_client(&config.ollama)?,
        QdrantIndex::from_config(&config.index)?,
    );
    service.initialize().await?;
    create.assert();

    let outcome = service.ingest_document(&path, None, None).await?;
    assert!(outcome.success, "{outcome:?}");
    assert_eq!((outcome.chunks, outcome.upserted), (1, 1));
    upsert.assert();

    let filter = MetadataFilter::new().equals("sector", "minerals");
    let hits = service
        .search("How are royalties set?", 3, Some(&filter), None)
        .await?;
    query.assert();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata["document_type"], "policy");
    assert_eq!(hits[0].content, "Member states harmonise mining codes.");

    assert_eq!(
        service.delete_document(&path, None).await?,
        DeleteOutcome::Deleted
    );
    delete.assert();

    // One chunk for ingestion plus the query.
    embeddings.assert_hits(2);
    Ok(())
}

#[tokio::test]
async fn embedding_outage_still_indexes_zero_vectors() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("energy_framework.md");
    std::fs::write(&path, "Regional power pools share reserves.")?;

    let ollama = MockServer::start_async().await;
    let qdrant = MockServer::start_async().await;
    let embeddings = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/embeddings");
            then.status(503).body("loading model");
        })
        .await;
    qdrant
        .mock_async(|when, then| {
            when.method(GET).path("/collections/ecowas_docs");
            then.status(200).json_body(json!({
                "result": {"config": {"params": {"vectors": {"size": 4, "distance": "Cosine"}}}}
            }));
        })
        .await;
    qdrant
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/ecowas_docs/index");
            then.status(409);
        })
        .await;
    let upsert = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/ecowas_docs/points")
                .json_body_partial(
                    json!({"points": [{"vector": [0.0, 0.0, 0.0, 0.0]}]}).to_string(),
                );
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;

    let config = config(ollama.base_url(), qdrant.base_url());
    let service = IngestionService::new(
        &config,
        ExtractorRegistry::default(),
        build_embedding_client(&config.ollama)?,
        QdrantIndex::from_config(&config.index)?,
    );
    service.initialize().await?;

    let outcome = service.ingest_document(&path, None, Some("")).await?;
    assert!(outcome.success);
    upsert.assert();
    embeddings.assert_hits(2);
    Ok(())
}

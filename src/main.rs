use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docretrieve::{
    config, embedding::EmbeddingHealth, generation::OllamaGenerationClient, logging,
    processing::IngestionService, qdrant::MetadataFilter,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "docretrieve",
    about = "Ingest documents into a vector index and search them"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every supported document under a directory.
    Ingest {
        /// Directory to scan; defaults to RAW_DATA_DIR.
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Ingest a single document.
    IngestFile {
        path: PathBuf,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Search the index.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Metadata equality condition as key=value; repeatable.
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Delete every chunk of a document.
    Delete {
        path: PathBuf,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Show entry count and dimension.
    Stats {
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Probe the embedding and generation services.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::load().context("failed to load configuration")?;
    let service =
        IngestionService::from_config(&config).context("failed to build ingestion pipeline")?;

    if let Command::Health = cli.command {
        return health(&service, &config).await;
    }
    service
        .initialize()
        .await
        .context("failed to prepare the vector index")?;

    match cli.command {
        Command::Ingest { dir, namespace } => {
            let dir = dir.unwrap_or_else(|| config.ingestion.raw_data_dir.clone());
            let summary = service
                .ingest_directory(&dir, config.ingestion.workers, namespace.as_deref())
                .await
                .with_context(|| format!("failed to ingest {}", dir.display()))?;
            println!(
                "Ingested {}/{} documents: {} chunks, {} upserted",
                summary.succeeded, summary.total, summary.total_chunks, summary.total_upserted
            );
            for (path, reason) in &summary.failures {
                println!("FAILED {}: {reason}", path.display());
            }
        }
        Command::IngestFile { path, namespace } => {
            let outcome = service
                .ingest_document(&path, None, namespace.as_deref())
                .await
                .with_context(|| format!("failed to ingest {}", path.display()))?;
            match outcome.error {
                None => println!(
                    "success: {}/{} chunks upserted",
                    outcome.upserted, outcome.chunks
                ),
                Some(reason) => bail!("{}: {reason}", outcome.source),
            }
        }
        Command::Search {
            query,
            top_k,
            filters,
            namespace,
        } => {
            let filter = MetadataFilter::from_pairs(&filters).map_err(anyhow::Error::msg)?;
            let filter = (!filter.is_empty()).then_some(filter);
            let hits = service
                .search(&query, top_k, filter.as_ref(), namespace.as_deref())
                .await
                .context("search failed")?;
            if hits.is_empty() {
                println!("No matches.");
            }
            for (rank, hit) in hits.iter().enumerate() {
                let source = hit
                    .metadata
                    .get("source")
                    .and_then(|value| value.as_str())
                    .unwrap_or("?");
                println!("{}. [{:.3}] {source}", rank + 1, hit.score);
                println!("   {}", hit.content.replace('\n', " "));
            }
        }
        Command::Delete { path, namespace } => {
            let outcome = service
                .delete_document(&path, namespace.as_deref())
                .await
                .with_context(|| format!("failed to delete {}", path.display()))?;
            println!("{}: {outcome:?}", path.display());
        }
        Command::Stats { namespace } => {
            let stats = service
                .stats(namespace.as_deref())
                .await
                .context("failed to read index stats")?;
            let dimension = stats
                .dimension
                .map(|dimension| dimension.to_string())
                .unwrap_or_else(|| "unknown".into());
            println!(
                "collection={} namespace={:?} entries={} dimension={dimension}",
                stats.collection, stats.namespace, stats.entries
            );
        }
        Command::Health => {}
    }
    Ok(())
}

async fn health(service: &IngestionService, config: &config::Config) -> Result<()> {
    let EmbeddingHealth {
        healthy,
        dimension,
        error,
    } = service.embedding_health().await;
    match error {
        None => println!("embedding: healthy={healthy} dimension={dimension:?}"),
        Some(error) => println!("embedding: unhealthy ({error})"),
    }

    let generation = OllamaGenerationClient::from_config(&config.ollama)
        .context("failed to build generation client")?;
    let reachable = generation.check_health().await;
    println!("generation: model={} reachable={reachable}", generation.model());

    if !(healthy && reachable) {
        bail!("one or more services are unhealthy");
    }
    Ok(())
}

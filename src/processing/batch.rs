//! Directory discovery and batch ingestion.

use futures_util::{StreamExt, TryStreamExt, stream};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{
    service::IngestionService,
    types::{BatchSummary, ProcessingError},
};
use crate::extraction::{ExtractorRegistry, file_format};

/// Supported files under `root`, sorted by path.
pub fn discover_documents(
    root: &Path,
    extractors: &ExtractorRegistry,
) -> Result<Vec<PathBuf>, ProcessingError> {
    if !root.is_dir() {
        return Err(ProcessingError::Discovery {
            path: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(root = %root.display(), error = %error, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && extractors.supports(&file_format(entry.path())) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

impl IngestionService {
    /// Ingest every supported document under `root`.
    ///
    /// Up to `workers` documents run at once. A document's upserts all complete before its
    /// result is recorded, and one document failing never stops the others.
    pub async fn ingest_directory(
        &self,
        root: &Path,
        workers: usize,
        namespace: Option<&str>,
    ) -> Result<BatchSummary, ProcessingError> {
        let paths = discover_documents(root, self.extractors())?;
        tracing::info!(root = %root.display(), documents = paths.len(), workers, "Starting batch ingestion");

        let initial = BatchSummary {
            total: paths.len(),
            ..BatchSummary::default()
        };
        let summary = stream::iter(paths)
            .map(|path| async move {
                let outcome = self.ingest_document(&path, None, namespace).await?;
                Ok::<_, ProcessingError>((path, outcome))
            })
            .buffered(workers.max(1))
            .try_fold(initial, |mut summary, (path, outcome)| async move {
                summary.record(path, &outcome);
                Ok(summary)
            })
            .await?;

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            chunks = summary.total_chunks,
            upserted = summary.total_upserted,
            "Batch ingestion finished"
        );
        Ok(summary)
    }
}

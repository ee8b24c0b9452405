//! Documents, extracted content, and extraction errors.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while turning a file into plain text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No extractor is registered for the file suffix.
    #[error("Unsupported document format: '{extension}'")]
    UnsupportedFormat {
        /// Lowercased suffix (empty when the file has none).
        extension: String,
    },
    /// The path does not point at a readable, non-empty regular file.
    #[error("Invalid document {path}: {reason}")]
    InvalidDocument {
        /// Offending path.
        path: String,
        /// Why the file was rejected.
        reason: String,
    },
    /// Format-specific parsing failed, the file was unreadable, or no encoding decoded it.
    #[error("Failed to extract {path}: {reason}")]
    Failure {
        /// Offending path.
        path: String,
        /// Underlying parser or I/O message.
        reason: String,
    },
}

impl ExtractionError {
    pub(crate) fn failure(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Failure {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// An externally supplied file queued for extraction.
///
/// Built through [`Document::open`], which checks the file exists, is a regular file, and is
/// not empty.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path used as the document identity.
    pub path: PathBuf,
    /// Lowercased file suffix used to pick an extractor.
    pub format: String,
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// Moment the file attributes were read.
    pub read_at: OffsetDateTime,
}

impl Document {
    /// Stat `path` and build a document handle.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let invalid = |reason: &str| ExtractionError::InvalidDocument {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| invalid("file does not exist or cannot be read"))?;
        if !metadata.is_file() {
            return Err(invalid("not a regular file"));
        }
        if metadata.len() == 0 {
            return Err(invalid("file is empty"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            format: file_format(path),
            size_bytes: metadata.len(),
            read_at: OffsetDateTime::now_utc(),
        })
    }

    /// Identity string stored as the `source` of every chunk.
    pub fn source(&self) -> String {
        self.path.display().to_string()
    }

    /// File name component, or the full path when there is none.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source())
    }
}

/// Lowercased extension of `path` without the leading dot.
pub fn file_format(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Source-native metadata; every field is optional and format dependent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NativeMetadata {
    /// Document title.
    pub title: Option<String>,
    /// Author or creator name.
    pub author: Option<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Producing application.
    pub creator: Option<String>,
    /// Creation date as stored in the file.
    pub created: Option<String>,
}

impl NativeMetadata {
    /// Metadata as a JSON map. Missing fields are kept as `null`.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Normalized text plus metadata produced once per document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    /// Sanitized plain text.
    pub text: String,
    /// Metadata read from the file itself.
    pub metadata: NativeMetadata,
}

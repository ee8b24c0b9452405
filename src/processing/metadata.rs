//! Chunk identity and metadata assembly.
//!
//! Document metadata is merged in precedence order, later sources winning:
//! file attributes, then metadata read from the file, then tags guessed from the file name,
//! then caller overrides. Null values are stripped once, right before the entries are upserted.

use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::extraction::{Document, NativeMetadata};

const DOCUMENT_TYPES: [(&str, &[&str]); 3] = [
    ("treaty", &["treaty", "agreement", "convention"]),
    ("policy", &["policy", "strategy", "framework", "vision"]),
    ("study", &["feasibility", "study", "analysis"]),
];

const SECTORS: [(&str, &[&str]); 3] = [
    ("minerals", &["mineral", "mining", "extractive"]),
    ("energy", &["energy", "power", "electricity", "renewable"]),
    ("agriculture", &["agriculture", "agri", "farming"]),
];

/// Tags guessed from a file name. Every field is best effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameTags {
    /// `treaty`, `policy`, or `study`.
    pub document_type: Option<&'static str>,
    /// `minerals`, `energy`, or `agriculture`.
    pub sector: Option<&'static str>,
    /// `YYYY-MM-DD` when present, otherwise the first four-digit run.
    pub date: Option<String>,
}

impl FilenameTags {
    fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("document_type".into(), self.document_type.into());
        map.insert("sector".into(), self.sector.into());
        map.insert("date".into(), self.date.into());
        map
    }
}

/// Classify a file name by keyword. The first matching category wins.
pub fn classify_filename(file_name: &str) -> FilenameTags {
    let lowered = file_name.to_lowercase();
    FilenameTags {
        document_type: first_match(&lowered, &DOCUMENT_TYPES),
        sector: first_match(&lowered, &SECTORS),
        date: find_date(file_name),
    }
}

fn first_match(lowered: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|(label, _)| *label)
}

fn find_date(file_name: &str) -> Option<String> {
    let full = Regex::new(r"\d{4}-\d{2}-\d{2}").ok()?;
    if let Some(found) = full.find(file_name) {
        return Some(found.as_str().to_string());
    }
    let year = Regex::new(r"\d{4}").ok()?;
    year.find(file_name).map(|found| found.as_str().to_string())
}

/// Document-level metadata merged from every source.
pub fn document_metadata(
    document: &Document,
    native: &NativeMetadata,
    overrides: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = Map::new();
    merged.insert("source".into(), document.source().into());
    merged.insert("file_type".into(), document.format.clone().into());
    merged.insert("file_size".into(), document.size_bytes.into());
    merged.insert(
        "processed_at".into(),
        OffsetDateTime::now_utc().format(&Rfc3339).ok().into(),
    );

    merged.extend(native.to_map());
    merged.extend(classify_filename(&document.file_name()).into_map());
    if let Some(overrides) = overrides {
        merged.extend(overrides.clone());
    }
    merged
}

/// Metadata stored with one chunk: the document metadata plus chunk position and a preview.
pub fn chunk_metadata(
    document_metadata: &Map<String, Value>,
    source: &str,
    chunk: &str,
    index: usize,
    total: usize,
    preview_chars: usize,
) -> Map<String, Value> {
    let mut metadata = document_metadata.clone();
    metadata.insert("source".into(), source.into());
    metadata.insert("chunk_index".into(), index.into());
    metadata.insert("total_chunks".into(), total.into());
    metadata.insert("chunk_hash".into(), chunk_hash(chunk).into());
    metadata.insert(
        "content".into(),
        chunk.chars().take(preview_chars).collect::<String>().into(),
    );
    strip_nulls(metadata)
}

/// Drop null-valued fields; the index only stores scalars and strings.
pub fn strip_nulls(mut metadata: Map<String, Value>) -> Map<String, Value> {
    metadata.retain(|_, value| !value.is_null());
    metadata
}

/// Stable entry id for chunk `index` of `source`.
///
/// The first 16 bytes of `SHA-256("{source}_{index}")` read as a UUID, so re-ingesting a
/// document at the same boundaries overwrites its entries.
pub fn chunk_id(source: &str, index: usize) -> String {
    let digest = Sha256::digest(format!("{source}_{index}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Hex SHA-256 of the chunk text.
pub fn chunk_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn document(name: &str) -> Document {
        Document {
            path: PathBuf::from("data/raw").join(name),
            format: crate::extraction::file_format(std::path::Path::new(name)),
            size_bytes: 2048,
            read_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn ecowas_mining_vision_is_a_minerals_policy() {
        assert_eq!(
            classify_filename("ECOWAS_Mining_Vision_2025.txt"),
            FilenameTags {
                document_type: Some("policy"),
                sector: Some("minerals"),
                date: Some("2025".into()),
            }
        );
    }

    #[test]
    fn full_dates_win_over_years_and_first_category_wins() {
        let tags = classify_filename("Trade_Agreement_Energy_Policy_2019-07-01.pdf");
        assert_eq!(tags.document_type, Some("treaty"));
        assert_eq!(tags.sector, Some("energy"));
        assert_eq!(tags.date.as_deref(), Some("2019-07-01"));

        assert_eq!(classify_filename("notes.md"), FilenameTags::default());
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let native = NativeMetadata {
            title: Some("Mining Code".into()),
            author: None,
            ..NativeMetadata::default()
        };
        let mut overrides = Map::new();
        overrides.insert("sector".into(), json!("energy"));
        overrides.insert("file_type".into(), json!("scan"));

        let merged = document_metadata(
            &document("ECOWAS_Mining_Vision_2025.pdf"),
            &native,
            Some(&overrides),
        );

        assert_eq!(merged["source"], "data/raw/ECOWAS_Mining_Vision_2025.pdf");
        assert_eq!(merged["file_size"], 2048);
        assert_eq!(merged["title"], "Mining Code");
        assert_eq!(merged["document_type"], "policy");
        assert_eq!(merged["sector"], "energy");
        assert_eq!(merged["file_type"], "scan");
        assert!(merged["author"].is_null());
        assert!(merged["processed_at"].as_str().is_some_and(|ts| ts.contains('T')));
    }

    #[test]
    fn chunk_metadata_is_null_free_and_bounded() {
        let merged = document_metadata(&document("notes.txt"), &NativeMetadata::default(), None);
        let chunk = "é".repeat(20);
        let metadata = chunk_metadata(&merged, "data/raw/notes.txt", &chunk, 1, 3, 8);

        assert!(metadata.values().all(|value| !value.is_null()));
        assert!(!metadata.contains_key("document_type"));
        assert_eq!(metadata["chunk_index"], 1);
        assert_eq!(metadata["total_chunks"], 3);
        assert_eq!(metadata["content"], "é".repeat(8));
        assert_eq!(metadata["chunk_hash"].as_str().map(str::len), Some(64));
    }

    #[test]
    fn chunk_ids_are_stable_uuids() {
        let first = chunk_id("data/raw/a.pdf", 0);
        assert_eq!(first, chunk_id("data/raw/a.pdf", 0));
        assert_ne!(first, chunk_id("data/raw/a.pdf", 1));
        assert_ne!(first, chunk_id("data/raw/b.pdf", 0));
        assert!(Uuid::parse_str(&first).is_ok());
    }
}

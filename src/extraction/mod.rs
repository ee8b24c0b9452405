//! Document text extraction.
//!
//! Every supported format has an [`Extractor`]. The [`ExtractorRegistry`] routes a document to
//! the extractor registered for its suffix and runs [`sanitize_text`] over the output, so no
//! extractor has to remember to normalize its own text.

mod docx;
mod ocr;
mod pdf;
mod sanitize;
mod text;
mod types;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::IngestionConfig;

pub use docx::DocxExtractor;
pub use ocr::{HttpOcr, OcrCapability};
pub use pdf::PdfExtractor;
pub use sanitize::sanitize_text;
pub use text::{TextExtractor, decode_text};
pub use types::{Document, ExtractedContent, ExtractionError, NativeMetadata, file_format};

#[cfg(test)]
pub(crate) use docx::tests::build_docx;

/// Format-specific text extraction.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Lowercased suffixes this extractor handles.
    fn extensions(&self) -> &'static [&'static str];

    /// Turn the raw file bytes into text and native metadata. The output is sanitized by the
    /// registry afterwards.
    async fn extract(
        &self,
        document: &Document,
        bytes: Vec<u8>,
    ) -> Result<ExtractedContent, ExtractionError>;
}

/// Maps file suffixes to extractors.
#[derive(Clone)]
pub struct ExtractorRegistry {
    by_extension: HashMap<&'static str, Arc<dyn Extractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<_> = self.by_extension.keys().collect();
        extensions.sort();
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ExtractorRegistry {
    /// Registry with the PDF, DOCX, and text extractors. `ocr` is used for text-less PDFs.
    pub fn new(ocr: Option<Arc<dyn OcrCapability>>) -> Self {
        let pdf = match ocr {
            Some(ocr) => PdfExtractor::with_ocr(ocr),
            None => PdfExtractor::new(),
        };
        let mut registry = Self {
            by_extension: HashMap::new(),
        };
        registry.register(Arc::new(pdf));
        registry.register(Arc::new(DocxExtractor));
        registry.register(Arc::new(TextExtractor));
        registry
    }

    /// Build the registry from ingestion settings, wiring the HTTP OCR service when enabled.
    pub fn from_config(config: &IngestionConfig, http: reqwest::Client) -> Self {
        let ocr = match (&config.ocr_endpoint, config.ocr_enabled) {
            (Some(endpoint), true) => {
                tracing::info!(endpoint = %endpoint, "OCR fallback enabled for scanned PDFs");
                Some(Arc::new(HttpOcr::new(http, endpoint.clone(), config.ocr_api_key.clone()))
                    as Arc<dyn OcrCapability>)
            }
            (None, true) => {
                tracing::debug!("OCR enabled but no OCR_ENDPOINT configured; scanned PDFs yield no text");
                None
            }
            (_, false) => None,
        };
        Self::new(ocr)
    }

    /// Register `extractor` for each of its suffixes, replacing earlier registrations.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for extension in extractor.extensions() {
            self.by_extension.insert(*extension, Arc::clone(&extractor));
        }
    }

    /// Whether a file with this suffix can be extracted.
    pub fn supports(&self, extension: &str) -> bool {
        self.by_extension.contains_key(extension.to_lowercase().as_str())
    }

    /// Extract and sanitize a document.
    ///
    /// Fails with `UnsupportedFormat` when no extractor matches the suffix and with `Failure`
    /// when the file cannot be read or parsed.
    pub async fn extract(&self, document: &Document) -> Result<ExtractedContent, ExtractionError> {
        let extractor = self
            .by_extension
            .get(document.format.as_str())
            .ok_or_else(|| ExtractionError::UnsupportedFormat {
                extension: document.format.clone(),
            })?;

        let bytes = tokio::fs::read(&document.path)
            .await
            .map_err(|err| ExtractionError::failure(&document.path, err))?;

        let raw = extractor.extract(document, bytes).await?;
        let text = sanitize_text(&raw.text);
        tracing::debug!(
            path = %document.path.display(),
            format = %document.format,
            raw_chars = raw.text.chars().count(),
            chars = text.chars().count(),
            "Extracted document text"
        );
        Ok(ExtractedContent {
            text,
            metadata: raw.metadata,
        })
    }
}

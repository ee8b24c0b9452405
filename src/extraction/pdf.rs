//! PDF extraction via `lopdf`, with an optional OCR fallback for scanned files.

use async_trait::async_trait;
use encoding_rs::{UTF_16BE, WINDOWS_1252};
use lopdf::{Dictionary, Object};
use std::sync::Arc;

use super::ocr::OcrCapability;
use super::{Document, ExtractedContent, ExtractionError, Extractor, NativeMetadata};

/// Extracts page text and the Info dictionary from PDF files.
#[derive(Clone, Default)]
pub struct PdfExtractor {
    ocr: Option<Arc<dyn OcrCapability>>,
}

impl std::fmt::Debug for PdfExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExtractor")
            .field("ocr", &self.ocr.is_some())
            .finish()
    }
}

impl PdfExtractor {
    /// Extractor without OCR; scanned PDFs yield empty text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that hands text-less PDFs to `ocr`.
    pub fn with_ocr(ocr: Arc<dyn OcrCapability>) -> Self {
        Self { ocr: Some(ocr) }
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    async fn extract(
        &self,
        document: &Document,
        bytes: Vec<u8>,
    ) -> Result<ExtractedContent, ExtractionError> {
        let path = document.path.clone();
        let (parsed, bytes) = tokio::task::spawn_blocking(move || {
            let parsed = parse_pdf(&path, &bytes);
            (parsed, bytes)
        })
        .await
        .map_err(|err| ExtractionError::failure(&document.path, format!("task join error: {err}")))?;
        let (pages, metadata) = parsed?;

        let text = pages.join("\n\n");
        if !text.trim().is_empty() {
            return Ok(ExtractedContent { text, metadata });
        }

        let Some(ocr) = &self.ocr else {
            tracing::warn!(path = %document.path.display(), "PDF has no text layer and OCR is disabled");
            return Ok(ExtractedContent { text, metadata });
        };

        tracing::info!(path = %document.path.display(), "PDF has no text layer; running OCR");
        match ocr.recognize(&document.path, &bytes).await {
            Ok(pages) => Ok(ExtractedContent {
                text: pages.join("\n\n"),
                metadata,
            }),
            Err(error) => {
                tracing::warn!(path = %document.path.display(), %error, "OCR failed");
                Ok(ExtractedContent { text, metadata })
            }
        }
    }
}

fn parse_pdf(
    path: &std::path::Path,
    bytes: &[u8],
) -> Result<(Vec<String>, NativeMetadata), ExtractionError> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|err| ExtractionError::failure(path, err))?;

    let mut pages = Vec::new();
    for page_no in pdf.get_pages().keys() {
        match pdf.extract_text(&[*page_no]) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    pages.push(text.to_string());
                }
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), page = page_no, %error, "Skipping unreadable PDF page");
            }
        }
    }

    Ok((pages, read_info(&pdf)))
}

fn read_info(pdf: &lopdf::Document) -> NativeMetadata {
    let Some(info) = info_dictionary(pdf) else {
        return NativeMetadata::default();
    };
    NativeMetadata {
        title: info_string(info, b"Title"),
        author: info_string(info, b"Author"),
        subject: info_string(info, b"Subject"),
        creator: info_string(info, b"Creator"),
        created: info_string(info, b"CreationDate"),
    }
}

fn info_dictionary(pdf: &lopdf::Document) -> Option<&Dictionary> {
    match pdf.trailer.get(b"Info").ok()? {
        Object::Reference(id) => pdf.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    let Object::String(bytes, _) = info.get(key).ok()? else {
        return None;
    };
    let value = decode_pdf_string(bytes);
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// PDF text strings are UTF-16BE when they start with a BOM and PDFDocEncoding otherwise;
/// Windows-1252 is close enough to the latter for metadata.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let (text, _) = UTF_16BE.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

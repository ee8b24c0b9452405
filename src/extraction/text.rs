//! Plain-text and Markdown extraction with an encoding fallback chain.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use super::{Extractor, ExtractionError, Document, ExtractedContent, NativeMetadata};

/// Reads `.txt`, `.md`, and `.markdown` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

#[async_trait]
impl Extractor for TextExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "md", "markdown"]
    }

    async fn extract(
        &self,
        document: &Document,
        bytes: Vec<u8>,
    ) -> Result<ExtractedContent, ExtractionError> {
        let (text, encoding) = decode_text(&bytes)
            .ok_or_else(|| ExtractionError::failure(&document.path, "no supported encoding decoded the file"))?;
        tracing::debug!(path = %document.path.display(), encoding, "Decoded text document");
        Ok(ExtractedContent {
            text,
            metadata: NativeMetadata::default(),
        })
    }
}

/// Decode bytes trying a BOM-declared encoding, then strict UTF-8, then Windows-1252.
///
/// Returns the decoded text and the name of the encoding that succeeded.
pub fn decode_text(bytes: &[u8]) -> Option<(String, &'static str)> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) =
            encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if !had_errors {
            return Some((text.into_owned(), encoding.name()));
        }
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return Some((text.into_owned(), UTF_8.name()));
    }

    let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some((text.into_owned(), WINDOWS_1252.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::decode_text;

    #[test]
    fn utf8_is_preferred() {
        let (text, encoding) = decode_text("Côte d'Ivoire".as_bytes()).expect("decodes");
        assert_eq!(text, "Côte d'Ivoire");
        assert_eq!(encoding, "UTF-8");
    }

    #[test]
    fn invalid_utf8_falls_back_to_windows_1252() {
        let bytes = [b'C', 0xF4, b't', b'e'];
        let (text, encoding) = decode_text(&bytes).expect("decodes");
        assert_eq!(text, "Côte");
        assert_eq!(encoding, "windows-1252");
    }

    #[test]
    fn utf16_bom_is_honoured() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, encoding) = decode_text(&bytes).expect("decodes");
        assert_eq!(text, "Hi");
        assert_eq!(encoding, "UTF-16LE");
    }
}

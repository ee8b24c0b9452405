//! DOCX extraction: paragraph text from `word/document.xml`, core properties from
//! `docProps/core.xml`.

use async_trait::async_trait;
use regex::Regex;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::{Document, ExtractedContent, ExtractionError, Extractor, NativeMetadata};

/// Reads Word documents in the Office Open XML format.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

#[async_trait]
impl Extractor for DocxExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["docx"]
    }

    async fn extract(
        &self,
        document: &Document,
        bytes: Vec<u8>,
    ) -> Result<ExtractedContent, ExtractionError> {
        let path = document.path.clone();
        tokio::task::spawn_blocking(move || parse_docx(&bytes).map_err(|reason| ExtractionError::failure(&path, reason)))
            .await
            .map_err(|err| ExtractionError::failure(&document.path, format!("task join error: {err}")))?
    }
}

fn parse_docx(bytes: &[u8]) -> Result<ExtractedContent, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|err| err.to_string())?;
    let body = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| "missing word/document.xml".to_string())?;
    let metadata = match read_entry(&mut archive, "docProps/core.xml")? {
        Some(core) => core_properties(&core),
        None => NativeMetadata::default(),
    };

    Ok(ExtractedContent {
        text: paragraphs(&body).map_err(|err| err.to_string())?.join("\n\n"),
        metadata,
    })
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, String> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.to_string()),
    };
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|err| format!("{name}: {err}"))?;
    Ok(Some(xml))
}

/// Non-blank paragraph texts in document order.
fn paragraphs(body: &str) -> Result<Vec<String>, regex::Error> {
    let paragraph_re = Regex::new(r"(?s)<w:p[ >].*?</w:p>")?;
    let run_re = Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br/>")?;
    Ok(paragraph_re
        .find_iter(body)
        .map(|paragraph| {
            run_re
                .captures_iter(paragraph.as_str())
                .map(|run| match run.get(1) {
                    Some(text) => unescape_xml(text.as_str()),
                    None if run[0].starts_with("<w:tab") => "\t".to_string(),
                    None => "\n".to_string(),
                })
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .collect())
}

fn core_properties(core: &str) -> NativeMetadata {
    NativeMetadata {
        title: core_field(core, "dc:title"),
        author: core_field(core, "dc:creator"),
        subject: core_field(core, "dc:subject"),
        creator: None,
        created: core_field(core, "dcterms:created"),
    }
}

fn core_field(core: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let start = core.find(&open)?;
    let after_open = start + core[start..].find('>')? + 1;
    if core[start..after_open].ends_with("/>") {
        return None;
    }
    let end = after_open + core[after_open..].find(&format!("</{tag}>"))?;
    let value = unescape_xml(core[after_open..end].trim());
    (!value.is_empty()).then_some(value)
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    pub(crate) fn build_docx(paragraphs: &[&str], title: Option<&str>) -> Vec<u8> {
        let mut body = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        );
        for paragraph in paragraphs {
            body.push_str(&format!(
                r#"<w:p><w:r><w:t xml:space="preserve">{paragraph}</w:t></w:r></w:p>"#
            ));
        }
        body.push_str("</w:body></w:document>");

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = FileOptions::default();
            writer.start_file("word/document.xml", options).expect("start entry");
            writer.write_all(body.as_bytes()).expect("write body");
            if let Some(title) = title {
                writer.start_file("docProps/core.xml", options).expect("start entry");
                let core = format!(
                    r#"<cp:coreProperties xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{title}</dc:title><dc:creator>Secretariat</dc:creator><dc:subject/><dcterms:created xsi:type="dcterms:W3CDTF">2024-03-01T00:00:00Z</dcterms:created></cp:coreProperties>"#
                );
                writer.write_all(core.as_bytes()).expect("write core");
            }
            writer.finish().expect("finish zip");
        }
        cursor.into_inner()
    }

    #[test]
    fn paragraphs_are_joined_with_blank_lines() {
        let bytes = build_docx(&["Energy access", "", "Power pool &amp; grid"], None);
        let content = parse_docx(&bytes).expect("docx parses");
        assert_eq!(content.text, "Energy access\n\nPower pool & grid");
        assert_eq!(content.metadata, NativeMetadata::default());
    }

    #[test]
    fn core_properties_become_native_metadata() {
        let bytes = build_docx(&["Body"], Some("Regional Strategy"));
        let content = parse_docx(&bytes).expect("docx parses");
        assert_eq!(content.metadata.title.as_deref(), Some("Regional Strategy"));
        assert_eq!(content.metadata.author.as_deref(), Some("Secretariat"));
        assert_eq!(content.metadata.subject, None);
        assert_eq!(content.metadata.created.as_deref(), Some("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn tabs_and_breaks_inside_runs_are_kept() {
        let body = r#"<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t><w:br/><w:t>C</w:t></w:r></w:p>"#;
        assert_eq!(paragraphs(body).expect("patterns compile"), vec!["A\tB\nC"]);
    }

    #[test]
    fn non_zip_input_is_rejected() {
        assert!(parse_docx(b"plain text").is_err());
    }
}

//! Optional OCR capability for PDFs without a text layer.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Something that can turn a scanned PDF into page text.
#[async_trait]
pub trait OcrCapability: Send + Sync {
    /// Recognize text in the PDF bytes; pages are returned in reading order.
    async fn recognize(&self, path: &Path, pdf: &[u8]) -> Result<Vec<String>, String>;
}

/// OCR service reached over HTTP.
///
/// The request body is `{"pdf_base64": "...", "source_path": "..."}`. The service answers with
/// either `{"pages": [{"page": 1, "text": "..."}]}` or `{"text": "..."}` where form feeds
/// separate pages.
#[derive(Debug, Clone)]
pub struct HttpOcr {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    pdf_base64: String,
    source_path: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Option<Vec<OcrPage>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

impl HttpOcr {
    /// Build a client for `endpoint`, optionally authenticated with a bearer token.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl OcrCapability for HttpOcr {
    async fn recognize(&self, path: &Path, pdf: &[u8]) -> Result<Vec<String>, String> {
        let source_path = path.to_string_lossy();
        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: &source_path,
        };

        let mut request = self.http.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!(
                "OCR request to {} returned {}",
                self.endpoint,
                response.status()
            ));
        }

        let payload: OcrResponse = response.json().await.map_err(|err| err.to_string())?;
        let pages = payload_to_pages(payload);
        if pages.is_empty() {
            return Err(format!("OCR response was empty for {}", path.display()));
        }
        Ok(pages)
    }
}

fn payload_to_pages(payload: OcrResponse) -> Vec<String> {
    if let Some(mut listed) = payload.pages {
        listed.sort_by_key(|page| page.page.unwrap_or(1));
        let listed: Vec<String> = listed
            .into_iter()
            .filter_map(|page| page.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if !listed.is_empty() {
            return listed;
        }
    }

    payload
        .text
        .map(|raw| {
            raw.split('\u{000c}')
                .map(|chunk| chunk.trim().to_string())
                .filter(|chunk| !chunk.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[test]
    fn listed_pages_skip_blank_text_and_keep_order() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage { page: Some(3), text: Some("Third".into()) },
                OcrPage { page: Some(2), text: Some("  ".into()) },
                OcrPage { page: Some(1), text: Some("First".into()) },
            ]),
            text: None,
        };
        assert_eq!(payload_to_pages(response), vec!["First", "Third"]);
    }

    #[test]
    fn raw_text_is_split_on_form_feeds() {
        let response = OcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n".into()),
        };
        assert_eq!(payload_to_pages(response), vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn recognize_posts_base64_pdf_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ocr")
                    .header("authorization", "Bearer secret")
                    .json_body_partial(r#"{"pdf_base64": "JVBERg=="}"#);
                then.status(200)
                    .json_body(json!({"pages": [{"page": 1, "text": "Scanned treaty"}]}));
            })
            .await;

        let ocr = HttpOcr::new(
            reqwest::Client::new(),
            format!("{}/ocr", server.base_url()),
            Some("secret".into()),
        );
        let pages = ocr
            .recognize(Path::new("scan.pdf"), b"%PDF")
            .await
            .expect("ocr succeeds");

        mock.assert();
        assert_eq!(pages, vec!["Scanned treaty"]);
    }

    #[tokio::test]
    async fn recognize_reports_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/ocr");
                then.status(502);
            })
            .await;

        let ocr = HttpOcr::new(reqwest::Client::new(), format!("{}/ocr", server.base_url()), None);
        let error = ocr
            .recognize(Path::new("scan.pdf"), b"%PDF")
            .await
            .expect_err("502 is an error");
        assert!(error.contains("502"));
    }
}

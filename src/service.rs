//! The remote conversion service: contract and HTTP implementation.
//!
//! The engine only ever talks to [`ConversionService`], an object-safe async
//! trait with three operations: a single-round-trip batch submission, a
//! chunked streaming submission, and a liveness probe. Tests drive the engine
//! with scripted in-memory implementations; production uses
//! [`HttpConversionService`], which speaks the backend's REST protocol.
//!
//! ## Wire protocol
//!
//! - `POST /upload?clean_with_llm={bool}` — multipart document upload,
//!   JSON response
//! - `POST /convert-text` — multipart upload, conversion without cleaning
//! - `POST /upload-stream` — multipart upload, chunked response whose first
//!   chunk may be a `data: {json}` metadata frame
//! - `POST /clean-markdown` / `POST /clean-markdown-stream` — JSON body
//!   `{"markdown_content": …}`, clean existing markdown
//! - `GET /health` — liveness probe
//!
//! Non-2xx responses carry a JSON error body `{"detail": …}`; the detail is
//! surfaced in [`ConvertError::Api`].

use crate::config::ClientConfig;
use crate::error::ConvertError;
use crate::output::{BatchResponse, HealthReport};
use bytes::Bytes;
use futures::stream::TryStreamExt;
use serde::Deserialize;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed stream of raw response chunks.
///
/// Finite and forward-only; ends with `None` on clean completion. An `Err`
/// item reports the transport failure that broke the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, ConvertError>> + Send>>;

/// A payload submitted for conversion.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    /// A document file to convert (and optionally clean).
    Document { file_name: String, bytes: Vec<u8> },
    /// Existing markdown text to clean.
    Markdown { content: String },
}

impl DocumentPayload {
    /// Wrap in-memory document bytes.
    pub fn document(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Document {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Wrap existing markdown text for cleaning.
    pub fn markdown(content: impl Into<String>) -> Self {
        Self::Markdown {
            content: content.into(),
        }
    }

    /// Read a PDF from disk, validating existence and the `%PDF` magic bytes
    /// so submission fails with a meaningful error rather than a service-side
    /// rejection.
    pub async fn from_pdf_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ConvertError::PermissionDenied {
                    path: path.to_path_buf(),
                })
            }
            Err(_) => {
                return Err(ConvertError::FileNotFound {
                    path: path.to_path_buf(),
                })
            }
        };

        if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(ConvertError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        Ok(Self::Document { file_name, bytes })
    }

    /// Display name for status lines.
    pub fn name(&self) -> &str {
        match self {
            Self::Document { file_name, .. } => file_name,
            Self::Markdown { .. } => "markdown input",
        }
    }

    /// Payload size in bytes.
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::Document { bytes, .. } => bytes.len() as u64,
            Self::Markdown { content } => content.len() as u64,
        }
    }
}

/// Contract consumed by the engine.
#[async_trait::async_trait]
pub trait ConversionService: Send + Sync {
    /// Submit a payload and await the single completed result.
    async fn submit_batch(
        &self,
        payload: &DocumentPayload,
        clean: bool,
    ) -> Result<BatchResponse, ConvertError>;

    /// Submit a payload and open a chunked response stream.
    async fn submit_streaming(&self, payload: &DocumentPayload)
        -> Result<ChunkStream, ConvertError>;

    /// Side-effect-free liveness probe with a short timeout.
    async fn probe_health(&self) -> Result<HealthReport, ConvertError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

/// `POST /upload` and `POST /convert-text` response body.
#[derive(Debug, Deserialize)]
struct UploadWire {
    #[serde(default)]
    success: bool,
    filename: String,
    #[serde(default)]
    raw_markdown: Option<String>,
    cleaned_markdown: String,
    #[serde(default)]
    cleaned_with_llm: bool,
    content_length: u64,
}

/// `POST /clean-markdown` response body.
#[derive(Debug, Deserialize)]
struct CleanWire {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    original_content: Option<String>,
    cleaned_content: String,
    content_length: u64,
}

/// Error body the service attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorWire {
    detail: String,
}

// ── HTTP implementation ──────────────────────────────────────────────────

/// [`ConversionService`] speaking the backend's REST protocol via reqwest.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl HttpConversionService {
    /// Build an HTTP service client from the shared configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ConvertError> {
        // No global client timeout: it would also bound the body of a
        // long-lived stream. Deadlines are applied per request instead.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConvertError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            health_timeout: Duration::from_secs(config.health_timeout_secs),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn multipart_form(file_name: &str, bytes: Vec<u8>) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        reqwest::multipart::Form::new().part("file", part)
    }

    /// Send a request, translating connection errors and non-2xx statuses.
    async fn send_checked(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ConvertError> {
        let response = request.send().await.map_err(|e| ConvertError::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // The service reports failures as {"detail": …}; fall back to the
        // raw body when the shape differs.
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiErrorWire>(&body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status.to_string()
                } else {
                    body
                }
            });
        Err(ConvertError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ConvertError> {
        let body = response.text().await.map_err(|e| ConvertError::Transport {
            message: format!("failed to read response body: {e}"),
        })?;
        serde_json::from_str(&body).map_err(|e| ConvertError::MalformedResponse {
            detail: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ConversionService for HttpConversionService {
    async fn submit_batch(
        &self,
        payload: &DocumentPayload,
        clean: bool,
    ) -> Result<BatchResponse, ConvertError> {
        let request = match payload {
            DocumentPayload::Document { file_name, bytes } => {
                let path = if clean {
                    "/upload?clean_with_llm=true"
                } else {
                    "/convert-text"
                };
                debug!(file = %file_name, clean, "submitting batch document");
                self.client
                    .post(self.endpoint(path))
                    .multipart(Self::multipart_form(file_name, bytes.clone()))
            }
            DocumentPayload::Markdown { content } => {
                debug!(chars = content.len(), "submitting markdown for cleaning");
                self.client
                    .post(self.endpoint("/clean-markdown"))
                    .json(&serde_json::json!({ "markdown_content": content }))
            }
        }
        .timeout(self.request_timeout);

        let response = self.send_checked(request).await?;

        match payload {
            DocumentPayload::Document { .. } => {
                let wire: UploadWire = Self::read_json(response).await?;
                Ok(BatchResponse {
                    succeeded: wire.success,
                    filename: Some(wire.filename),
                    text: wire.cleaned_markdown,
                    raw_text: wire.raw_markdown,
                    cleaned_with_llm: wire.cleaned_with_llm,
                    content_length: wire.content_length,
                })
            }
            DocumentPayload::Markdown { .. } => {
                let wire: CleanWire = Self::read_json(response).await?;
                Ok(BatchResponse {
                    succeeded: wire.success,
                    filename: None,
                    text: wire.cleaned_content,
                    raw_text: wire.original_content,
                    cleaned_with_llm: true,
                    content_length: wire.content_length,
                })
            }
        }
    }

    async fn submit_streaming(
        &self,
        payload: &DocumentPayload,
    ) -> Result<ChunkStream, ConvertError> {
        // Connection establishment gets a deadline; the body read does not —
        // a live stream may legitimately outlast any fixed total timeout.
        let request = match payload {
            DocumentPayload::Document { file_name, bytes } => {
                info!(file = %file_name, "opening conversion stream");
                self.client
                    .post(self.endpoint("/upload-stream"))
                    .multipart(Self::multipart_form(file_name, bytes.clone()))
            }
            DocumentPayload::Markdown { content } => {
                info!(chars = content.len(), "opening markdown cleaning stream");
                self.client
                    .post(self.endpoint("/clean-markdown-stream"))
                    .json(&serde_json::json!({ "markdown_content": content }))
            }
        };

        let response = self.send_checked(request).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| ConvertError::Transport {
                message: e.to_string(),
            });
        Ok(Box::pin(stream))
    }

    async fn probe_health(&self) -> Result<HealthReport, ConvertError> {
        let request = self
            .client
            .get(self.endpoint("/health"))
            .timeout(self.health_timeout);
        let response = self.send_checked(request).await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_names_and_sizes() {
        let doc = DocumentPayload::document("report.pdf", vec![0u8; 16]);
        assert_eq!(doc.name(), "report.pdf");
        assert_eq!(doc.byte_size(), 16);

        let md = DocumentPayload::markdown("# hi");
        assert_eq!(md.name(), "markdown input");
        assert_eq!(md.byte_size(), 4);
    }

    #[tokio::test]
    async fn from_pdf_file_rejects_missing_file() {
        let err = DocumentPayload::from_pdf_file("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn from_pdf_file_rejects_wrong_magic() {
        let dir = std::env::temp_dir();
        let path = dir.join("mdstream_not_a_pdf.pdf");
        tokio::fs::write(&path, b"<html></html>").await.unwrap();
        let err = DocumentPayload::from_pdf_file(&path).await.unwrap_err();
        assert!(matches!(err, ConvertError::NotAPdf { .. }));
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn from_pdf_file_accepts_pdf_magic() {
        let dir = std::env::temp_dir();
        let path = dir.join("mdstream_minimal.pdf");
        tokio::fs::write(&path, b"%PDF-1.4\n%%EOF\n").await.unwrap();
        let payload = DocumentPayload::from_pdf_file(&path).await.unwrap();
        assert_eq!(payload.name(), "mdstream_minimal.pdf");
        tokio::fs::remove_file(&path).await.ok();
    }

    #[test]
    fn upload_wire_missing_content_field_is_an_error() {
        let body = r#"{"success":true,"filename":"a.pdf","content_length":3}"#;
        let err = serde_json::from_str::<UploadWire>(body).unwrap_err();
        assert!(err.to_string().contains("cleaned_markdown"));
    }

    #[test]
    fn upload_wire_parses_full_body() {
        let body = r##"{
            "success": true,
            "filename": "a.pdf",
            "raw_markdown": "# raw",
            "cleaned_markdown": "# clean",
            "cleaned_with_llm": true,
            "content_length": 7
        }"##;
        let wire: UploadWire = serde_json::from_str(body).unwrap();
        assert!(wire.success);
        assert_eq!(wire.cleaned_markdown, "# clean");
        assert_eq!(wire.raw_markdown.as_deref(), Some("# raw"));
    }

    #[test]
    fn clean_wire_parses() {
        let body = r#"{"success":true,"original_content":"x","cleaned_content":"y","content_length":1}"#;
        let wire: CleanWire = serde_json::from_str(body).unwrap();
        assert_eq!(wire.cleaned_content, "y");
        assert_eq!(wire.original_content.as_deref(), Some("x"));
        assert!(wire.success);
    }
}

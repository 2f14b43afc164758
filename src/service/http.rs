//! [`DocumentService`] backed by the document REST API.
//!
//! ## Endpoints
//!
//! ```text
//! POST {base}/pdfs/                      multipart `file` parts   → [file | {error}]
//! GET  {base}/pdfs/?page_size=N          listing                  → {links, count, results}
//! GET  {next|previous link}              listing continuation     → {links, count, results}
//! GET  {base}/pdfs/{id}/                 document detail          → {id, name, pages}
//! POST {base}/pages/process_pages/       {"page_ids": [...]}      → {status, processed_pages}
//! ```
//!
//! The wire structs below mirror the backend's JSON exactly and are
//! converted into the crate's model types at this boundary, so nothing past
//! this module sees backend field names such as `json_output` or
//! `high_res_image`.

use crate::config::WorkflowConfig;
use crate::error::ServiceError;
use crate::model::{
    DocumentId, ExtractedData, FileSummary, PageDetail, PageId, PaginationCursor, PdfDetail,
    ScanResponse, ScanResult,
};
use crate::service::{DocumentService, ListQuery, UploadFile, UploadOutcome, UploadRejection};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest backend error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the document backend.
#[derive(Debug, Clone)]
pub struct HttpDocumentService {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
    scan_timeout: Duration,
}

impl HttpDocumentService {
    /// Build a client from the session configuration.
    pub fn new(config: &WorkflowConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Self::with_client(client, config)
    }

    /// Build on top of an existing `reqwest::Client` (shared connection pool, proxies, …).
    pub fn with_client(
        client: reqwest::Client,
        config: &WorkflowConfig,
    ) -> Result<Self, ServiceError> {
        // `Url::join` drops the last path segment unless the base ends in '/'.
        let mut base = config.api_base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| ServiceError::Transport(format!("invalid base URL '{base}': {e}")))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout(),
            scan_timeout: config.scan_timeout(),
        })
    }

    /// Resolve a path relative to the API base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Transport(format!("invalid endpoint '{path}': {e}")))
    }

    /// URL of the first listing page for `query`.
    pub fn list_url(&self, query: &ListQuery) -> Result<Url, ServiceError> {
        let mut url = self.endpoint("pdfs/")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page_size", &query.page_size.to_string());
            if let Some(scanned) = query.scanned {
                pairs.append_pair("scanned", if scanned { "true" } else { "false" });
            }
        }
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T, ServiceError> {
        let secs = timeout.as_secs();
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(e, secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        let bytes = response.bytes().await.map_err(|e| map_reqwest(e, secs))?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn upload_files(&self, files: Vec<UploadFile>) -> Result<UploadOutcome, ServiceError> {
        let url = self.endpoint("pdfs/")?;
        info!("Uploading {} file(s) to {}", files.len(), url);

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str("application/pdf")
                .map_err(|e| ServiceError::Transport(e.to_string()))?;
            form = form.part("file", part);
        }

        let entries: Vec<WireUploadEntry> = self
            .send_json(self.client.post(url).multipart(form), self.request_timeout)
            .await?;
        Ok(upload_outcome(&names, entries))
    }

    async fn fetch_documents(&self, query: &ListQuery) -> Result<PaginationCursor, ServiceError> {
        let url = self.list_url(query)?;
        debug!("Fetching document list: {}", url);
        let page: WireListPage = self
            .send_json(self.client.get(url), self.request_timeout)
            .await?;
        Ok(page.into())
    }

    async fn fetch_document_detail(&self, id: DocumentId) -> Result<PdfDetail, ServiceError> {
        let url = self.endpoint(&format!("pdfs/{}/", id.0))?;
        debug!("Fetching document detail: {}", url);
        let detail: WireDetail = self
            .send_json(self.client.get(url), self.request_timeout)
            .await?;
        Ok(detail.into())
    }

    async fn submit_scan(&self, page_ids: &[PageId]) -> Result<ScanResponse, ServiceError> {
        let url = self.endpoint("pages/process_pages/")?;
        info!("Submitting {} page(s) for scanning", page_ids.len());
        let body = serde_json::json!({ "page_ids": page_ids });
        let response: WireScanResponse = self
            .send_json(self.client.post(url).json(&body), self.scan_timeout)
            .await?;
        Ok(response.into())
    }

    async fn fetch_page(&self, token: &str) -> Result<PaginationCursor, ServiceError> {
        // Tokens are the backend's absolute next/previous links; accept
        // relative ones too.
        let url = match Url::parse(token) {
            Ok(url) => url,
            Err(_) => self.endpoint(token.trim_start_matches('/'))?,
        };
        debug!("Fetching listing page: {}", url);
        let page: WireListPage = self
            .send_json(self.client.get(url), self.request_timeout)
            .await?;
        Ok(page.into())
    }
}

fn map_reqwest(e: reqwest::Error, secs: u64) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout { secs }
    } else if e.is_decode() {
        ServiceError::Decode(e.to_string())
    } else {
        ServiceError::Transport(e.to_string())
    }
}

/// Pull the backend's `{"error": "..."}` message out of a body, or keep a
/// bounded prefix of the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}\u{2026}", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireFile {
    id: u64,
    name: String,
    #[serde(default)]
    pages: Vec<u64>,
    #[serde(default)]
    scanned: bool,
}

impl From<WireFile> for FileSummary {
    fn from(f: WireFile) -> Self {
        FileSummary {
            id: DocumentId(f.id),
            name: f.name,
            page_count: f.pages.len(),
            scanned: f.scanned,
        }
    }
}

/// One element of the upload response: a created file or an error entry.
#[derive(Debug, Deserialize)]
struct WireUploadEntry {
    id: Option<u64>,
    name: Option<String>,
    #[serde(default)]
    pages: Vec<u64>,
    #[serde(default)]
    scanned: bool,
    error: Option<String>,
}

/// Pair upload entries with the submitted file names.
///
/// The backend answers with one entry per submitted file, in order; error
/// entries carry no name of their own.
fn upload_outcome(names: &[String], entries: Vec<WireUploadEntry>) -> UploadOutcome {
    let mut outcome = UploadOutcome::default();
    for (idx, entry) in entries.into_iter().enumerate() {
        let submitted = names.get(idx).cloned();
        match (entry.error, entry.id) {
            (None, Some(id)) => outcome.accepted.push(FileSummary {
                id: DocumentId(id),
                name: submitted.or(entry.name).unwrap_or_else(|| format!("document {id}")),
                page_count: entry.pages.len(),
                scanned: entry.scanned,
            }),
            (error, _) => {
                let reason = error.unwrap_or_else(|| "missing document id".to_string());
                warn!("Upload rejected: {}", reason);
                outcome.rejected.push(UploadRejection {
                    name: submitted
                        .or(entry.name)
                        .unwrap_or_else(|| "unknown".to_string()),
                    reason,
                });
            }
        }
    }
    outcome
}

#[derive(Debug, Default, Deserialize)]
struct WireLinks {
    next: Option<String>,
    previous: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireListPage {
    #[serde(default)]
    links: WireLinks,
    count: Option<u64>,
    results: Vec<WireFile>,
}

impl From<WireListPage> for PaginationCursor {
    fn from(p: WireListPage) -> Self {
        PaginationCursor {
            items: p.results.into_iter().map(FileSummary::from).collect(),
            next_token: p.links.next,
            prev_token: p.links.previous,
            total_count: p.count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePage {
    id: u64,
    page_number: usize,
    thumbnail: Option<String>,
    high_res_image: Option<String>,
    #[serde(default)]
    scanned: bool,
    json_output: Option<ExtractedData>,
}

impl From<WirePage> for PageDetail {
    fn from(p: WirePage) -> Self {
        PageDetail {
            id: PageId(p.id),
            page_number: p.page_number,
            thumbnail_ref: p.thumbnail,
            high_res_ref: p.high_res_image,
            scanned: p.scanned,
            extracted_data: p.json_output,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireDetail {
    id: u64,
    name: String,
    #[serde(default)]
    pages: Vec<WirePage>,
}

impl From<WireDetail> for PdfDetail {
    fn from(d: WireDetail) -> Self {
        PdfDetail {
            id: DocumentId(d.id),
            name: d.name,
            pages: d.pages.into_iter().map(PageDetail::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireProcessedPage {
    #[serde(alias = "id")]
    page_id: u64,
    json_output: Option<ExtractedData>,
    #[serde(default, alias = "gpt_cost")]
    cost: f64,
    /// Seconds, as reported by the backend.
    processing_time: Option<f64>,
    processing_time_ms: Option<u64>,
    #[serde(default = "default_true")]
    scanned: bool,
}

fn default_true() -> bool {
    true
}

impl From<WireProcessedPage> for ScanResult {
    fn from(p: WireProcessedPage) -> Self {
        let processing_time_ms = p
            .processing_time_ms
            .or_else(|| p.processing_time.map(|secs| (secs * 1000.0).round().max(0.0) as u64))
            .unwrap_or(0);
        ScanResult {
            page_id: PageId(p.page_id),
            extracted_data: p.json_output.unwrap_or_default(),
            cost: p.cost,
            processing_time_ms,
            scanned: p.scanned,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireScanResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    processed_pages: Vec<WireProcessedPage>,
}

impl From<WireScanResponse> for ScanResponse {
    fn from(r: WireScanResponse) -> Self {
        ScanResponse {
            status: r.status,
            results: r.processed_pages.into_iter().map(ScanResult::from).collect(),
        }
    }
}

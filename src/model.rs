//! Data model shared by the workflow core and its collaborators.
//!
//! Every record here is a plain value: the controller never mutates a
//! [`PdfDetail`] in place, it replaces it. Consumers holding an
//! `Arc<PdfDetail>` from an earlier snapshot therefore keep seeing exactly
//! what they rendered, and can detect a change with [`std::sync::Arc::ptr_eq`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Identifiers ──────────────────────────────────────────────────────────

/// Server-assigned identifier of an uploaded PDF document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

/// Server-assigned identifier of a single page of a document.
///
/// Page ids are globally unique, not per-document indices; scan results are
/// matched on them, never on page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Documents ────────────────────────────────────────────────────────────

/// A document as it appears in the listing, before its detail is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: DocumentId,
    pub name: String,
    pub page_count: usize,
    pub scanned: bool,
}

/// Structured data extracted from a page by the scan service.
///
/// `title`, `content` and `source` are the fields the editor works with;
/// anything else the service returns is carried through untouched in
/// `extra` so an edit-and-save round trip never loses data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One page of a [`PdfDetail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDetail {
    pub id: PageId,
    /// 1-indexed position in the source PDF.
    pub page_number: usize,
    pub thumbnail_ref: Option<String>,
    pub high_res_ref: Option<String>,
    pub scanned: bool,
    /// Present only after a scan covering this page succeeded.
    pub extracted_data: Option<ExtractedData>,
}

/// The full detail of one document, fetched lazily on selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfDetail {
    pub id: DocumentId,
    pub name: String,
    pub pages: Vec<PageDetail>,
}

impl PdfDetail {
    /// Look up a page by id.
    pub fn page(&self, id: PageId) -> Option<&PageDetail> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Whether a page with this id belongs to the document.
    pub fn contains_page(&self, id: PageId) -> bool {
        self.page(id).is_some()
    }

    /// Number of pages that carry scan results.
    pub fn scanned_count(&self) -> usize {
        self.pages.iter().filter(|p| p.scanned).count()
    }
}

// ── Scanning ─────────────────────────────────────────────────────────────

/// One entry of a scan response, keyed by page id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub page_id: PageId,
    pub extracted_data: ExtractedData,
    /// Provider cost attributed to this page, in USD.
    pub cost: f64,
    pub processing_time_ms: u64,
    pub scanned: bool,
}

/// The response of the scan service for a previously submitted page set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    pub results: Vec<ScanResult>,
}

impl ScanResponse {
    /// Find the result for a page, if the response carries one.
    ///
    /// When a page appears more than once the last entry wins, matching the
    /// order in which the service reported them.
    pub fn result_for(&self, page: PageId) -> Option<&ScanResult> {
        self.results.iter().rev().find(|r| r.page_id == page)
    }
}

/// Aggregate figures for one merged scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub document: DocumentId,
    /// Pages submitted in the request.
    pub requested_pages: usize,
    /// Pages of the document that received a result.
    pub merged_pages: usize,
    /// Results whose page id does not belong to the document.
    pub ignored_results: usize,
    pub total_cost: f64,
    pub total_processing_ms: u64,
}

// ── Listing ──────────────────────────────────────────────────────────────

/// One page of the document listing plus the tokens needed to move through it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub items: Vec<FileSummary>,
    pub next_token: Option<String>,
    pub prev_token: Option<String>,
    /// Total number of documents across all listing pages, when the backend reports it.
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl PaginationCursor {
    /// A cursor holding `items` with no continuation in either direction.
    pub fn from_items(items: Vec<FileSummary>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

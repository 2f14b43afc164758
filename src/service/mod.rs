//! External collaborators the workflow core depends on.
//!
//! The controller never talks to the network itself. Everything that
//! suspends (uploading, listing, loading a document, scanning) goes
//! through [`DocumentService`], so the core can be driven against the real
//! backend ([`http::HttpDocumentService`]) or an in-memory stub in tests.
//!
//! 1. [`upload`] — read and validate local PDFs before they are sent
//! 2. [`http`]   — the REST backend implementation

pub mod http;
pub mod upload;

use crate::error::ServiceError;
use crate::model::{DocumentId, FileSummary, PageId, PaginationCursor, PdfDetail, ScanResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters of a document listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub page_size: usize,
    /// `Some(b)` restricts the listing to documents whose `scanned` flag is `b`.
    pub scanned: Option<bool>,
}

/// A local PDF ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// File name sent to the backend.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A file the upload did not accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRejection {
    pub name: String,
    pub reason: String,
}

/// Result of an upload batch. Partial success is a normal outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub accepted: Vec<FileSummary>,
    pub rejected: Vec<UploadRejection>,
}

impl UploadOutcome {
    /// Append rejections found before the batch reached the backend.
    pub fn with_local_rejections(mut self, mut rejected: Vec<UploadRejection>) -> Self {
        rejected.append(&mut self.rejected);
        self.rejected = rejected;
        self
    }
}

/// The backend operations the workflow suspends on.
///
/// Implementations must be `Send + Sync`; a session shares one service
/// between all of its in-flight operations.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Upload a batch of PDFs and report which were accepted.
    async fn upload_files(&self, files: Vec<UploadFile>) -> Result<UploadOutcome, ServiceError>;

    /// Fetch the first page of the document listing.
    async fn fetch_documents(&self, query: &ListQuery) -> Result<PaginationCursor, ServiceError>;

    /// Fetch the full detail of one document.
    async fn fetch_document_detail(&self, id: DocumentId) -> Result<PdfDetail, ServiceError>;

    /// Run the extraction service over `page_ids`.
    async fn submit_scan(&self, page_ids: &[PageId]) -> Result<ScanResponse, ServiceError>;

    /// Fetch the listing page a cursor token points to.
    async fn fetch_page(&self, token: &str) -> Result<PaginationCursor, ServiceError>;
}

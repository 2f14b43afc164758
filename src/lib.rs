//! # pdfscan-workflow
//!
//! Client-side workflow for browsing uploaded PDFs, selecting pages and
//! scanning them through a remote extraction service.
//!
//! ## Workflow Overview
//!
//! ```text
//! Idle
//!  │
//!  ├─ 1. Upload / Load   populate the paginated document list
//!  ├─ 2. Select          fetch one document's pages; it becomes active
//!  ├─ 3. Toggle          build a page selection on the active document
//!  ├─ 4. Scan            send the selection to the extraction service
//!  └─ 5. Merge           fold results into the document it was issued for
//! ```
//!
//! Every request is tagged with the context it was issued in. A scan
//! response that lands after the user switched documents, or a detail
//! fetch overtaken by a newer selection, is discarded instead of
//! overwriting the document now on screen.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfscan_workflow::{PageSelection, WorkflowConfig, WorkflowSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkflowConfig::builder()
//!         .api_base_url("http://localhost:8000/api")
//!         .build()?;
//!     let session = WorkflowSession::connect(config)?;
//!
//!     let listing = session.load_documents().await?;
//!     let first = listing.items[0].id;
//!     session.select_document(first).await?;
//!     session.select_pages(&PageSelection::Range(1, 3)).await?;
//!
//!     let summary = session.scan().await?;
//!     eprintln!("{} pages merged, ${:.4}", summary.merged_pages, summary.total_cost);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | The `pdfscan` binary (clap, anyhow, indicatif, tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfscan-workflow = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod merge;
pub mod model;
pub mod observer;
pub mod selection;
pub mod service;
pub mod session;
pub mod status;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageSelection, WorkflowConfig, WorkflowConfigBuilder};
pub use controller::{WorkflowController, WorkflowSnapshot, WorkflowState};
pub use cursor::DocumentCursor;
pub use error::{Direction, Operation, ServiceError, WorkflowError};
pub use merge::merge;
pub use model::{
    DocumentId, ExtractedData, FileSummary, PageDetail, PageId, PaginationCursor, PdfDetail,
    ScanResponse, ScanResult, ScanSummary,
};
pub use observer::{NoopObserver, Observer, WorkflowObserver};
pub use selection::PageSelectionSet;
pub use service::http::HttpDocumentService;
pub use service::{DocumentService, ListQuery, UploadFile, UploadOutcome, UploadRejection};
pub use session::WorkflowSession;
pub use status::{StatusKind, StatusMessage};

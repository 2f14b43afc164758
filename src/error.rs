//! Error types for the pdfscan-workflow library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`ServiceError`] — a collaborator call failed (network, timeout, HTTP
//!   status, undecodable body). Produced by [`crate::service::DocumentService`]
//!   implementations and never shown to the user directly.
//!
//! * [`WorkflowError`] — returned from every fallible controller operation.
//!   Collaborator failures are converted into `Upload`, `Fetch`,
//!   `Pagination` or `Scan` and written to the status slot
//!   on the way out; guard violations and stale responses are returned
//!   without touching the status slot.
//!
//! Whatever the variant, a failed operation leaves the active document, the
//! selection and the listing exactly as they were before it started.

use crate::controller::WorkflowState;
use crate::model::{DocumentId, PageId};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The controller operation an error or stale response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Operation {
    Upload,
    LoadDocuments,
    Paginate,
    SelectDocument,
    Scan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::LoadDocuments => "load documents",
            Operation::Paginate => "paginate",
            Operation::SelectDocument => "select document",
            Operation::Scan => "scan",
        };
        f.write_str(name)
    }
}

/// Direction of a listing page move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Next,
    Previous,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Next => f.write_str("next"),
            Direction::Previous => f.write_str("previous"),
        }
    }
}

/// All errors returned by workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    // ── Collaborator failures (surfaced in the status slot) ──────────────
    /// Uploading failed outright, or every file was rejected.
    #[error("Upload failed: {reason}")]
    Upload { reason: String },

    /// Fetching the document list or a document's detail failed.
    #[error("Failed to fetch {target}: {reason}")]
    Fetch { target: String, reason: String },

    /// The document list fetch succeeded but returned nothing.
    #[error("No files found in the database")]
    NoDocuments,

    /// A pagination request was rejected; the cursor is unchanged.
    #[error("Pagination failed: {reason}")]
    Pagination { reason: String },

    /// The scan request failed; the document is unchanged.
    #[error("Scan of document {document} failed: {reason}")]
    Scan { document: DocumentId, reason: String },

    // ── Silently dropped ─────────────────────────────────────────────────
    /// A response arrived after its context changed and was not applied.
    #[error("Discarded stale {operation} response")]
    StaleResponseDiscarded { operation: Operation },

    // ── Guard violations (state untouched, status untouched) ─────────────
    /// The operation is not permitted in the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: Operation,
        state: WorkflowState,
    },

    /// The operation needs an active document and none is loaded.
    #[error("No document is active")]
    NoActiveDocument,

    /// A scan was requested with no pages selected.
    #[error("No pages selected for scanning")]
    EmptySelection,

    /// A scan is already pending for the active document.
    #[error("A scan is already in flight for document {document}")]
    ScanInFlight { document: DocumentId },

    /// The page does not belong to the active document.
    #[error("Page {page} does not belong to document {document}")]
    UnknownPage { page: PageId, document: DocumentId },

    /// The cursor has no token in the requested direction.
    #[error("There is no {direction} page of documents")]
    NoPageToken { direction: Direction },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WorkflowError {
    /// Whether this failure was reported through the status slot.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            WorkflowError::Upload { .. }
                | WorkflowError::Fetch { .. }
                | WorkflowError::NoDocuments
                | WorkflowError::Pagination { .. }
                | WorkflowError::Scan { .. }
        )
    }

    /// Whether this is a stale response that was dropped on purpose.
    pub fn is_stale(&self) -> bool {
        matches!(self, WorkflowError::StaleResponseDiscarded { .. })
    }
}

/// A failed call to an external collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request could not be sent or the connection broke.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call did not complete in time.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The backend answered with a body we could not interpret.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// A local file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Timeout { .. })
    }
}

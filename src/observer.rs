//! Observer trait for workflow events.
//!
//! Inject an [`Arc<dyn WorkflowObserver>`] via
//! [`crate::config::WorkflowConfigBuilder::observer`] to receive events as
//! the controller moves between states, raises status messages and runs
//! scans.
//!
//! Observers complement the snapshot channel
//! ([`crate::controller::WorkflowController::subscribe`]): the channel
//! carries the latest full state for rendering, the observer carries the
//! individual events (a terminal spinner, an audit log, a metrics counter).
//!
//! # Example
//!
//! ```rust
//! use pdfscan_workflow::{DocumentId, ScanSummary, WorkflowConfig, WorkflowObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ScanCounter {
//!     scans: AtomicUsize,
//! }
//!
//! impl WorkflowObserver for ScanCounter {
//!     fn on_scan_complete(&self, document: DocumentId, summary: &ScanSummary) {
//!         self.scans.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("document {document}: {} pages merged", summary.merged_pages);
//!     }
//! }
//!
//! let counter = Arc::new(ScanCounter { scans: AtomicUsize::new(0) });
//! let config = WorkflowConfig::builder()
//!     .observer(counter as Arc<dyn WorkflowObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::controller::WorkflowState;
use crate::error::Operation;
use crate::model::{DocumentId, ScanSummary};
use crate::status::StatusMessage;
use std::sync::Arc;

/// Called by the controller as the workflow progresses.
///
/// Implementations must be `Send + Sync`: a session can be shared between
/// tasks. Callbacks run while the controller is locked, so they must not
/// call back into the session. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait WorkflowObserver: Send + Sync {
    /// The workflow state changed.
    fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
        let _ = (from, to);
    }

    /// A new status message was raised.
    fn on_status(&self, status: &StatusMessage) {
        let _ = status;
    }

    /// A document became active.
    ///
    /// # Arguments
    /// * `document` — the newly active document
    /// * `pages`    — its page count
    fn on_document_activated(&self, document: DocumentId, pages: usize) {
        let _ = (document, pages);
    }

    /// A scan request was issued.
    ///
    /// # Arguments
    /// * `document` — document the pages belong to
    /// * `pages`    — number of pages in the request
    fn on_scan_start(&self, document: DocumentId, pages: usize) {
        let _ = (document, pages);
    }

    /// A scan response was merged into the active document.
    fn on_scan_complete(&self, document: DocumentId, summary: &ScanSummary) {
        let _ = (document, summary);
    }

    /// A scan request failed; the document was left unchanged.
    fn on_scan_failed(&self, document: DocumentId, error: &str) {
        let _ = (document, error);
    }

    /// A response arrived after its context changed and was dropped.
    fn on_response_discarded(&self, operation: Operation) {
        let _ = operation;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::WorkflowConfig`].
pub type Observer = Arc<dyn WorkflowObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        transitions: Mutex<Vec<(WorkflowState, WorkflowState)>>,
        statuses: AtomicUsize,
        discarded: AtomicUsize,
    }

    impl WorkflowObserver for Recorder {
        fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
            self.transitions.lock().unwrap().push((from, to));
        }

        fn on_status(&self, _status: &StatusMessage) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_response_discarded(&self, _operation: Operation) {
            self.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_state_change(WorkflowState::Idle, WorkflowState::Listing);
        obs.on_document_activated(DocumentId(1), 3);
        obs.on_scan_start(DocumentId(1), 2);
        obs.on_scan_failed(DocumentId(1), "timeout");
        obs.on_response_discarded(Operation::Scan);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_state_change(WorkflowState::Idle, WorkflowState::Listing);
        rec.on_state_change(WorkflowState::Listing, WorkflowState::Viewing);
        rec.on_status(&StatusMessage {
            id: 1,
            kind: StatusKind::Success,
            message: "ok".into(),
        });
        rec.on_response_discarded(Operation::SelectDocument);

        assert_eq!(rec.transitions.lock().unwrap().len(), 2);
        assert_eq!(rec.statuses.load(Ordering::SeqCst), 1);
        assert_eq!(rec.discarded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Observer = Arc::new(NoopObserver);
        obs.on_scan_start(DocumentId(4), 10);
    }
}

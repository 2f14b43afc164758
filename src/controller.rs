//! The document workflow state machine.
//!
//! ## States
//!
//! ```text
//!            upload / load                 select(id)                 scan
//!   Idle ─────────────────▶ Listing ───────────────────▶ Viewing ─────────────▶ Scanning
//!                             ▲  ▲ next/prev                │  ▲ toggle             │
//!                             │  └──────────┘               │  └──────┘             │
//!                             └──────── home ───────────────┘  ◀──── response ──────┘
//! ```
//!
//! ## Two-phase transitions
//!
//! Every transition that waits on a collaborator is split in two: a
//! `begin_*` call validates guards, records what the request is about and
//! returns a request token; the matching `finish_*` call takes that token
//! back together with the collaborator's result. The controller itself
//! never awaits, so it stays free to process other events (toggles,
//! navigation, another selection) while a request is out.
//!
//! Each token carries the identity of the context it was issued in. A
//! `finish_*` whose context has moved on (a newer listing request, a newer
//! document selection, a different active document) is discarded with
//! [`WorkflowError::StaleResponseDiscarded`] instead of being applied.
//! [`crate::session::WorkflowSession`] wires both halves to a
//! [`crate::service::DocumentService`].

use crate::config::{PageSelection, WorkflowConfig};
use crate::cursor::DocumentCursor;
use crate::error::{Direction, Operation, ServiceError, WorkflowError};
use crate::merge::{matched_pages, merge};
use crate::model::{
    DocumentId, ExtractedData, PageId, PaginationCursor, PdfDetail, ScanResponse, ScanSummary,
};
use crate::observer::Observer;
use crate::selection::PageSelectionSet;
use crate::service::UploadOutcome;
use crate::status::{StatusKind, StatusMessage, StatusSlot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Nothing loaded yet.
    Idle,
    /// Showing the paginated document list.
    Listing,
    /// A document is active and no scan is running.
    Viewing,
    /// A scan request for the active document is in flight.
    Scanning,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Listing => "listing",
            WorkflowState::Viewing => "viewing",
            WorkflowState::Scanning => "scanning",
        };
        f.write_str(name)
    }
}

/// Read-only view of the controller published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub active_document: Option<Arc<PdfDetail>>,
    /// Selected page ids, ascending.
    pub selection: Vec<PageId>,
    pub cursor: Arc<PaginationCursor>,
    pub status: Option<StatusMessage>,
    pub last_scan: Option<ScanSummary>,
    /// The "Home" control may be used.
    pub home_enabled: bool,
    /// The "PDF" viewer control may be used.
    pub viewer_enabled: bool,
}

// ── Request tokens ───────────────────────────────────────────────────────

/// An in-flight upload or document-list request.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    epoch: u64,
    operation: Operation,
}

impl ListingRequest {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// An in-flight listing page move.
#[derive(Debug, Clone)]
pub struct PageRequest {
    epoch: u64,
    direction: Direction,
    token: String,
}

impl PageRequest {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The cursor token to fetch.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// An in-flight document detail fetch.
#[derive(Debug, Clone)]
pub struct DetailRequest {
    epoch: u64,
    document: DocumentId,
}

impl DetailRequest {
    pub fn document(&self) -> DocumentId {
        self.document
    }
}

/// An in-flight scan, with the page ids captured when it was issued.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    id: u64,
    document: DocumentId,
    activation: u64,
    page_ids: Arc<[PageId]>,
}

impl ScanTicket {
    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// The request payload. Fixed at issue time.
    pub fn page_ids(&self) -> &[PageId] {
        &self.page_ids
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingScan {
    ticket: u64,
    document: DocumentId,
}

// ── Controller ───────────────────────────────────────────────────────────

/// Owns all workflow state: listing, active document, selection, pending
/// scan and status slot. Mutated only through the operations below.
pub struct WorkflowController {
    state: WorkflowState,
    cursor: DocumentCursor,
    selection: PageSelectionSet,
    active: Option<Arc<PdfDetail>>,
    /// Bumped whenever the active document is replaced or cleared.
    activation: u64,
    listing_epoch: u64,
    detail_epoch: u64,
    next_ticket: u64,
    pending_scan: Option<PendingScan>,
    status: StatusSlot,
    last_scan: Option<ScanSummary>,
    observer: Option<Observer>,
    snapshots: watch::Sender<WorkflowSnapshot>,
}

impl fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowController")
            .field("state", &self.state)
            .field("active", &self.active.as_ref().map(|d| d.id))
            .field("selection", &self.selection)
            .field("listing_items", &self.cursor.current().items.len())
            .field("pending_scan", &self.pending_scan)
            .field("status", &self.status.current())
            .finish()
    }
}

impl Default for WorkflowController {
    fn default() -> Self {
        Self::new(&WorkflowConfig::default())
    }
}

impl WorkflowController {
    pub fn new(config: &WorkflowConfig) -> Self {
        let cursor = DocumentCursor::new();
        let initial = WorkflowSnapshot {
            state: WorkflowState::Idle,
            active_document: None,
            selection: Vec::new(),
            cursor: Arc::clone(cursor.current()),
            status: None,
            last_scan: None,
            home_enabled: false,
            viewer_enabled: false,
        };
        let (snapshots, _) = watch::channel(initial);

        Self {
            state: WorkflowState::Idle,
            cursor,
            selection: PageSelectionSet::new(),
            active: None,
            activation: 0,
            listing_epoch: 0,
            detail_epoch: 0,
            next_ticket: 0,
            pending_scan: None,
            status: StatusSlot::default(),
            last_scan: None,
            observer: config.observer.clone(),
            snapshots,
        }
    }

    // ── Read side ────────────────────────────────────────────────────────

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn active_document(&self) -> Option<&Arc<PdfDetail>> {
        self.active.as_ref()
    }

    pub fn selection(&self) -> &PageSelectionSet {
        &self.selection
    }

    pub fn cursor(&self) -> &Arc<PaginationCursor> {
        self.cursor.current()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.current()
    }

    pub fn last_scan(&self) -> Option<&ScanSummary> {
        self.last_scan.as_ref()
    }

    /// "Home" is usable when there is a list to go back to and no scan is running.
    pub fn home_enabled(&self) -> bool {
        !self.cursor.is_empty() && self.state != WorkflowState::Scanning
    }

    /// The "PDF" viewer is usable whenever a document is active.
    pub fn viewer_enabled(&self) -> bool {
        self.active.is_some()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            state: self.state,
            active_document: self.active.clone(),
            selection: self.selection.iter().collect(),
            cursor: Arc::clone(self.cursor.current()),
            status: self.status.current().cloned(),
            last_scan: self.last_scan.clone(),
            home_enabled: self.home_enabled(),
            viewer_enabled: self.viewer_enabled(),
        }
    }

    /// Receive a fresh [`WorkflowSnapshot`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.snapshots.subscribe()
    }

    // ── Listing: upload and database fetch ───────────────────────────────

    /// Start an upload. Rejected while a scan is in flight.
    pub fn begin_upload(&mut self) -> Result<ListingRequest, WorkflowError> {
        self.begin_listing(Operation::Upload)
    }

    /// Start a document-list fetch. Rejected while a scan is in flight.
    pub fn begin_load(&mut self) -> Result<ListingRequest, WorkflowError> {
        self.begin_listing(Operation::LoadDocuments)
    }

    fn begin_listing(&mut self, operation: Operation) -> Result<ListingRequest, WorkflowError> {
        if self.state == WorkflowState::Scanning {
            return Err(WorkflowError::InvalidTransition {
                operation,
                state: self.state,
            });
        }
        self.listing_epoch += 1;
        Ok(ListingRequest {
            epoch: self.listing_epoch,
            operation,
        })
    }

    /// Apply an upload result.
    ///
    /// Accepted files become the listing; rejected files only affect the
    /// status message. If nothing was accepted the listing is left alone.
    pub fn finish_upload(
        &mut self,
        request: ListingRequest,
        result: Result<UploadOutcome, ServiceError>,
    ) -> Result<UploadOutcome, WorkflowError> {
        if request.epoch != self.listing_epoch {
            return Err(self.discard(Operation::Upload));
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Upload failed: {}", e);
                self.raise(StatusKind::Error, "Error uploading files.");
                self.publish();
                return Err(WorkflowError::Upload {
                    reason: e.to_string(),
                });
            }
        };

        if outcome.accepted.is_empty() {
            let message = if outcome.rejected.is_empty() {
                "No files received."
            } else {
                "Files were corrupted or already exist."
            };
            warn!("Upload accepted no files ({} rejected)", outcome.rejected.len());
            self.raise(StatusKind::Error, message);
            self.publish();
            let reason = if outcome.rejected.is_empty() {
                message.to_string()
            } else {
                outcome
                    .rejected
                    .iter()
                    .map(|r| format!("{}: {}", r.name, r.reason))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(WorkflowError::Upload { reason });
        }

        info!(
            "Upload complete: {} accepted, {} rejected",
            outcome.accepted.len(),
            outcome.rejected.len()
        );
        self.show_listing(PaginationCursor::from_items(outcome.accepted.clone()));
        if outcome.rejected.is_empty() {
            self.raise(
                StatusKind::Success,
                format!("{} file(s) uploaded successfully.", outcome.accepted.len()),
            );
        } else {
            self.raise(
                StatusKind::Warning,
                format!(
                    "Uploaded {} file(s); {} already exist or were rejected.",
                    outcome.accepted.len(),
                    outcome.rejected.len()
                ),
            );
        }
        self.publish();
        Ok(outcome)
    }

    /// Apply a document-list fetch result.
    pub fn finish_load(
        &mut self,
        request: ListingRequest,
        result: Result<PaginationCursor, ServiceError>,
    ) -> Result<(), WorkflowError> {
        if request.epoch != self.listing_epoch {
            return Err(self.discard(Operation::LoadDocuments));
        }

        match result {
            Err(e) => {
                warn!("Fetching documents failed: {}", e);
                self.raise(StatusKind::Error, "Error fetching documents.");
                self.publish();
                Err(WorkflowError::Fetch {
                    target: "document list".into(),
                    reason: e.to_string(),
                })
            }
            Ok(page) if page.is_empty() => {
                info!("Document list is empty");
                self.raise(StatusKind::Error, "No files found in the database.");
                self.publish();
                Err(WorkflowError::NoDocuments)
            }
            Ok(page) => {
                info!("Loaded {} document(s)", page.items.len());
                self.show_listing(page);
                self.raise(StatusKind::Success, "PDFs fetched successfully.");
                self.publish();
                Ok(())
            }
        }
    }

    /// Replace the listing and, unless a scan is running, return to it.
    ///
    /// Returning to the listing also abandons any document fetch in flight.
    fn show_listing(&mut self, page: PaginationCursor) {
        self.cursor.replace(page);
        if self.state != WorkflowState::Scanning {
            self.detail_epoch += 1;
            if self.active.is_some() {
                self.deactivate();
            }
            self.set_state(WorkflowState::Listing);
        }
    }

    // ── Listing: pagination ──────────────────────────────────────────────

    /// Start a move to the next or previous listing page. Only permitted while listing.
    pub fn begin_page(&mut self, direction: Direction) -> Result<PageRequest, WorkflowError> {
        if self.state != WorkflowState::Listing {
            return Err(WorkflowError::InvalidTransition {
                operation: Operation::Paginate,
                state: self.state,
            });
        }
        let token = self
            .cursor
            .token(direction)
            .ok_or(WorkflowError::NoPageToken { direction })?
            .to_string();
        self.listing_epoch += 1;
        Ok(PageRequest {
            epoch: self.listing_epoch,
            direction,
            token,
        })
    }

    /// Apply a listing page. On failure the cursor is unchanged.
    pub fn finish_page(
        &mut self,
        request: PageRequest,
        result: Result<PaginationCursor, ServiceError>,
    ) -> Result<(), WorkflowError> {
        if request.epoch != self.listing_epoch {
            return Err(self.discard(Operation::Paginate));
        }

        let applied = self.cursor.apply_step(request.direction, result);
        if applied.is_err() {
            self.raise(StatusKind::Error, "Failed to fetch PDFs.");
        }
        self.publish();
        applied
    }

    // ── Document selection ───────────────────────────────────────────────

    /// Start loading document `id`.
    ///
    /// Permitted once something has been listed. Selecting while a scan is
    /// in flight abandons that scan: its response will be discarded.
    pub fn begin_select(&mut self, id: DocumentId) -> Result<DetailRequest, WorkflowError> {
        if self.state == WorkflowState::Idle {
            return Err(WorkflowError::InvalidTransition {
                operation: Operation::SelectDocument,
                state: self.state,
            });
        }
        self.detail_epoch += 1;
        debug!("Selecting document {}", id);
        Ok(DetailRequest {
            epoch: self.detail_epoch,
            document: id,
        })
    }

    /// Apply a fetched document detail.
    ///
    /// On success the document becomes active with an empty selection. On
    /// failure the previous state, document and selection are kept.
    pub fn finish_select(
        &mut self,
        request: DetailRequest,
        result: Result<PdfDetail, ServiceError>,
    ) -> Result<Arc<PdfDetail>, WorkflowError> {
        if request.epoch != self.detail_epoch {
            return Err(self.discard(Operation::SelectDocument));
        }

        let detail = match result {
            Ok(detail) if detail.id == request.document => detail,
            Ok(detail) => {
                return Err(self.fail_select(
                    request.document,
                    format!("backend returned document {}", detail.id),
                ))
            }
            Err(e) => return Err(self.fail_select(request.document, e.to_string())),
        };

        info!(
            "Selected document {}: {} pages",
            detail.id,
            detail.pages.len()
        );
        let detail = Arc::new(detail);
        self.activate(Arc::clone(&detail));
        self.set_state(WorkflowState::Viewing);
        if let Some(obs) = &self.observer {
            obs.on_document_activated(detail.id, detail.pages.len());
        }
        self.publish();
        Ok(detail)
    }

    fn fail_select(&mut self, document: DocumentId, reason: String) -> WorkflowError {
        warn!("Fetching document {} failed: {}", document, reason);
        self.raise(StatusKind::Error, "Failed to fetch PDF details.");
        self.publish();
        WorkflowError::Fetch {
            target: format!("document {document}"),
            reason,
        }
    }

    /// Return to the listing, clearing the active document and selection.
    /// A document fetch still in flight is abandoned.
    ///
    /// Returns `false` and changes nothing when the list is empty or a scan
    /// is in flight.
    pub fn navigate_home(&mut self) -> bool {
        if !self.home_enabled() || self.state == WorkflowState::Idle {
            return false;
        }
        self.detail_epoch += 1;
        if self.state == WorkflowState::Listing {
            return true;
        }
        self.deactivate();
        self.set_state(WorkflowState::Listing);
        self.publish();
        true
    }

    // ── Page selection ───────────────────────────────────────────────────

    /// Flip selection of `page`. Returns `true` if the page is selected afterwards.
    pub fn toggle_page(&mut self, page: PageId) -> Result<bool, WorkflowError> {
        let document = self.require_page(page)?;
        let selected = self.selection.toggle(page);
        debug!(
            "Page {} of document {} {}",
            page,
            document,
            if selected { "selected" } else { "deselected" }
        );
        self.publish();
        Ok(selected)
    }

    /// Replace the selection with the pages matching `pages` by page position.
    /// Returns the number of pages selected.
    pub fn select_pages(&mut self, pages: &PageSelection) -> Result<usize, WorkflowError> {
        let active = self.active.as_ref().ok_or(WorkflowError::NoActiveDocument)?;
        let ids: Vec<PageId> = pages
            .to_indices(active.pages.len())
            .into_iter()
            .map(|idx| active.pages[idx].id)
            .collect();
        self.selection.replace_with(ids);
        self.publish();
        Ok(self.selection.len())
    }

    fn require_page(&self, page: PageId) -> Result<DocumentId, WorkflowError> {
        let active = self.active.as_ref().ok_or(WorkflowError::NoActiveDocument)?;
        if !active.contains_page(page) {
            return Err(WorkflowError::UnknownPage {
                page,
                document: active.id,
            });
        }
        Ok(active.id)
    }

    // ── Scanning ─────────────────────────────────────────────────────────

    /// Issue a scan of the current selection.
    ///
    /// Requires an active document, a non-empty selection and no scan
    /// already in flight for it. The selection is captured into the ticket;
    /// toggles made afterwards do not change the request.
    pub fn begin_scan(&mut self) -> Result<ScanTicket, WorkflowError> {
        let document = self
            .active
            .as_ref()
            .ok_or(WorkflowError::NoActiveDocument)?
            .id;
        match self.state {
            WorkflowState::Viewing => {}
            WorkflowState::Scanning => return Err(WorkflowError::ScanInFlight { document }),
            state => {
                return Err(WorkflowError::InvalidTransition {
                    operation: Operation::Scan,
                    state,
                })
            }
        }
        if self.selection.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        self.next_ticket += 1;
        let ticket = ScanTicket {
            id: self.next_ticket,
            document,
            activation: self.activation,
            page_ids: self.selection.snapshot(),
        };
        self.pending_scan = Some(PendingScan {
            ticket: ticket.id,
            document,
        });
        info!(
            "Scanning {} page(s) of document {}",
            ticket.page_ids.len(),
            document
        );
        self.set_state(WorkflowState::Scanning);
        if let Some(obs) = &self.observer {
            obs.on_scan_start(document, ticket.page_ids.len());
        }
        self.publish();
        Ok(ticket)
    }

    /// Apply a scan response.
    ///
    /// The response is merged only into the document that was active when
    /// the ticket was issued; otherwise it is discarded. A failed scan
    /// leaves the document untouched.
    pub fn finish_scan(
        &mut self,
        ticket: ScanTicket,
        result: Result<ScanResponse, ServiceError>,
    ) -> Result<ScanSummary, WorkflowError> {
        let is_current = matches!(
            self.pending_scan,
            Some(p) if p.ticket == ticket.id && p.document == ticket.document
        ) && self.activation == ticket.activation;
        let active = match (&self.active, is_current) {
            (Some(active), true) => Arc::clone(active),
            _ => {
                debug!(
                    "Scan response for document {} arrived after the document changed",
                    ticket.document
                );
                return Err(self.discard(Operation::Scan));
            }
        };
        self.pending_scan = None;
        self.set_state(WorkflowState::Viewing);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Scan of document {} failed: {}", ticket.document, e);
                let reason = e.to_string();
                self.raise(StatusKind::Error, format!("Scan failed: {reason}"));
                if let Some(obs) = &self.observer {
                    obs.on_scan_failed(ticket.document, &reason);
                }
                self.publish();
                return Err(WorkflowError::Scan {
                    document: ticket.document,
                    reason,
                });
            }
        };

        let merged_pages = matched_pages(&active, &response);
        let summary = ScanSummary {
            document: active.id,
            requested_pages: ticket.page_ids.len(),
            merged_pages,
            ignored_results: response
                .results
                .iter()
                .filter(|r| !active.contains_page(r.page_id))
                .count(),
            total_cost: response.results.iter().map(|r| r.cost).sum(),
            total_processing_ms: response.results.iter().map(|r| r.processing_time_ms).sum(),
        };
        if summary.ignored_results > 0 {
            warn!(
                "Scan response carried {} result(s) for pages outside document {}",
                summary.ignored_results, active.id
            );
        }

        self.active = Some(Arc::new(merge(&active, &response)));
        info!(
            "Scan of document {} complete: {}/{} pages merged, ${:.4}",
            active.id, merged_pages, summary.requested_pages, summary.total_cost
        );
        if merged_pages == 0 {
            self.raise(
                StatusKind::Warning,
                "Scan returned no results for the selected pages.",
            );
        } else {
            self.raise(
                StatusKind::Success,
                format!(
                    "Scanned {} page(s) (${:.4}).",
                    merged_pages, summary.total_cost
                ),
            );
        }
        if let Some(obs) = &self.observer {
            obs.on_scan_complete(active.id, &summary);
        }
        self.last_scan = Some(summary.clone());
        self.publish();
        Ok(summary)
    }

    // ── Editing ──────────────────────────────────────────────────────────

    /// Replace the extracted data of one page of the active document.
    ///
    /// Rejected while a scan is in flight, since the response would
    /// overwrite the edit.
    pub fn edit_page(
        &mut self,
        page: PageId,
        data: ExtractedData,
    ) -> Result<Arc<PdfDetail>, WorkflowError> {
        let document = self.require_page(page)?;
        if self.state == WorkflowState::Scanning {
            return Err(WorkflowError::ScanInFlight { document });
        }
        let Some(active) = self.active.as_ref() else {
            return Err(WorkflowError::NoActiveDocument);
        };

        let mut edited = PdfDetail::clone(active);
        if let Some(target) = edited.pages.iter_mut().find(|p| p.id == page) {
            target.extracted_data = Some(data);
        }
        let edited = Arc::new(edited);
        self.active = Some(Arc::clone(&edited));
        debug!("Edited page {} of document {}", page, document);
        self.publish();
        Ok(edited)
    }

    // ── Status ───────────────────────────────────────────────────────────

    /// Dismiss the current status message, whatever its kind.
    pub fn dismiss_status(&mut self) -> bool {
        let cleared = self.status.dismiss();
        if cleared {
            self.publish();
        }
        cleared
    }

    /// Auto-dismiss status `id` if it is still showing and is not an error.
    pub fn expire_status(&mut self, id: u64) -> bool {
        let cleared = self.status.expire(id);
        if cleared {
            self.publish();
        }
        cleared
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn activate(&mut self, detail: Arc<PdfDetail>) {
        self.active = Some(detail);
        self.selection.clear();
        self.activation += 1;
        self.pending_scan = None;
    }

    fn deactivate(&mut self) {
        self.active = None;
        self.selection.clear();
        self.activation += 1;
        self.pending_scan = None;
    }

    fn set_state(&mut self, to: WorkflowState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!("Workflow: {} → {}", from, to);
        self.state = to;
        if let Some(obs) = &self.observer {
            obs.on_state_change(from, to);
        }
    }

    fn raise(&mut self, kind: StatusKind, message: impl Into<String>) {
        let status = self.status.raise(kind, message);
        if let Some(obs) = &self.observer {
            obs.on_status(status);
        }
    }

    fn discard(&self, operation: Operation) -> WorkflowError {
        debug!("Discarding stale {} response", operation);
        if let Some(obs) = &self.observer {
            obs.on_response_discarded(operation);
        }
        WorkflowError::StaleResponseDiscarded { operation }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

//! Async driver that connects a [`WorkflowController`] to a [`DocumentService`].
//!
//! Each operation runs in three steps: lock the controller and `begin_*`,
//! release the lock and await the service, lock again and `finish_*`. The
//! lock is never held across an `.await`, so toggles, navigation and other
//! selections proceed while a scan or fetch is out. Responses that come back
//! after their context has moved on are rejected by the controller's
//! identity checks and surface as
//! [`WorkflowError::StaleResponseDiscarded`].
//!
//! Success and warning statuses clear themselves after
//! [`WorkflowConfig::status_dismiss_delay`]; errors stay until dismissed.

use crate::config::{PageSelection, WorkflowConfig};
use crate::controller::{WorkflowController, WorkflowSnapshot};
use crate::error::{Direction, ServiceError, WorkflowError};
use crate::model::{DocumentId, ExtractedData, PageId, PaginationCursor, PdfDetail, ScanSummary};
use crate::service::http::HttpDocumentService;
use crate::service::upload::prepare_uploads;
use crate::service::{DocumentService, UploadOutcome};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

/// A shareable handle to one workflow. Cloning is cheap; clones drive the
/// same controller.
#[derive(Clone)]
pub struct WorkflowSession {
    inner: Arc<Inner>,
}

struct Inner {
    controller: Mutex<WorkflowController>,
    service: Arc<dyn DocumentService>,
    config: WorkflowConfig,
}

impl std::fmt::Debug for WorkflowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowSession")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl WorkflowSession {
    /// Create a session over any [`DocumentService`].
    pub fn new(config: WorkflowConfig, service: Arc<dyn DocumentService>) -> Self {
        Self {
            inner: Arc::new(Inner {
                controller: Mutex::new(WorkflowController::new(&config)),
                service,
                config,
            }),
        }
    }

    /// Create a session talking to the REST backend at `config.api_base_url`.
    pub fn connect(config: WorkflowConfig) -> Result<Self, WorkflowError> {
        let service = HttpDocumentService::new(&config)
            .map_err(|e| WorkflowError::InvalidConfig(e.to_string()))?;
        info!("Workflow session connected to {}", config.api_base_url);
        Ok(Self::new(config, Arc::new(service)))
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.inner.config
    }

    // ── Listing ──────────────────────────────────────────────────────────

    /// Upload local PDFs and show the accepted ones as the listing.
    ///
    /// Files that are missing or not PDFs are rejected locally and reported
    /// alongside the backend's rejections.
    pub async fn upload(&self, paths: &[PathBuf]) -> Result<UploadOutcome, WorkflowError> {
        let request = self.apply(|c| c.begin_upload()).await?;

        let (files, local_rejections) = prepare_uploads(paths).await;
        let result = if files.is_empty() {
            debug!("No valid files left to upload");
            Ok(UploadOutcome::default())
        } else {
            let timeout = self.inner.config.request_timeout();
            with_timeout(timeout, self.inner.service.upload_files(files)).await
        };
        let result = result.map(|outcome| outcome.with_local_rejections(local_rejections));

        self.apply(|c| c.finish_upload(request, result)).await
    }

    /// Fetch the first page of the document listing.
    pub async fn load_documents(&self) -> Result<Arc<PaginationCursor>, WorkflowError> {
        let request = self.apply(|c| c.begin_load()).await?;

        let query = self.inner.config.list_query();
        let result = with_timeout(
            self.inner.config.request_timeout(),
            self.inner.service.fetch_documents(&query),
        )
        .await;

        self.apply(|c| -> Result<_, WorkflowError> {
            c.finish_load(request, result)?;
            Ok(Arc::clone(c.cursor()))
        })
        .await
    }

    pub async fn next_page(&self) -> Result<Arc<PaginationCursor>, WorkflowError> {
        self.paginate(Direction::Next).await
    }

    pub async fn prev_page(&self) -> Result<Arc<PaginationCursor>, WorkflowError> {
        self.paginate(Direction::Previous).await
    }

    async fn paginate(&self, direction: Direction) -> Result<Arc<PaginationCursor>, WorkflowError> {
        let request = self.apply(|c| c.begin_page(direction)).await?;

        let result = with_timeout(
            self.inner.config.request_timeout(),
            self.inner.service.fetch_page(request.token()),
        )
        .await;

        self.apply(|c| -> Result<_, WorkflowError> {
            c.finish_page(request, result)?;
            Ok(Arc::clone(c.cursor()))
        })
        .await
    }

    /// Return to the listing. `false` when the list is empty or a scan is running.
    pub async fn navigate_home(&self) -> bool {
        self.apply(|c| c.navigate_home()).await
    }

    // ── Document ─────────────────────────────────────────────────────────

    /// Load document `id` and make it active with an empty selection.
    pub async fn select_document(&self, id: DocumentId) -> Result<Arc<PdfDetail>, WorkflowError> {
        let request = self.apply(|c| c.begin_select(id)).await?;

        let result = with_timeout(
            self.inner.config.request_timeout(),
            self.inner.service.fetch_document_detail(id),
        )
        .await;

        self.apply(|c| c.finish_select(request, result)).await
    }

    pub async fn toggle_page(&self, page: PageId) -> Result<bool, WorkflowError> {
        self.apply(|c| c.toggle_page(page)).await
    }

    /// Replace the selection by page number. Returns how many pages are selected.
    pub async fn select_pages(&self, pages: &PageSelection) -> Result<usize, WorkflowError> {
        self.apply(|c| c.select_pages(pages)).await
    }

    /// Scan the selected pages of the active document and merge the results.
    pub async fn scan(&self) -> Result<ScanSummary, WorkflowError> {
        let ticket = self.apply(|c| c.begin_scan()).await?;

        let result = with_timeout(
            self.inner.config.scan_timeout(),
            self.inner.service.submit_scan(ticket.page_ids()),
        )
        .await;

        self.apply(|c| c.finish_scan(ticket, result)).await
    }

    /// Replace the extracted data of one page of the active document.
    pub async fn edit_page(
        &self,
        page: PageId,
        data: ExtractedData,
    ) -> Result<Arc<PdfDetail>, WorkflowError> {
        self.apply(|c| c.edit_page(page, data)).await
    }

    // ── Status and observation ───────────────────────────────────────────

    pub async fn dismiss_status(&self) -> bool {
        self.inner.controller.lock().await.dismiss_status()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        self.inner.controller.lock().await.snapshot()
    }

    pub async fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.inner.controller.lock().await.subscribe()
    }

    /// Snapshots as a stream, starting with the current one.
    pub async fn snapshots(&self) -> WatchStream<WorkflowSnapshot> {
        WatchStream::new(self.subscribe().await)
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Run `f` under the controller lock and arm the dismiss timer for any
    /// status it raised.
    async fn apply<T>(&self, f: impl FnOnce(&mut WorkflowController) -> T) -> T {
        let mut controller = self.inner.controller.lock().await;
        let before = controller.status().map(|s| s.id);
        let out = f(&mut controller);
        let raised = controller
            .status()
            .filter(|s| Some(s.id) != before && s.kind.auto_dismisses())
            .map(|s| s.id);
        drop(controller);

        if let Some(id) = raised {
            self.schedule_dismiss(id);
        }
        out
    }

    fn schedule_dismiss(&self, id: u64) {
        let delay = self.inner.config.status_dismiss_delay();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                if inner.controller.lock().await.expire_status(id) {
                    debug!("Status {} dismissed", id);
                }
            }
        });
    }
}

/// Bound a service call by `limit`, mapping expiry to [`ServiceError::Timeout`].
async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileSummary, PageDetail, ScanResponse};
    use crate::service::{ListQuery, UploadFile};
    use crate::status::StatusKind;
    use async_trait::async_trait;

    /// Serves one document with two pages; scans never return.
    struct Slow;

    #[async_trait]
    impl DocumentService for Slow {
        async fn upload_files(&self, _: Vec<UploadFile>) -> Result<UploadOutcome, ServiceError> {
            Ok(UploadOutcome::default())
        }
        async fn fetch_documents(&self, _: &ListQuery) -> Result<PaginationCursor, ServiceError> {
            Ok(PaginationCursor::from_items(vec![FileSummary {
                id: DocumentId(1),
                name: "a.pdf".into(),
                page_count: 2,
                scanned: false,
            }]))
        }
        async fn fetch_document_detail(&self, id: DocumentId) -> Result<PdfDetail, ServiceError> {
            Ok(PdfDetail {
                id,
                name: "a.pdf".into(),
                pages: (1..=2)
                    .map(|n| PageDetail {
                        id: PageId(n),
                        page_number: n as usize,
                        thumbnail_ref: None,
                        high_res_ref: None,
                        scanned: false,
                        extracted_data: None,
                    })
                    .collect(),
            })
        }
        async fn submit_scan(&self, _: &[PageId]) -> Result<ScanResponse, ServiceError> {
            std::future::pending().await
        }
        async fn fetch_page(&self, _: &str) -> Result<PaginationCursor, ServiceError> {
            Err(ServiceError::Transport("offline".into()))
        }
    }

    fn session() -> WorkflowSession {
        let config = WorkflowConfig::builder()
            .scan_timeout_secs(5)
            .status_dismiss_ms(1000)
            .build()
            .unwrap();
        WorkflowSession::new(config, Arc::new(Slow))
    }

    #[tokio::test(start_paused = true)]
    async fn scan_times_out() {
        let s = session();
        s.load_documents().await.unwrap();
        s.select_document(DocumentId(1)).await.unwrap();
        s.toggle_page(PageId(1)).await.unwrap();

        let err = s.scan().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Scan { .. }));
        assert!(err.to_string().contains("timed out"));

        let snap = s.snapshot().await;
        assert_eq!(snap.state, crate::controller::WorkflowState::Viewing);
        assert_eq!(snap.status.unwrap().kind, StatusKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn success_status_expires() {
        let s = session();
        s.load_documents().await.unwrap();
        assert_eq!(
            s.snapshot().await.status.unwrap().kind,
            StatusKind::Success
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(s.snapshot().await.status.is_none());
    }

    #[tokio::test]
    async fn upload_with_no_valid_files_skips_backend() {
        let s = session();
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();

        let err = s.upload(&[txt]).await.unwrap_err();
        assert!(err.to_string().contains("notes.txt: not a PDF file"));
        assert_eq!(s.snapshot().await.state, crate::controller::WorkflowState::Idle);
    }
}

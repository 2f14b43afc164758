//! Pagination state for the document listing.

use crate::error::{Direction, ServiceError, WorkflowError};
use crate::model::PaginationCursor;
use crate::service::DocumentService;
use std::sync::Arc;
use tracing::{debug, warn};

/// The current listing page and the tokens to move away from it.
///
/// The page is held behind an `Arc` and swapped wholesale on every
/// replacement; it is never edited in place, so a snapshot taken before a
/// page move keeps its own list.
#[derive(Debug, Clone, Default)]
pub struct DocumentCursor {
    current: Arc<PaginationCursor>,
}

impl DocumentCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing with a fresh page.
    pub fn replace(&mut self, page: PaginationCursor) {
        debug!(
            "Listing replaced: {} item(s), next={}, prev={}",
            page.items.len(),
            page.next_token.is_some(),
            page.prev_token.is_some()
        );
        self.current = Arc::new(page);
    }

    /// The current listing page.
    pub fn current(&self) -> &Arc<PaginationCursor> {
        &self.current
    }

    pub fn next_token(&self) -> Option<&str> {
        self.current.next_token.as_deref()
    }

    pub fn prev_token(&self) -> Option<&str> {
        self.current.prev_token.as_deref()
    }

    /// The stored token for `direction`.
    pub fn token(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Next => self.next_token(),
            Direction::Previous => self.prev_token(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Move to the next listing page through `service`.
    ///
    /// On failure the cursor is left exactly as it was.
    pub async fn advance(&mut self, service: &dyn DocumentService) -> Result<(), WorkflowError> {
        self.step(service, Direction::Next).await
    }

    /// Move to the previous listing page through `service`.
    ///
    /// On failure the cursor is left exactly as it was.
    pub async fn retreat(&mut self, service: &dyn DocumentService) -> Result<(), WorkflowError> {
        self.step(service, Direction::Previous).await
    }

    async fn step(
        &mut self,
        service: &dyn DocumentService,
        direction: Direction,
    ) -> Result<(), WorkflowError> {
        let token = self
            .token(direction)
            .ok_or(WorkflowError::NoPageToken { direction })?
            .to_string();

        let result = service.fetch_page(&token).await;
        self.apply_step(direction, result)
    }

    /// Apply the outcome of fetching the `direction` page.
    ///
    /// A fetched page replaces the listing. A failure leaves the cursor
    /// untouched and becomes [`WorkflowError::Pagination`].
    pub fn apply_step(
        &mut self,
        direction: Direction,
        result: Result<PaginationCursor, ServiceError>,
    ) -> Result<(), WorkflowError> {
        match result {
            Ok(page) => {
                debug!("Moved to {} listing page", direction);
                self.replace(page);
                Ok(())
            }
            Err(e) => {
                warn!("Fetching {} listing page failed: {}", direction, e);
                Err(WorkflowError::Pagination {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentId, FileSummary, PageId, PdfDetail, ScanResponse};
    use crate::service::{ListQuery, UploadFile, UploadOutcome};
    use async_trait::async_trait;

    fn summary(id: u64) -> FileSummary {
        FileSummary {
            id: DocumentId(id),
            name: format!("{id}.pdf"),
            page_count: 1,
            scanned: false,
        }
    }

    /// Serves listing pages by token; any other token fails.
    struct Pages;

    #[async_trait]
    impl DocumentService for Pages {
        async fn upload_files(&self, _: Vec<UploadFile>) -> Result<UploadOutcome, ServiceError> {
            unreachable!()
        }
        async fn fetch_documents(&self, _: &ListQuery) -> Result<PaginationCursor, ServiceError> {
            unreachable!()
        }
        async fn fetch_document_detail(&self, _: DocumentId) -> Result<PdfDetail, ServiceError> {
            unreachable!()
        }
        async fn submit_scan(&self, _: &[PageId]) -> Result<ScanResponse, ServiceError> {
            unreachable!()
        }
        async fn fetch_page(&self, token: &str) -> Result<PaginationCursor, ServiceError> {
            match token {
                "p2" => Ok(PaginationCursor {
                    items: vec![summary(3), summary(4)],
                    next_token: None,
                    prev_token: Some("p1".into()),
                    total_count: Some(4),
                }),
                "p1" => Ok(PaginationCursor {
                    items: vec![summary(1), summary(2)],
                    next_token: Some("p2".into()),
                    prev_token: None,
                    total_count: Some(4),
                }),
                _ => Err(ServiceError::Http {
                    status: 404,
                    body: "Invalid page.".into(),
                }),
            }
        }
    }

    fn first_page() -> DocumentCursor {
        let mut cursor = DocumentCursor::new();
        cursor.replace(PaginationCursor {
            items: vec![summary(1), summary(2)],
            next_token: Some("p2".into()),
            prev_token: None,
            total_count: Some(4),
        });
        cursor
    }

    #[tokio::test]
    async fn advance_and_retreat() {
        let mut cursor = first_page();
        cursor.advance(&Pages).await.unwrap();
        assert_eq!(cursor.current().items[0].id, DocumentId(3));
        assert_eq!(cursor.next_token(), None);
        assert_eq!(cursor.prev_token(), Some("p1"));

        cursor.retreat(&Pages).await.unwrap();
        assert_eq!(cursor.current().items[0].id, DocumentId(1));
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let mut cursor = first_page();
        let err = cursor.retreat(&Pages).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NoPageToken {
                direction: Direction::Previous
            }
        ));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_cursor() {
        let mut cursor = DocumentCursor::new();
        cursor.replace(PaginationCursor {
            items: vec![summary(9)],
            next_token: Some("bogus".into()),
            prev_token: None,
            total_count: None,
        });
        let before = Arc::clone(cursor.current());

        let err = cursor.advance(&Pages).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Pagination { .. }));
        assert!(Arc::ptr_eq(&before, cursor.current()));
    }

    #[test]
    fn apply_step_swaps_only_on_success() {
        let mut cursor = first_page();
        let before = Arc::clone(cursor.current());

        let err = cursor
            .apply_step(Direction::Next, Err(ServiceError::Timeout { secs: 60 }))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(Arc::ptr_eq(&before, cursor.current()));

        let page = PaginationCursor::from_items(vec![summary(7)]);
        cursor.apply_step(Direction::Next, Ok(page)).unwrap();
        assert_eq!(cursor.current().items[0].id, DocumentId(7));
        assert_eq!(cursor.next_token(), None);
    }
}

//! Configuration types for the document workflow.
//!
//! All workflow behaviour is controlled through [`WorkflowConfig`], built
//! via its [`WorkflowConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config between a session and its HTTP service and
//! to log exactly what a run was configured with.

use crate::error::WorkflowError;
use crate::observer::Observer;
use crate::service::ListQuery;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Largest listing page the backend will serve.
pub const MAX_PAGE_SIZE: usize = 100;

/// Configuration for a workflow session.
///
/// Built via [`WorkflowConfig::builder()`] or using
/// [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfscan_workflow::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .api_base_url("http://localhost:8000/api")
///     .page_size(20)
///     .scan_timeout_secs(600)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Base URL of the document REST backend. Default: `http://localhost:8000/api`.
    pub api_base_url: String,

    /// Documents per listing page. Range: 1–100. Default: 40.
    pub page_size: usize,

    /// Restrict the listing to scanned (`Some(true)`) or unscanned
    /// (`Some(false)`) documents; `None` lists everything.
    /// Default: `Some(false)`, the backlog still waiting for a scan.
    pub scanned_filter: Option<bool>,

    /// Timeout for upload, listing, detail and pagination calls, in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Timeout for a scan request, in seconds. Default: 300.
    ///
    /// Scans run the extraction service synchronously behind the request, so
    /// they take far longer than the other calls.
    pub scan_timeout_secs: u64,

    /// Delay before a success or warning status clears itself, in milliseconds. Default: 4000.
    pub status_dismiss_ms: u64,

    /// Receives workflow events. Default: None.
    pub observer: Option<Observer>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            page_size: 40,
            scanned_filter: Some(false),
            request_timeout_secs: 60,
            scan_timeout_secs: 300,
            status_dismiss_ms: 4000,
            observer: None,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("api_base_url", &self.api_base_url)
            .field("page_size", &self.page_size)
            .field("scanned_filter", &self.scanned_filter)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scan_timeout_secs", &self.scan_timeout_secs)
            .field("status_dismiss_ms", &self.status_dismiss_ms)
            .field(
                "observer",
                &self.observer.as_ref().map(|_| "<dyn WorkflowObserver>"),
            )
            .finish()
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }

    /// The listing query derived from `page_size` and `scanned_filter`.
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            page_size: self.page_size,
            scanned: self.scanned_filter,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn status_dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.status_dismiss_ms)
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.config.page_size = n.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn scanned_filter(mut self, filter: Option<bool>) -> Self {
        self.config.scanned_filter = filter;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn scan_timeout_secs(mut self, secs: u64) -> Self {
        self.config.scan_timeout_secs = secs;
        self
    }

    pub fn status_dismiss_ms(mut self, ms: u64) -> Self {
        self.config.status_dismiss_ms = ms;
        self
    }

    pub fn observer(mut self, observer: Observer) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, WorkflowError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.api_base_url).map_err(|e| {
            WorkflowError::InvalidConfig(format!("API base URL '{}': {}", c.api_base_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(WorkflowError::InvalidConfig(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.request_timeout_secs == 0 || c.scan_timeout_secs == 0 {
            return Err(WorkflowError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the active document to select, by page number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page positions.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend() {
        let config = WorkflowConfig::default();
        assert_eq!(config.page_size, 40);
        assert_eq!(config.list_query().scanned, Some(false));
        assert_eq!(config.status_dismiss_delay(), Duration::from_secs(4));
    }

    #[test]
    fn page_size_is_clamped() {
        let config = WorkflowConfig::builder().page_size(1000).build().unwrap();
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
        let config = WorkflowConfig::builder().page_size(0).build().unwrap();
        assert_eq!(config.page_size, 1);
    }

    #[test]
    fn rejects_bad_urls() {
        let err = WorkflowConfig::builder()
            .api_base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidConfig(_)));

        let err = WorkflowConfig::builder()
            .api_base_url("ftp://example.com/api")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn rejects_zero_timeouts() {
        assert!(WorkflowConfig::builder()
            .scan_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_observer() {
        let config = WorkflowConfig::builder()
            .observer(std::sync::Arc::new(crate::observer::NoopObserver))
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("<dyn WorkflowObserver>"));
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 9).to_indices(4), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }
}

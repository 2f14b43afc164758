//! Folding scan results back into a document's page collection.
//!
//! Matching is by page id, never by position. A response that arrives for a
//! different document (or for pages that have since disappeared) simply
//! matches nothing, which is what makes a late response harmless even if it
//! slips past the controller's identity check.

use crate::model::{PdfDetail, ScanResponse};
use tracing::debug;

/// Produce a new [`PdfDetail`] with `response` applied.
///
/// For every page of `detail` that has a result in `response`, the page is
/// marked scanned and its extracted data replaced by the result's data.
/// All other pages pass through unchanged. Page count and order are
/// preserved; result ids unknown to `detail` are ignored. `detail` itself is
/// left untouched.
pub fn merge(detail: &PdfDetail, response: &ScanResponse) -> PdfDetail {
    let pages = detail
        .pages
        .iter()
        .map(|page| match response.result_for(page.id) {
            Some(result) => {
                let mut updated = page.clone();
                updated.scanned = true;
                updated.extracted_data = Some(result.extracted_data.clone());
                updated
            }
            None => page.clone(),
        })
        .collect();

    let merged = PdfDetail {
        id: detail.id,
        name: detail.name.clone(),
        pages,
    };

    debug!(
        "Merged scan response into document {}: {}/{} results matched",
        detail.id,
        matched_pages(detail, response),
        response.results.len()
    );

    merged
}

/// Number of pages of `detail` that `response` carries a result for.
pub fn matched_pages(detail: &PdfDetail, response: &ScanResponse) -> usize {
    detail
        .pages
        .iter()
        .filter(|p| response.result_for(p.id).is_some())
        .count()
}

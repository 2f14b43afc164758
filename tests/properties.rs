//! Property tests for the merge step, the page selection set and
//! selection reset on document activation.

use pdfscan_workflow::{
    merge, DocumentId, ExtractedData, FileSummary, PageDetail, PageId, PageSelection,
    PageSelectionSet, PaginationCursor, PdfDetail, ScanResponse, ScanResult, WorkflowController,
    WorkflowError, WorkflowState,
};
use proptest::collection::{btree_map, btree_set, vec};
use proptest::option;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn detail(page_ids: &[u64]) -> PdfDetail {
    PdfDetail {
        id: DocumentId(7),
        name: "doc.pdf".into(),
        pages: page_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| PageDetail {
                id: PageId(id),
                page_number: i + 1,
                thumbnail_ref: None,
                high_res_ref: None,
                scanned: false,
                extracted_data: None,
            })
            .collect(),
    }
}

/// Pages keyed by id, each carrying a prior `scanned` flag and extracted content.
fn detail_with_history(pages: &BTreeMap<u64, (bool, Option<String>)>) -> PdfDetail {
    PdfDetail {
        id: DocumentId(7),
        name: "doc.pdf".into(),
        pages: pages
            .iter()
            .enumerate()
            .map(|(i, (&id, (scanned, content)))| PageDetail {
                id: PageId(id),
                page_number: i + 1,
                thumbnail_ref: None,
                high_res_ref: None,
                scanned: *scanned,
                extracted_data: content.as_ref().map(|c| ExtractedData {
                    content: c.clone(),
                    ..Default::default()
                }),
            })
            .collect(),
    }
}

fn numbered(id: u64, pages: usize, first_page: u64) -> PdfDetail {
    let ids: Vec<u64> = (0..pages as u64).map(|i| first_page + i).collect();
    PdfDetail {
        id: DocumentId(id),
        name: format!("{id}.pdf"),
        ..detail(&ids)
    }
}

fn listed_controller() -> WorkflowController {
    let mut c = WorkflowController::default();
    let items = (1..=2)
        .map(|id| FileSummary {
            id: DocumentId(id),
            name: format!("{id}.pdf"),
            page_count: 40,
            scanned: false,
        })
        .collect();
    let req = c.begin_load().unwrap();
    c.finish_load(req, Ok(PaginationCursor::from_items(items)))
        .unwrap();
    c
}

fn activate(c: &mut WorkflowController, doc: PdfDetail) {
    let req = c.begin_select(doc.id).unwrap();
    c.finish_select(req, Ok(doc)).unwrap();
}

fn page_selection() -> impl Strategy<Value = PageSelection> {
    prop_oneof![
        Just(PageSelection::All),
        (1usize..=40, 1usize..=40).prop_map(|(a, b)| PageSelection::Range(a.min(b), a.max(b))),
        vec(1usize..=40, 0..40).prop_map(PageSelection::Set),
    ]
}

fn response(result_ids: &[u64]) -> ScanResponse {
    ScanResponse {
        status: "Processing complete".into(),
        results: result_ids
            .iter()
            .map(|&id| ScanResult {
                page_id: PageId(id),
                extracted_data: ExtractedData {
                    content: format!("page {id}"),
                    ..Default::default()
                },
                cost: 0.0,
                processing_time_ms: 0,
                scanned: true,
            })
            .collect(),
    }
}

proptest! {
    #[test]
    fn merge_preserves_length_and_order(
        pages in btree_set(0u64..200, 0..30),
        results in vec(0u64..400, 0..30),
    ) {
        let pages: Vec<u64> = pages.into_iter().collect();
        let before = detail(&pages);
        let after = merge(&before, &response(&results));

        prop_assert_eq!(after.id, before.id);
        let ids: Vec<PageId> = after.pages.iter().map(|p| p.id).collect();
        let expected: Vec<PageId> = before.pages.iter().map(|p| p.id).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn merge_touches_only_pages_with_results(
        pages in btree_set(0u64..200, 0..30),
        results in vec(0u64..400, 0..30),
    ) {
        let pages: Vec<u64> = pages.into_iter().collect();
        let before = detail(&pages);
        let after = merge(&before, &response(&results));

        for (old, new) in before.pages.iter().zip(&after.pages) {
            if results.contains(&old.id.0) {
                prop_assert!(new.scanned);
                prop_assert_eq!(
                    new.extracted_data.as_ref().map(|d| d.content.clone()),
                    Some(format!("page {}", old.id))
                );
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn merge_leaves_prior_results_alone_without_a_match(
        pages in btree_map(0u64..200, (any::<bool>(), option::of("[a-z ]{0,8}")), 0..30),
        results in vec(0u64..400, 0..30),
    ) {
        let before = detail_with_history(&pages);
        let after = merge(&before, &response(&results));

        prop_assert_eq!(after.pages.len(), before.pages.len());
        for (old, new) in before.pages.iter().zip(&after.pages) {
            if results.contains(&old.id.0) {
                prop_assert!(new.scanned);
                prop_assert_eq!(
                    new.extracted_data.as_ref().map(|d| d.content.clone()),
                    Some(format!("page {}", old.id))
                );
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn activating_a_document_clears_any_selection(
        first_pages in 1usize..=40,
        second_pages in 1usize..=40,
        pages in page_selection(),
        same_document in any::<bool>(),
    ) {
        let mut c = listed_controller();
        activate(&mut c, numbered(1, first_pages, 1000));
        let selected = c.select_pages(&pages).unwrap();
        prop_assert_eq!(selected, pages.to_indices(first_pages).len());

        let next = if same_document {
            numbered(1, second_pages, 3000)
        } else {
            numbered(2, second_pages, 2000)
        };
        activate(&mut c, next);

        prop_assert_eq!(c.state(), WorkflowState::Viewing);
        prop_assert!(c.selection().is_empty());
        let stale = c.toggle_page(PageId(1000));
        prop_assert!(matches!(stale, Err(WorkflowError::UnknownPage { .. })), "got {:?}", stale);
    }

    #[test]
    fn merge_is_idempotent(
        pages in btree_set(0u64..200, 0..30),
        results in vec(0u64..400, 0..30),
    ) {
        let pages: Vec<u64> = pages.into_iter().collect();
        let response = response(&results);
        let once = merge(&detail(&pages), &response);
        let twice = merge(&once, &response);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn double_toggle_restores_selection(
        initial in btree_set(0u64..50, 0..20),
        page in 0u64..50,
    ) {
        let mut set = PageSelectionSet::new();
        set.replace_with(initial.iter().map(|&id| PageId(id)));
        let before = set.clone();

        let selected = set.toggle(PageId(page));
        prop_assert_eq!(selected, !initial.contains(&page));
        set.toggle(PageId(page));
        prop_assert_eq!(set, before);
    }
}

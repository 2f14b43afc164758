//! The set of pages the user has chosen for the next scan.

use crate::model::PageId;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Page ids currently chosen for scanning.
///
/// Kept ordered so that [`snapshot`](PageSelectionSet::snapshot) is
/// deterministic: the scan payload lists pages in ascending id order no
/// matter in which order they were toggled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelectionSet {
    pages: BTreeSet<PageId>,
}

impl PageSelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns `true` if the page is selected afterwards.
    pub fn toggle(&mut self, id: PageId) -> bool {
        if self.pages.remove(&id) {
            false
        } else {
            self.pages.insert(id);
            true
        }
    }

    /// Empty the set.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Replace the whole selection at once.
    pub fn replace_with(&mut self, ids: impl IntoIterator<Item = PageId>) {
        self.pages = ids.into_iter().collect();
    }

    /// An immutable, ordered copy of the selection.
    ///
    /// The returned slice is detached from the set: later toggles do not
    /// change a snapshot that has already been handed to a scan request.
    pub fn snapshot(&self) -> Arc<[PageId]> {
        self.pages.iter().copied().collect()
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.pages.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PageId> + '_ {
        self.pages.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_membership() {
        let mut set = PageSelectionSet::new();
        assert!(set.toggle(PageId(10)));
        assert!(set.contains(PageId(10)));
        assert!(!set.toggle(PageId(10)));
        assert!(set.is_empty());
    }

    #[test]
    fn snapshot_is_ordered_and_detached() {
        let mut set = PageSelectionSet::new();
        set.toggle(PageId(12));
        set.toggle(PageId(3));
        let snap = set.snapshot();
        set.toggle(PageId(7));
        set.toggle(PageId(3));
        assert_eq!(&*snap, &[PageId(3), PageId(12)]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![PageId(7), PageId(12)]);
    }

    #[test]
    fn replace_with_deduplicates() {
        let mut set = PageSelectionSet::new();
        set.toggle(PageId(1));
        set.replace_with([PageId(5), PageId(4), PageId(5)]);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(PageId(1)));
    }
}

use crate::change::{Change, NO_INDEX};
use crate::changeset::ChangeSet;
use crate::key_value_collection::KeyValueCollection;
use std::hash::Hash;

/// A 1-indexed page request: `page=2, size=10` addresses the sorted
/// slice `[10, 20)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-indexed page number.
    pub page: isize,
    /// Items per page.
    pub size: isize,
}

impl PageRequest {
    fn is_valid(&self) -> bool {
        self.page >= 1 && self.size >= 1
    }
}

/// Describes the page currently materialised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageResponse {
    /// The requested page size.
    pub page_size: usize,
    /// Total number of items in the underlying sorted collection.
    pub total_size: usize,
    /// The 1-indexed page number this response covers.
    pub page: usize,
    /// Total number of pages at the current size.
    pub pages: usize,
}

/// Diffs two window contents, producing the minimal Add/Remove/Moved
/// set to transition from `before` to `after`. Shared by [`Page`] and
/// [`crate::operators::virtualise::Virtualise`].
pub(crate) fn diff_window<K, V>(before: &[(K, V)], after: &[(K, V)]) -> Vec<Change<K, V>>
where
    K: Clone + Eq,
    V: Clone,
{
    let mut out = Vec::new();
    for (old_index, (key, value)) in before.iter().enumerate() {
        if !after.iter().any(|(k, _)| k == key) {
            out.push(Change::remove(key.clone(), value.clone()).with_indices(NO_INDEX, old_index as isize));
        }
    }
    for (new_index, (key, value)) in after.iter().enumerate() {
        match before.iter().position(|(k, _)| k == key) {
            None => out.push(Change::add(key.clone(), value.clone()).with_indices(new_index as isize, NO_INDEX)),
            Some(old_index) if old_index != new_index => {
                out.push(Change::moved(key.clone(), value.clone(), new_index as isize, old_index as isize));
            }
            Some(_) => {}
        }
    }
    out
}

/// Presents a windowed, page-addressed view of a sorted collection.
pub struct Page<K, V> {
    request: Option<PageRequest>,
    window: Vec<(K, V)>,
}

impl<K, V> Page<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A page view with no request yet made.
    pub fn new() -> Self {
        Page {
            request: None,
            window: Vec::new(),
        }
    }

    /// Changes the requested page. Invalid requests (non-positive page
    /// or size) and requests identical to the current one are coalesced
    /// into a no-op (`None`).
    pub fn request(
        &mut self,
        request: PageRequest,
        collection: &KeyValueCollection<K, V>,
    ) -> Option<(PageResponse, ChangeSet<K, V>)> {
        if !request.is_valid() {
            return None;
        }
        if self.request.as_ref() == Some(&request) {
            return None;
        }
        self.request = Some(request);
        self.recompute(collection)
    }

    /// Recomputes the current page against a freshly sorted collection
    /// (called after every upstream sorted changeset).
    pub fn refresh(&mut self, collection: &KeyValueCollection<K, V>) -> Option<(PageResponse, ChangeSet<K, V>)> {
        if self.request.is_some() {
            self.recompute(collection)
        } else {
            None
        }
    }

    fn recompute(&mut self, collection: &KeyValueCollection<K, V>) -> Option<(PageResponse, ChangeSet<K, V>)> {
        let request = self.request.clone()?;
        let total = collection.len();
        let size = request.size as usize;
        let pages = if size == 0 { 0 } else { (total + size - 1) / size };
        let start = (request.page as usize - 1) * size;
        let new_window: Vec<(K, V)> = collection.slice(start, size).to_vec();

        let changes = diff_window(&self.window, &new_window);
        self.window = new_window;

        let response = PageResponse {
            page_size: size,
            total_size: total,
            page: request.page as usize,
            pages,
        };
        Some((response, ChangeSet::from_changes(changes)))
    }

    /// The items currently visible in the window.
    pub fn current(&self) -> &[(K, V)] {
        &self.window
    }
}

impl<K, V> Default for Page<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Page::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_value_collection::{SortOptimisations, SortReason};

    fn collection_of(n: i32) -> KeyValueCollection<i32, i32> {
        let items: Vec<(i32, i32)> = (0..n).map(|i| (i, i)).collect();
        KeyValueCollection::new(items, SortReason::InitialLoad, SortOptimisations::NONE)
    }

    #[test]
    fn page_two_of_ten_covers_expected_slice() {
        let mut page = Page::new();
        let (response, changes) = page
            .request(PageRequest { page: 2, size: 10 }, &collection_of(100))
            .unwrap();
        assert_eq!(response, PageResponse { page_size: 10, total_size: 100, page: 2, pages: 10 });
        assert_eq!(changes.counts().adds, 10);
        assert_eq!(page.current()[0], (10, 10));
        assert_eq!(page.current()[9], (19, 19));
    }

    #[test]
    fn identical_request_is_a_no_op() {
        let mut page = Page::new();
        page.request(PageRequest { page: 1, size: 10 }, &collection_of(100));
        assert!(page.request(PageRequest { page: 1, size: 10 }, &collection_of(100)).is_none());
    }

    #[test]
    fn invalid_request_is_rejected() {
        let mut page = Page::new();
        assert!(page.request(PageRequest { page: 0, size: 10 }, &collection_of(100)).is_none());
        assert!(page.request(PageRequest { page: 1, size: 0 }, &collection_of(100)).is_none());
    }
}

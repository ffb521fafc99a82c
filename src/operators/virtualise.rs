use crate::changeset::ChangeSet;
use crate::key_value_collection::KeyValueCollection;
use crate::operators::page::diff_window;
use std::hash::Hash;

/// A byte-offset-style window request: `[start_index, start_index + size)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualRequest {
    /// 0-indexed start of the window.
    pub start_index: isize,
    /// Number of items in the window.
    pub size: isize,
}

impl VirtualRequest {
    fn is_valid(&self) -> bool {
        self.start_index >= 0 && self.size >= 1
    }
}

/// Describes the window currently materialised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualResponse {
    /// 0-indexed start of the window.
    pub start_index: usize,
    /// Number of items in the window.
    pub size: usize,
    /// Total number of items in the underlying sorted collection.
    pub total_size: usize,
}

/// Presents a windowed, index-addressed view of a sorted collection —
/// [`crate::operators::page::Page`]'s counterpart for continuous
/// (virtual-scroll style) windows rather than discrete pages.
pub struct Virtualise<K, V> {
    request: Option<VirtualRequest>,
    window: Vec<(K, V)>,
}

impl<K, V> Virtualise<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A virtual view with no request yet made.
    pub fn new() -> Self {
        Virtualise {
            request: None,
            window: Vec::new(),
        }
    }

    /// Changes the requested window. Invalid requests (negative start
    /// or non-positive size) and requests identical to the current one
    /// are coalesced into a no-op (`None`).
    pub fn request(
        &mut self,
        request: VirtualRequest,
        collection: &KeyValueCollection<K, V>,
    ) -> Option<(VirtualResponse, ChangeSet<K, V>)> {
        if !request.is_valid() {
            return None;
        }
        if self.request.as_ref() == Some(&request) {
            return None;
        }
        self.request = Some(request);
        self.recompute(collection)
    }

    /// Recomputes the current window against a freshly sorted
    /// collection (called after every upstream sorted changeset).
    pub fn refresh(&mut self, collection: &KeyValueCollection<K, V>) -> Option<(VirtualResponse, ChangeSet<K, V>)> {
        if self.request.is_some() {
            self.recompute(collection)
        } else {
            None
        }
    }

    fn recompute(&mut self, collection: &KeyValueCollection<K, V>) -> Option<(VirtualResponse, ChangeSet<K, V>)> {
        let request = self.request.clone()?;
        let total = collection.len();
        let start = request.start_index as usize;
        let size = request.size as usize;
        let new_window: Vec<(K, V)> = collection.slice(start, size).to_vec();

        let changes = diff_window(&self.window, &new_window);
        self.window = new_window;

        let response = VirtualResponse {
            start_index: start,
            size,
            total_size: total,
        };
        Some((response, ChangeSet::from_changes(changes)))
    }

    /// The items currently visible in the window.
    pub fn current(&self) -> &[(K, V)] {
        &self.window
    }
}

impl<K, V> Default for Virtualise<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Virtualise::new()
    }
}

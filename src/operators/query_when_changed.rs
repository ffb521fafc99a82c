use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::ChangeReason;
use crate::changeset::ChangeSet;
use std::hash::Hash;

/// Exposes the current contents of a cache as a queryable snapshot,
/// refreshed after every batch (and, optionally, whenever an external
/// per-item "watched value" observable fires for a mutable value that
/// the changeset stream itself would not otherwise surface).
pub struct QueryWhenChanged<K, V> {
    snapshot: FxIndexMap<K, V>,
}

impl<K, V> QueryWhenChanged<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// An empty snapshot.
    pub fn new() -> Self {
        QueryWhenChanged {
            snapshot: FxIndexMap::default(),
        }
    }

    /// Applies an upstream changeset, returning the refreshed snapshot
    /// (in current insertion order) whenever the batch was non-empty.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> Option<Vec<(K, V)>> {
        if changes.is_empty() {
            return None;
        }
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    self.snapshot.insert(change.key().clone(), change.current().clone());
                }
                ChangeReason::Remove => {
                    self.snapshot.shift_remove(change.key());
                }
                ChangeReason::Moved => {}
            }
        }
        Some(self.current_vec())
    }

    /// Re-emits the full snapshot in response to an external
    /// watched-value observable firing for `key` (used for values whose
    /// mutation is not itself visible as an upstream changeset). A
    /// no-op if `key` is not currently present.
    pub fn notify_item_changed(&mut self, key: &K) -> Option<Vec<(K, V)>> {
        if self.snapshot.contains_key(key) {
            Some(self.current_vec())
        } else {
            None
        }
    }

    fn current_vec(&self) -> Vec<(K, V)> {
        self.snapshot.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// The current snapshot, without forcing a re-emit.
    pub fn current(&self) -> impl Iterator<Item = (&K, &V)> {
        self.snapshot.iter()
    }
}

impl<K, V> Default for QueryWhenChanged<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        QueryWhenChanged::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;

    #[test]
    fn process_returns_snapshot_after_nonempty_batch() {
        let mut query = QueryWhenChanged::new();
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, "a"));
        changes.push(Change::add(2, "b"));
        let snapshot = query.process(&changes).unwrap();
        assert_eq!(snapshot, vec![(1, "a"), (2, "b")]);
    }

    #[test]
    fn empty_batch_does_not_re_emit() {
        let mut query: QueryWhenChanged<i32, &str> = QueryWhenChanged::new();
        assert!(query.process(&ChangeSet::new()).is_none());
    }

    #[test]
    fn notify_item_changed_re_emits_for_present_key_only() {
        let mut query = QueryWhenChanged::new();
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, "a"));
        query.process(&changes);

        assert!(query.notify_item_changed(&1).is_some());
        assert!(query.notify_item_changed(&99).is_none());
    }
}

use crate::change::{ChangeReason, NO_INDEX};
use crate::changeset::ChangeSet;
use std::hash::Hash;

/// The sink surface a [`Bind`] drives. Implemented by whatever concrete
/// ordered collection a caller wants the cache mirrored into (a UI
/// list model, a `Vec`, ...). `index` is `Some` only when the upstream
/// change carried a known position (a sorted source); unsorted sources
/// drive `None` and the implementation is expected to locate by key.
pub trait Bindable<K, V> {
    /// Inserts a new entry, at `index` if known.
    fn insert_at(&mut self, index: Option<usize>, key: K, value: V);
    /// Removes the entry for `key`.
    fn remove_key(&mut self, key: &K);
    /// Replaces the value held for `key`.
    fn update_key(&mut self, key: &K, value: V);
    /// Repositions `key` to `new_index` without changing its value.
    fn move_key(&mut self, key: &K, new_index: usize);
    /// Removes every entry.
    fn clear(&mut self);
}

/// Applies changesets to an external [`Bindable`] collection, either
/// incrementally (one `Bindable` call per `Change`) or, once a batch's
/// size exceeds `reset_threshold`, by clearing and refilling wholesale
/// — cheaper than replaying a very large diff entry by entry, mirroring
/// the full-resort threshold `Sort` itself uses.
pub struct Bind {
    reset_threshold: usize,
}

impl Bind {
    /// Batches with more than `reset_threshold` changes are applied by
    /// clear-then-refill rather than incrementally.
    pub fn new(reset_threshold: usize) -> Self {
        Bind { reset_threshold }
    }

    /// Applies `changes` to `target`. `full_snapshot` is called only
    /// when the reset path is taken, so callers that never cross the
    /// threshold never pay for computing it.
    pub fn apply<K, V, T>(&self, target: &mut T, changes: &ChangeSet<K, V>, full_snapshot: impl FnOnce() -> Vec<(K, V)>)
    where
        K: Clone + Eq + Hash,
        V: Clone,
        T: Bindable<K, V>,
    {
        if changes.len() > self.reset_threshold {
            target.clear();
            for (key, value) in full_snapshot() {
                target.insert_at(None, key, value);
            }
            return;
        }

        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    target.insert_at(index_of(change.current_index()), change.key().clone(), change.current().clone());
                }
                ChangeReason::Update | ChangeReason::Refresh => {
                    target.update_key(change.key(), change.current().clone());
                }
                ChangeReason::Remove => {
                    target.remove_key(change.key());
                }
                ChangeReason::Moved => {
                    let new_index = index_of(change.current_index()).unwrap_or(0);
                    target.move_key(change.key(), new_index);
                }
            }
        }
    }
}

fn index_of(index: isize) -> Option<usize> {
    if index == NO_INDEX {
        None
    } else {
        Some(index as usize)
    }
}

/// A `Vec`-backed [`Bindable`] useful for tests and simple embeddings;
/// key lookups are linear, which is fine at the scale a demo or test
/// target needs.
#[derive(Debug, Default)]
pub struct VecTarget<K, V>(pub Vec<(K, V)>);

impl<K, V> Bindable<K, V> for VecTarget<K, V>
where
    K: Clone + Eq,
{
    fn insert_at(&mut self, index: Option<usize>, key: K, value: V) {
        match index {
            Some(index) if index <= self.0.len() => self.0.insert(index, (key, value)),
            _ => self.0.push((key, value)),
        }
    }

    fn remove_key(&mut self, key: &K) {
        self.0.retain(|(k, _)| k != key);
    }

    fn update_key(&mut self, key: &K, value: V) {
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        }
    }

    fn move_key(&mut self, key: &K, new_index: usize) {
        if let Some(old_index) = self.0.iter().position(|(k, _)| k == key) {
            let entry = self.0.remove(old_index);
            let new_index = new_index.min(self.0.len());
            self.0.insert(new_index, entry);
        }
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;

    #[test]
    fn incremental_add_inserts_at_known_index() {
        let bind = Bind::new(100);
        let mut target = VecTarget::default();
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, "a").with_indices(0, NO_INDEX));
        changes.push(Change::add(2, "b").with_indices(1, NO_INDEX));
        bind.apply(&mut target, &changes, Vec::new);
        assert_eq!(target.0, vec![(1, "a"), (2, "b")]);
    }

    #[test]
    fn batch_over_threshold_resets_wholesale() {
        let bind = Bind::new(1);
        let mut target = VecTarget(vec![(9, "stale")]);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, "a"));
        changes.push(Change::add(2, "b"));
        bind.apply(&mut target, &changes, || vec![(1, "a"), (2, "b")]);
        assert_eq!(target.0, vec![(1, "a"), (2, "b")]);
    }

    #[test]
    fn remove_locates_by_key() {
        let bind = Bind::new(100);
        let mut target = VecTarget(vec![(1, "a"), (2, "b")]);
        let mut changes = ChangeSet::new();
        changes.push(Change::remove(1, "a"));
        bind.apply(&mut target, &changes, Vec::new);
        assert_eq!(target.0, vec![(2, "b")]);
    }
}

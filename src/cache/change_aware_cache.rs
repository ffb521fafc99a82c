use crate::change::Change;
use crate::changeset::ChangeSet;
use indexmap::map::Entry;
use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::hash::{BuildHasherDefault, Hash};

pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// The net effect a key has undergone since the last [`ChangeAwareCache::capture_changes`].
///
/// Tracking the *net* effect (rather than a literal log of every
/// intermediate mutation) is what lets an add-then-remove of the same
/// key within one batch collapse to nothing.
#[derive(Clone, Debug)]
enum NetEffect<V> {
    /// Absent before this batch, present now.
    Add(V),
    /// Present before this batch with `before`, present now with `after`.
    Update { before: V, after: V },
    /// Present before this batch with this value, absent now.
    Remove(V),
    /// Present before and after this batch with the same value, but a
    /// `refresh` was requested.
    Refresh(V),
}

/// A mutable keyed store that records every mutation into a pending
/// change list rather than emitting anything itself; emission is the
/// caller's concern.
#[derive(Clone, Debug)]
pub struct ChangeAwareCache<K, V> {
    store: FxIndexMap<K, V>,
    pending: FxIndexMap<K, NetEffect<V>>,
}

impl<K, V> ChangeAwareCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// An empty cache.
    pub fn new() -> Self {
        ChangeAwareCache {
            store: FxIndexMap::default(),
            pending: FxIndexMap::default(),
        }
    }

    /// Looks up the current value for `key`, ignoring any uncaptured
    /// pending changes (the store is always kept up to date eagerly).
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.store.get(key)
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Iterates current entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.store.iter()
    }

    /// Current keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.store.keys()
    }

    /// Inserts `value` for `key`, recording an `Add` if the key was
    /// absent or an `Update` (with the replaced value) if present.
    pub fn add_or_update(&mut self, key: K, value: V) {
        let existed = self.store.contains_key(&key);
        let old = self.store.insert(key.clone(), value.clone());

        match self.pending.entry(key) {
            Entry::Occupied(mut entry) => {
                let before = match entry.get() {
                    NetEffect::Add(_) => None,
                    NetEffect::Update { before, .. } => Some(before.clone()),
                    NetEffect::Remove(before) => Some(before.clone()),
                    NetEffect::Refresh(before) => Some(before.clone()),
                };
                match before {
                    None => entry.insert(NetEffect::Add(value)),
                    Some(before) => entry.insert(NetEffect::Update { before, after: value }),
                };
            }
            Entry::Vacant(entry) => {
                if existed {
                    entry.insert(NetEffect::Update {
                        before: old.expect("existed implies old value present"),
                        after: value,
                    });
                } else {
                    entry.insert(NetEffect::Add(value));
                }
            }
        }
    }

    /// Removes `key` if present, recording a `Remove` with the value
    /// that was there. No-op (and no change recorded) if absent.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let old = self.store.shift_remove(key)?;

        match self.pending.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let before = match entry.get() {
                    NetEffect::Add(_) => None,
                    NetEffect::Update { before, .. } => Some(before.clone()),
                    NetEffect::Remove(_) => {
                        unreachable!("store cannot hold a key already marked Removed this batch")
                    }
                    NetEffect::Refresh(before) => Some(before.clone()),
                };
                match before {
                    None => {
                        entry.remove();
                    }
                    Some(before) => {
                        entry.insert(NetEffect::Remove(before));
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(NetEffect::Remove(old.clone()));
            }
        }

        Some(old)
    }

    /// Removes every key in `keys`, in order.
    pub fn remove_many(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.remove(&key);
        }
    }

    /// Marks `key` for re-evaluation without changing its value.
    /// No-op if the key is absent.
    pub fn refresh(&mut self, key: &K) {
        if let Some(value) = self.store.get(key).cloned() {
            self.pending
                .entry(key.clone())
                .or_insert(NetEffect::Refresh(value));
        }
    }

    /// Marks every key in `keys` for re-evaluation.
    pub fn refresh_many(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.refresh(&key);
        }
    }

    /// Marks every currently held key for re-evaluation.
    pub fn refresh_all(&mut self) {
        let keys: Vec<K> = self.store.keys().cloned().collect();
        self.refresh_many(keys);
    }

    /// Removes every entry, recording a `Remove` for each.
    pub fn clear(&mut self) {
        let keys: Vec<K> = self.store.keys().cloned().collect();
        self.remove_many(keys);
    }

    /// Replays a foreign changeset against this cache, recording the
    /// equivalent net-effect mutations. `Moved` changes are ignored:
    /// this cache is unordered and has no notion of position.
    pub fn clone_changes(&mut self, changes: &ChangeSet<K, V>) {
        for change in changes.iter() {
            match change.reason() {
                crate::change::ChangeReason::Add | crate::change::ChangeReason::Update => {
                    self.add_or_update(change.key().clone(), change.current().clone());
                }
                crate::change::ChangeReason::Remove => {
                    self.remove(change.key());
                }
                crate::change::ChangeReason::Refresh => {
                    self.refresh(change.key());
                }
                crate::change::ChangeReason::Moved => {}
            }
        }
    }

    /// Returns the changeset accumulated since the last call, then
    /// resets the accumulator. The cache itself never emits; this is
    /// purely a pull of recorded mutations for the caller to publish.
    pub fn capture_changes(&mut self) -> ChangeSet<K, V> {
        let pending = std::mem::take(&mut self.pending);
        let mut changes = Vec::with_capacity(pending.len());
        for (key, effect) in pending {
            let change = match effect {
                NetEffect::Add(value) => Change::add(key, value),
                NetEffect::Update { before, after } => Change::update(key, after, before),
                NetEffect::Remove(value) => Change::remove(key, value),
                NetEffect::Refresh(value) => Change::refresh(key, value),
            };
            changes.push(change);
        }
        ChangeSet::from_changes(changes)
    }
}

impl<K, V> Default for ChangeAwareCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        ChangeAwareCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_update_reports_previous_value() {
        let mut cache = ChangeAwareCache::new();
        cache.add_or_update("a", 1);
        let added = cache.capture_changes();
        assert_eq!(added.counts().adds, 1);

        cache.add_or_update("a", 2);
        let updated = cache.capture_changes();
        assert_eq!(updated.counts().updates, 1);
        let change = &updated.iter().next().unwrap();
        assert_eq!(*change.previous().unwrap(), 1);
        assert_eq!(*change.current(), 2);
    }

    #[test]
    fn add_then_remove_in_same_batch_nets_to_nothing() {
        let mut cache = ChangeAwareCache::new();
        cache.add_or_update("a", 1);
        cache.remove(&"a");
        let changes = cache.capture_changes();
        assert!(changes.is_empty());
        assert!(cache.lookup(&"a").is_none());
    }

    #[test]
    fn update_then_remove_in_same_batch_nets_to_remove_of_original() {
        let mut cache = ChangeAwareCache::new();
        cache.add_or_update("a", 1);
        cache.capture_changes();

        cache.add_or_update("a", 2);
        cache.remove(&"a");
        let changes = cache.capture_changes();
        assert_eq!(changes.counts().removes, 1);
        assert_eq!(*changes.iter().next().unwrap().current(), 1);
    }

    #[test]
    fn remove_of_absent_key_is_a_no_op() {
        let mut cache: ChangeAwareCache<&str, i32> = ChangeAwareCache::new();
        cache.remove(&"missing");
        assert!(cache.capture_changes().is_empty());
    }

    #[test]
    fn refresh_emits_for_every_current_entry() {
        let mut cache = ChangeAwareCache::new();
        cache.add_or_update("a", 1);
        cache.add_or_update("b", 2);
        cache.capture_changes();

        cache.refresh_all();
        let changes = cache.capture_changes();
        assert_eq!(changes.counts().refreshes, 2);
    }
}

use crate::cache::change_aware_cache::ChangeAwareCache;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;
use std::sync::Arc;

/// Predicate shared across clones of a filter operator and its
/// subscribers.
pub type Predicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Applies a single upstream `change` to `filtered`, a `ChangeAwareCache`
/// tracking which keys currently satisfy `predicate`. Shared by
/// [`StaticFilter`], [`DynamicFilter`], and
/// [`crate::cache::ObservableCache::connect`]'s per-subscriber filtering.
pub fn apply_filter_change<K, V>(
    filtered: &mut ChangeAwareCache<K, V>,
    predicate: &(dyn Fn(&V) -> bool),
    change: &Change<K, V>,
) where
    K: Clone + Eq + Hash,
    V: Clone,
{
    match change.reason() {
        ChangeReason::Add => {
            if predicate(change.current()) {
                filtered.add_or_update(change.key().clone(), change.current().clone());
            }
        }
        ChangeReason::Update => {
            let now_matches = predicate(change.current());
            let was_included = filtered.lookup(change.key()).is_some();
            if now_matches {
                filtered.add_or_update(change.key().clone(), change.current().clone());
            } else if was_included {
                filtered.remove(change.key());
            }
        }
        ChangeReason::Remove => {
            filtered.remove(change.key());
        }
        ChangeReason::Refresh => {
            let now_matches = predicate(change.current());
            let was_included = filtered.lookup(change.key()).is_some();
            if now_matches && !was_included {
                filtered.add_or_update(change.key().clone(), change.current().clone());
            } else if !now_matches && was_included {
                filtered.remove(change.key());
            } else if now_matches && was_included {
                filtered.refresh(change.key());
            }
        }
        ChangeReason::Moved => {}
    }
}

/// Produces a changeset containing only items matching a predicate
/// fixed at construction.
pub struct StaticFilter<K, V> {
    predicate: Predicate<V>,
    filtered: ChangeAwareCache<K, V>,
}

impl<K, V> StaticFilter<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A filter over `predicate`, with no items yet observed.
    pub fn new(predicate: Predicate<V>) -> Self {
        StaticFilter {
            predicate,
            filtered: ChangeAwareCache::new(),
        }
    }

    /// Primes the filter with an initial snapshot, as if each pair had
    /// arrived as an `Add`. Returns the initial filtered changeset.
    pub fn seed(&mut self, initial: impl IntoIterator<Item = (K, V)>) -> ChangeSet<K, V> {
        for (key, value) in initial {
            if (self.predicate)(&value) {
                self.filtered.add_or_update(key, value);
            }
        }
        self.filtered.capture_changes()
    }

    /// Applies an upstream changeset, producing the downstream filtered
    /// changeset (possibly empty).
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<K, V> {
        for change in changes.iter() {
            apply_filter_change(&mut self.filtered, &*self.predicate, change);
        }
        self.filtered.capture_changes()
    }

    /// The current filtered membership, for `preview`-style reads.
    pub fn current(&self) -> impl Iterator<Item = (&K, &V)> {
        self.filtered.iter()
    }
}

/// Like [`StaticFilter`], but the predicate may be replaced at runtime,
/// in which case every upstream item is re-evaluated against the new
/// predicate.
pub struct DynamicFilter<K, V> {
    predicate: Predicate<V>,
    /// Mirrors every upstream item regardless of predicate, so a
    /// predicate change has something to re-evaluate against.
    source: ChangeAwareCache<K, V>,
    filtered: ChangeAwareCache<K, V>,
}

impl<K, V> DynamicFilter<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A dynamic filter starting with `predicate`.
    pub fn new(predicate: Predicate<V>) -> Self {
        DynamicFilter {
            predicate,
            source: ChangeAwareCache::new(),
            filtered: ChangeAwareCache::new(),
        }
    }

    /// Primes the filter with an initial snapshot.
    pub fn seed(&mut self, initial: impl IntoIterator<Item = (K, V)>) -> ChangeSet<K, V> {
        for (key, value) in initial {
            self.source.add_or_update(key.clone(), value.clone());
            if (self.predicate)(&value) {
                self.filtered.add_or_update(key, value);
            }
        }
        self.source.capture_changes();
        self.filtered.capture_changes()
    }

    /// Applies an upstream changeset under the current predicate.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<K, V> {
        self.source.clone_changes(changes);
        self.source.capture_changes();
        for change in changes.iter() {
            apply_filter_change(&mut self.filtered, &*self.predicate, change);
        }
        self.filtered.capture_changes()
    }

    /// Replaces the predicate and re-evaluates every mirrored upstream
    /// item against it, emitting only the Add/Remove/Update set needed
    /// to reach the new filtered membership.
    pub fn set_predicate(&mut self, predicate: Predicate<V>) -> ChangeSet<K, V> {
        self.predicate = predicate;
        let snapshot: Vec<(K, V)> = self.source.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (key, value) in snapshot {
            let matches = (self.predicate)(&value);
            let was_included = self.filtered.lookup(&key).is_some();
            if matches {
                self.filtered.add_or_update(key, value);
            } else if was_included {
                self.filtered.remove(&key);
            }
        }
        self.filtered.capture_changes()
    }

    /// The current filtered membership.
    pub fn current(&self) -> impl Iterator<Item = (&K, &V)> {
        self.filtered.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_filter_toggles_membership_on_update() {
        let mut filter = StaticFilter::new(Arc::new(|v: &i32| v % 2 == 0));
        let seed = filter.seed((1..=10).map(|n| (n, n)));
        assert_eq!(seed.counts().adds, 5);

        let mut changes = ChangeSet::new();
        changes.push(Change::update(1, 2, 1));
        let out = filter.process(&changes);
        assert_eq!(out.counts().adds, 1);
        assert_eq!(*out.iter().next().unwrap().current(), 2);
    }

    #[test]
    fn dynamic_filter_reapplies_predicate_without_resending_common_items() {
        let mut filter = DynamicFilter::new(Arc::new(|v: &i32| *v % 2 == 0));
        filter.seed((1..=10).map(|n| (n, n)));

        let out = filter.set_predicate(Arc::new(|v: &i32| *v > 5));
        // {2,4,6,8,10} -> {6,7,8,9,10}: adds {7,9}, removes {2,4}
        assert_eq!(out.counts().adds, 2);
        assert_eq!(out.counts().removes, 2);
        let remaining: Vec<i32> = filter.current().map(|(_, v)| *v).collect();
        let mut remaining = remaining;
        remaining.sort_unstable();
        assert_eq!(remaining, vec![6, 7, 8, 9, 10]);
    }
}

use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;

/// Follows an observable-of-caches, always mirroring whichever inner
/// cache is current. Arrival of a new inner cache is a hard
/// switch-over: the entire old contents are retired and the new
/// snapshot loaded in their place, emitted as one clear-then-load
/// changeset rather than a diff against the old contents.
pub struct Switch<K, V> {
    current: FxIndexMap<K, V>,
}

impl<K, V> Switch<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A switch with no inner cache yet.
    pub fn new() -> Self {
        Switch {
            current: FxIndexMap::default(),
        }
    }

    /// Switches to a newly arrived inner cache's snapshot, retiring
    /// whatever was previously mirrored.
    pub fn switch_to(&mut self, new_snapshot: Vec<(K, V)>) -> ChangeSet<K, V> {
        let old = std::mem::take(&mut self.current);
        let mut out = Vec::with_capacity(old.len() + new_snapshot.len());
        for (key, value) in old {
            out.push(Change::remove(key, value));
        }
        for (key, value) in new_snapshot {
            self.current.insert(key.clone(), value.clone());
            out.push(Change::add(key, value));
        }
        ChangeSet::from_changes(out)
    }

    /// Forwards a changeset from the currently-subscribed inner cache,
    /// keeping the mirrored snapshot in sync.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) {
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    self.current.insert(change.key().clone(), change.current().clone());
                }
                ChangeReason::Remove => {
                    self.current.shift_remove(change.key());
                }
                ChangeReason::Moved => {}
            }
        }
    }

    /// The currently mirrored snapshot.
    pub fn current(&self) -> impl Iterator<Item = (&K, &V)> {
        self.current.iter()
    }
}

impl<K, V> Default for Switch<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Switch::new()
    }
}

use crate::change::{Change, ChangeReason};
use std::ops::Index;
use std::slice::Iter;

/// Per-reason counts for a [`ChangeSet`], computed once as changes are
/// appended rather than re-derived on every read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSetCounts {
    /// Number of `Add` changes.
    pub adds: usize,
    /// Number of `Update` changes.
    pub updates: usize,
    /// Number of `Remove` changes.
    pub removes: usize,
    /// Number of `Refresh` changes.
    pub refreshes: usize,
    /// Number of `Moved` changes.
    pub moves: usize,
}

impl ChangeSetCounts {
    /// Total number of changes these counts describe.
    pub fn total(&self) -> usize {
        self.adds + self.updates + self.removes + self.refreshes + self.moves
    }

    fn record(&mut self, reason: ChangeReason) {
        match reason {
            ChangeReason::Add => self.adds += 1,
            ChangeReason::Update => self.updates += 1,
            ChangeReason::Remove => self.removes += 1,
            ChangeReason::Refresh => self.refreshes += 1,
            ChangeReason::Moved => self.moves += 1,
        }
    }
}

/// An ordered batch of per-key [`Change`]s produced by one edit.
///
/// Ordering within the set is the order the mutations were applied in;
/// this is what lets a fresh subscriber replay the set against an empty
/// cache and land on the same state as the publisher.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet<K, V> {
    changes: Vec<Change<K, V>>,
    counts: ChangeSetCounts,
}

impl<K, V> ChangeSet<K, V> {
    /// An empty changeset.
    pub fn new() -> Self {
        ChangeSet {
            changes: Vec::new(),
            counts: ChangeSetCounts::default(),
        }
    }

    /// An empty changeset with room for `capacity` changes.
    pub fn with_capacity(capacity: usize) -> Self {
        ChangeSet {
            changes: Vec::with_capacity(capacity),
            counts: ChangeSetCounts::default(),
        }
    }

    /// Appends a change, updating the precomputed counts.
    pub fn push(&mut self, change: Change<K, V>) {
        self.counts.record(change.reason());
        self.changes.push(change);
    }

    /// True if this changeset carries no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes in the set.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The precomputed per-reason counts.
    pub fn counts(&self) -> ChangeSetCounts {
        self.counts
    }

    /// Iterates the changes in mutation order.
    pub fn iter(&self) -> Iter<'_, Change<K, V>> {
        self.changes.iter()
    }

    /// Appends every change from `other` onto `self`, in order.
    pub fn extend(&mut self, other: ChangeSet<K, V>) {
        for change in other.changes {
            self.push(change);
        }
    }

    /// Builds a changeset directly from a vector of changes, computing
    /// counts in one pass. Used when a whole batch is constructed ahead
    /// of time (e.g. a `Reset` sort changeset).
    pub fn from_changes(changes: Vec<Change<K, V>>) -> Self {
        let mut counts = ChangeSetCounts::default();
        for change in &changes {
            counts.record(change.reason());
        }
        ChangeSet { changes, counts }
    }

    /// Consumes the changeset, returning its changes in order.
    pub fn into_changes(self) -> Vec<Change<K, V>> {
        self.changes
    }
}

impl<K, V> IntoIterator for ChangeSet<K, V> {
    type Item = Change<K, V>;
    type IntoIter = std::vec::IntoIter<Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a ChangeSet<K, V> {
    type Item = &'a Change<K, V>;
    type IntoIter = Iter<'a, Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<K, V> Index<usize> for ChangeSet<K, V> {
    type Output = Change<K, V>;

    fn index(&self, index: usize) -> &Change<K, V> {
        &self.changes[index]
    }
}

impl<K, V> FromIterator<Change<K, V>> for ChangeSet<K, V> {
    fn from_iter<T: IntoIterator<Item = Change<K, V>>>(iter: T) -> Self {
        let mut set = ChangeSet::new();
        for change in iter {
            set.push(change);
        }
        set
    }
}

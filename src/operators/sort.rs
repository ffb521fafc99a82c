use crate::change::{Change, ChangeReason, NO_INDEX};
use crate::changeset::ChangeSet;
use crate::key_value_collection::{KeyValueCollection, SortOptimisations, SortReason};
use std::cmp::Ordering;
use std::hash::Hash;
use std::sync::Arc;

/// Comparer type shared across a `Sort`'s lifetime and any clones of it
/// (e.g. for a comparer-change controller).
pub type Comparer<V> = Arc<dyn Fn(&V, &V) -> Ordering + Send + Sync>;

/// Maintains an ordered [`KeyValueCollection`] over an upstream,
/// unsorted changeset stream, emitting `Moved` entries as positions
/// shift.
pub struct Sort<K, V> {
    comparer: Comparer<V>,
    optimisations: SortOptimisations,
    reset_threshold: usize,
    items: Vec<(K, V)>,
}

impl<K, V> Sort<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A sort over `comparer`, resorting wholesale whenever a batch
    /// exceeds `reset_threshold` changes rather than repositioning
    /// each affected item individually.
    pub fn new(comparer: Comparer<V>, optimisations: SortOptimisations, reset_threshold: usize) -> Self {
        Sort {
            comparer,
            optimisations,
            reset_threshold,
            items: Vec::new(),
        }
    }

    fn position_of(&self, key: &K) -> Option<usize> {
        self.items.iter().position(|(k, _)| k == key)
    }

    /// Insertion point for `value` in the (always fully sorted) items
    /// vector, located by binary search.
    fn insertion_point(&self, value: &V) -> usize {
        match self.items.binary_search_by(|(_, v)| (self.comparer)(v, value)) {
            Ok(pos) | Err(pos) => pos,
        }
    }

    /// Applies an upstream changeset, returning the current ordered
    /// snapshot and the downstream changeset carrying position
    /// information.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> (KeyValueCollection<K, V>, ChangeSet<K, V>) {
        if changes.len() > self.reset_threshold {
            return self.apply_full_resort(changes, SortReason::Reset);
        }
        self.apply_incremental(changes)
    }

    fn apply_incremental(&mut self, changes: &ChangeSet<K, V>) -> (KeyValueCollection<K, V>, ChangeSet<K, V>) {
        let mut out = Vec::with_capacity(changes.len());
        let ignore_refreshes = self.optimisations.contains(SortOptimisations::IGNORE_REFRESHES);

        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let pos = self.insertion_point(change.current());
                    self.items.insert(pos, (change.key().clone(), change.current().clone()));
                    out.push(
                        Change::add(change.key().clone(), change.current().clone())
                            .with_indices(pos as isize, NO_INDEX),
                    );
                }
                ChangeReason::Remove => {
                    if let Some(old_pos) = self.position_of(change.key()) {
                        self.items.remove(old_pos);
                        out.push(
                            Change::remove(change.key().clone(), change.current().clone())
                                .with_indices(NO_INDEX, old_pos as isize),
                        );
                    }
                }
                ChangeReason::Update => {
                    let old_pos = self.position_of(change.key());
                    if let Some(pos) = old_pos {
                        self.items.remove(pos);
                    }
                    let new_pos = self.insertion_point(change.current());
                    self.items.insert(new_pos, (change.key().clone(), change.current().clone()));
                    let previous_index = old_pos.map(|p| p as isize).unwrap_or(NO_INDEX);
                    out.push(
                        Change::update(
                            change.key().clone(),
                            change.current().clone(),
                            change.previous().cloned().expect("Update change always carries a previous value"),
                        )
                        .with_indices(new_pos as isize, previous_index),
                    );
                }
                ChangeReason::Refresh => {
                    let old_pos = self.position_of(change.key());
                    let old_pos = match old_pos {
                        Some(pos) => pos,
                        None => continue,
                    };
                    if ignore_refreshes {
                        out.push(
                            Change::refresh(change.key().clone(), change.current().clone())
                                .with_indices(old_pos as isize, old_pos as isize),
                        );
                        continue;
                    }
                    self.items.remove(old_pos);
                    let new_pos = self.insertion_point(change.current());
                    self.items.insert(new_pos, (change.key().clone(), change.current().clone()));
                    if new_pos != old_pos {
                        out.push(Change::moved(
                            change.key().clone(),
                            change.current().clone(),
                            new_pos as isize,
                            old_pos as isize,
                        ));
                    } else {
                        out.push(
                            Change::refresh(change.key().clone(), change.current().clone())
                                .with_indices(new_pos as isize, old_pos as isize),
                        );
                    }
                }
                ChangeReason::Moved => {}
            }
        }

        let snapshot = KeyValueCollection::new(self.items.clone(), SortReason::DataChanged, self.optimisations);
        (snapshot, ChangeSet::from_changes(out))
    }

    fn apply_full_resort(&mut self, changes: &ChangeSet<K, V>, reason: SortReason) -> (KeyValueCollection<K, V>, ChangeSet<K, V>) {
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => self.items.push((change.key().clone(), change.current().clone())),
                ChangeReason::Update => {
                    if let Some(pos) = self.position_of(change.key()) {
                        self.items[pos].1 = change.current().clone();
                    }
                }
                ChangeReason::Remove => {
                    if let Some(pos) = self.position_of(change.key()) {
                        self.items.remove(pos);
                    }
                }
                ChangeReason::Refresh | ChangeReason::Moved => {}
            }
        }

        let comparer = self.comparer.clone();
        self.items.sort_by(|(_, a), (_, b)| comparer(a, b));

        let mut out = Vec::with_capacity(changes.len());
        for change in changes.iter() {
            if change.reason() == ChangeReason::Remove {
                out.push(change.clone().with_indices(NO_INDEX, NO_INDEX));
                continue;
            }
            let pos = self.position_of(change.key()).map(|p| p as isize).unwrap_or(NO_INDEX);
            out.push(change.clone().with_indices(pos, NO_INDEX));
        }

        let snapshot = KeyValueCollection::new(self.items.clone(), reason, self.optimisations);
        (snapshot, ChangeSet::from_changes(out))
    }

    fn diff_positions(before: &[(K, V)], after: &[(K, V)]) -> Vec<Change<K, V>> {
        let mut moves = Vec::new();
        for (new_pos, (key, value)) in after.iter().enumerate() {
            if let Some(old_pos) = before.iter().position(|(k, _)| k == key) {
                if old_pos != new_pos {
                    moves.push(Change::moved(key.clone(), value.clone(), new_pos as isize, old_pos as isize));
                }
            }
        }
        moves
    }

    /// Replaces the comparer and resorts the whole collection, emitting
    /// `Moved` entries for items whose position changed.
    pub fn set_comparer(&mut self, comparer: Comparer<V>) -> (KeyValueCollection<K, V>, ChangeSet<K, V>) {
        let before = self.items.clone();
        self.comparer = comparer;
        let comparer = self.comparer.clone();
        self.items.sort_by(|(_, a), (_, b)| comparer(a, b));
        let moves = Self::diff_positions(&before, &self.items);
        let snapshot = KeyValueCollection::new(self.items.clone(), SortReason::ComparerChanged, self.optimisations);
        (snapshot, ChangeSet::from_changes(moves))
    }

    /// Re-sorts without any upstream data change (e.g. an external
    /// "sort again" signal), emitting `Moved` entries for any item
    /// whose position changed.
    pub fn reorder(&mut self) -> (KeyValueCollection<K, V>, ChangeSet<K, V>) {
        let before = self.items.clone();
        let comparer = self.comparer.clone();
        self.items.sort_by(|(_, a), (_, b)| comparer(a, b));
        let moves = Self::diff_positions(&before, &self.items);
        let snapshot = KeyValueCollection::new(self.items.clone(), SortReason::Reorder, self.optimisations);
        (snapshot, ChangeSet::from_changes(moves))
    }

    /// The current ordered snapshot.
    pub fn current(&self) -> &[(K, V)] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asc() -> Comparer<i32> {
        Arc::new(|a: &i32, b: &i32| a.cmp(b))
    }

    #[test]
    fn incremental_add_reports_insertion_index() {
        let mut sort = Sort::new(asc(), SortOptimisations::NONE, 25);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, 10));
        changes.push(Change::add(2, 5));
        let (snapshot, out) = sort.process(&changes);
        assert_eq!(snapshot.items(), &[(2, 5), (1, 10)]);
        let indices: Vec<isize> = out.iter().map(|c| c.current_index()).collect();
        assert_eq!(indices, vec![0, 0]);
    }

    #[test]
    fn batch_over_reset_threshold_resorts_wholesale() {
        let mut sort = Sort::new(asc(), SortOptimisations::NONE, 25);
        let mut preload = ChangeSet::new();
        preload.push(Change::add(0, 0));
        sort.process(&preload);

        let mut big_batch = ChangeSet::new();
        for n in 1..=100 {
            big_batch.push(Change::add(n, n));
        }
        let (snapshot, out) = sort.process(&big_batch);
        assert_eq!(snapshot.reason(), SortReason::Reset);
        assert_eq!(out.counts().adds, 100);
        assert_eq!(snapshot.len(), 101);
    }

    #[test]
    fn update_that_changes_position_reports_both_indices() {
        let mut sort = Sort::new(asc(), SortOptimisations::NONE, 25);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, 1));
        changes.push(Change::add(2, 2));
        changes.push(Change::add(3, 3));
        sort.process(&changes);

        let mut update = ChangeSet::new();
        update.push(Change::update(1, 100, 1));
        let (snapshot, out) = sort.process(&update);
        assert_eq!(snapshot.items(), &[(2, 2), (3, 3), (1, 100)]);
        let change = out.iter().next().unwrap();
        assert_eq!(change.previous_index(), 0);
        assert_eq!(change.current_index(), 2);
    }
}

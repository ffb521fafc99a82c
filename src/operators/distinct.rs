use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;
use std::sync::Arc;

/// Projects each cached value through a selector and republishes the
/// set of *distinct* projected values seen, reference-counted: a
/// distinct value is removed only once its last referent leaves.
pub struct DistinctValues<K, V, D> {
    selector: Arc<dyn Fn(&V) -> D + Send + Sync>,
    membership: FxIndexMap<K, D>,
    refcounts: FxIndexMap<D, usize>,
}

impl<K, V, D> DistinctValues<K, V, D>
where
    K: Clone + Eq + Hash,
    D: Clone + Eq + Hash,
{
    /// Distinct values are produced by `selector`.
    pub fn new(selector: impl Fn(&V) -> D + Send + Sync + 'static) -> Self {
        DistinctValues {
            selector: Arc::new(selector),
            membership: FxIndexMap::default(),
            refcounts: FxIndexMap::default(),
        }
    }

    fn release(&mut self, distinct: &D, out: &mut Vec<Change<D, D>>) {
        if let Some(count) = self.refcounts.get_mut(distinct) {
            *count -= 1;
            if *count == 0 {
                self.refcounts.shift_remove(distinct);
                out.push(Change::remove(distinct.clone(), distinct.clone()));
            }
        }
    }

    fn acquire(&mut self, distinct: &D, out: &mut Vec<Change<D, D>>) {
        let count = self.refcounts.entry(distinct.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            out.push(Change::add(distinct.clone(), distinct.clone()));
        }
    }

    /// Applies an upstream changeset, returning the Add/Remove set of
    /// distinct values that came into or went out of existence this
    /// batch.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<D, D> {
        let mut out = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let distinct = (self.selector)(change.current());
                    self.membership.insert(change.key().clone(), distinct.clone());
                    self.acquire(&distinct, &mut out);
                }
                ChangeReason::Update | ChangeReason::Refresh => {
                    let new_distinct = (self.selector)(change.current());
                    if let Some(old_distinct) = self.membership.get(change.key()).cloned() {
                        if old_distinct != new_distinct {
                            self.release(&old_distinct, &mut out);
                            self.membership.insert(change.key().clone(), new_distinct.clone());
                            self.acquire(&new_distinct, &mut out);
                        }
                    } else {
                        self.membership.insert(change.key().clone(), new_distinct.clone());
                        self.acquire(&new_distinct, &mut out);
                    }
                }
                ChangeReason::Remove => {
                    if let Some(old_distinct) = self.membership.shift_remove(change.key()) {
                        self.release(&old_distinct, &mut out);
                    }
                }
                ChangeReason::Moved => {}
            }
        }
        ChangeSet::from_changes(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change as ChangeCtor;

    #[test]
    fn distinct_value_surfaces_once_for_multiple_referents() {
        let mut distinct: DistinctValues<i32, i32, bool> = DistinctValues::new(|v: &i32| v % 2 == 0);
        let mut changes = ChangeSet::new();
        changes.push(ChangeCtor::add(1, 2));
        changes.push(ChangeCtor::add(2, 4));
        let out = distinct.process(&changes);
        assert_eq!(out.counts().adds, 1);
    }

    #[test]
    fn distinct_value_removed_only_after_last_referent_leaves() {
        let mut distinct: DistinctValues<i32, i32, bool> = DistinctValues::new(|v: &i32| v % 2 == 0);
        let mut changes = ChangeSet::new();
        changes.push(ChangeCtor::add(1, 2));
        changes.push(ChangeCtor::add(2, 4));
        distinct.process(&changes);

        let mut remove_one = ChangeSet::new();
        remove_one.push(ChangeCtor::remove(1, 2));
        let out = distinct.process(&remove_one);
        assert!(out.is_empty());

        let mut remove_other = ChangeSet::new();
        remove_other.push(ChangeCtor::remove(2, 4));
        let out = distinct.process(&remove_other);
        assert_eq!(out.counts().removes, 1);
    }
}

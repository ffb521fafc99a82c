use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;

/// The set-algebraic rule a [`Combiner`] applies across its sources.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CombineOp {
    /// A key is included when present in every source.
    And,
    /// A key is included when present in any source.
    Or,
    /// A key is included when present in exactly one source.
    Xor,
    /// A key is included when present in the first source and absent
    /// from every other.
    Except,
}

/// Combines N independently-edited keyed sources into one stream by a
/// set-algebraic rule on key membership. Sources are ordered; for
/// `Or`/`Xor`/`Except` the "winning" value when more than one source
/// could supply it is always the lowest-indexed qualifying source.
///
/// `add_source`/`remove_source` make this usable as either the static
/// form (a fixed source count decided up front) or the dynamic form
/// (sources attached and detached over the combiner's lifetime) —
/// the combination logic itself does not distinguish the two.
pub struct Combiner<K, V> {
    op: CombineOp,
    sources: Vec<FxIndexMap<K, V>>,
    emitted: FxIndexMap<K, (usize, V)>,
}

impl<K, V> Combiner<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + PartialEq,
{
    /// A combiner over `source_count` initially-empty sources.
    pub fn new(op: CombineOp, source_count: usize) -> Self {
        Combiner {
            op,
            sources: (0..source_count).map(|_| FxIndexMap::default()).collect(),
            emitted: FxIndexMap::default(),
        }
    }

    /// Attaches a new, initially-empty source at the end of the
    /// priority order, returning its index.
    pub fn add_source(&mut self) -> usize {
        self.sources.push(FxIndexMap::default());
        self.sources.len() - 1
    }

    /// Detaches `source_index`, recomputing inclusion for every key it
    /// held. Sources after it shift down by one in priority order.
    pub fn remove_source(&mut self, source_index: usize) -> ChangeSet<K, V> {
        if source_index >= self.sources.len() {
            return ChangeSet::new();
        }
        let removed = self.sources.remove(source_index);
        let mut out = Vec::new();
        for key in removed.keys() {
            self.reconcile(key, &mut out);
        }
        ChangeSet::from_changes(out)
    }

    /// Applies a changeset from `source_index`, returning the minimal
    /// Add/Update/Remove set needed to reflect the new combined
    /// membership.
    pub fn process(&mut self, source_index: usize, changes: &ChangeSet<K, V>) -> ChangeSet<K, V> {
        let mut affected: Vec<K> = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    self.sources[source_index].insert(change.key().clone(), change.current().clone());
                }
                ChangeReason::Remove => {
                    self.sources[source_index].shift_remove(change.key());
                }
                ChangeReason::Moved => continue,
            }
            if !affected.contains(change.key()) {
                affected.push(change.key().clone());
            }
        }

        let mut out = Vec::new();
        for key in &affected {
            self.reconcile(key, &mut out);
        }
        ChangeSet::from_changes(out)
    }

    fn winner(&self, key: &K) -> Option<(usize, V)> {
        let present: Vec<usize> = self
            .sources
            .iter()
            .enumerate()
            .filter(|(_, source)| source.contains_key(key))
            .map(|(index, _)| index)
            .collect();

        let winning_index = match self.op {
            CombineOp::And => {
                if !self.sources.is_empty() && present.len() == self.sources.len() {
                    Some(0)
                } else {
                    None
                }
            }
            CombineOp::Or => present.first().copied(),
            CombineOp::Xor => {
                if present.len() == 1 {
                    Some(present[0])
                } else {
                    None
                }
            }
            CombineOp::Except => {
                if present.len() == 1 && present[0] == 0 {
                    Some(0)
                } else {
                    None
                }
            }
        }?;
        self.sources[winning_index].get(key).cloned().map(|value| (winning_index, value))
    }

    fn reconcile(&mut self, key: &K, out: &mut Vec<Change<K, V>>) {
        let new = self.winner(key);
        let old = self.emitted.get(key).cloned();
        match (old, new) {
            (None, None) => {}
            (None, Some((index, value))) => {
                self.emitted.insert(key.clone(), (index, value.clone()));
                out.push(Change::add(key.clone(), value));
            }
            (Some((_, old_value)), None) => {
                self.emitted.shift_remove(key);
                out.push(Change::remove(key.clone(), old_value));
            }
            (Some((old_index, old_value)), Some((new_index, new_value))) => {
                if old_index != new_index || old_value != new_value {
                    self.emitted.insert(key.clone(), (new_index, new_value.clone()));
                    out.push(Change::update(key.clone(), new_value, old_value));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_includes_only_keys_present_everywhere() {
        let mut combiner: Combiner<i32, &str> = Combiner::new(CombineOp::And, 2);
        let mut a = ChangeSet::new();
        a.push(Change::add(1, "a1"));
        a.push(Change::add(2, "a2"));
        combiner.process(0, &a);

        let mut b = ChangeSet::new();
        b.push(Change::add(1, "b1"));
        let out = combiner.process(1, &b);
        assert_eq!(out.counts().adds, 1);
        assert_eq!(*out.iter().next().unwrap().key(), 1);
    }

    #[test]
    fn xor_drops_key_once_a_second_source_gains_it() {
        let mut combiner: Combiner<i32, &str> = Combiner::new(CombineOp::Xor, 2);
        let mut a = ChangeSet::new();
        a.push(Change::add(1, "a1"));
        let out = combiner.process(0, &a);
        assert_eq!(out.counts().adds, 1);

        let mut b = ChangeSet::new();
        b.push(Change::add(1, "b1"));
        let out = combiner.process(1, &b);
        assert_eq!(out.counts().removes, 1);
    }

    #[test]
    fn except_excludes_keys_present_in_a_later_source() {
        let mut combiner: Combiner<i32, &str> = Combiner::new(CombineOp::Except, 2);
        let mut a = ChangeSet::new();
        a.push(Change::add(1, "a1"));
        let out = combiner.process(0, &a);
        assert_eq!(out.counts().adds, 1);

        let mut b = ChangeSet::new();
        b.push(Change::add(1, "b1"));
        let out = combiner.process(1, &b);
        assert_eq!(out.counts().removes, 1);
    }

    #[test]
    fn removing_a_source_revokes_its_exclusive_keys() {
        let mut combiner: Combiner<i32, &str> = Combiner::new(CombineOp::Or, 2);
        let mut a = ChangeSet::new();
        a.push(Change::add(1, "a1"));
        combiner.process(0, &a);

        let out = combiner.remove_source(0);
        assert_eq!(out.counts().removes, 1);
    }
}

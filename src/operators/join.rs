use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;
use std::sync::Arc;

/// Which rows a join emits when one side has no match under the join key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Only rows with a match on both sides.
    Inner,
    /// Every left row, matched right rows or none.
    Left,
    /// Every right row, matched left rows or none.
    Right,
    /// Every left row and every unmatched right row.
    Full,
}

/// The composite key of a joined row: keyed by the left row's key when
/// a left row exists, otherwise by the right row's key (possible only
/// under [`JoinKind::Full`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JoinKey<LK, RK> {
    /// Keyed by the left entity.
    Left(LK),
    /// An unmatched right entity (Full join only).
    Right(RK),
}

/// One joined row. Under `many = false` (the default "single" form),
/// `right` holds at most one element; under `many = true`, every right
/// row sharing the join key.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinRow<LV, RV> {
    /// The left row, absent only for an unmatched right row.
    pub left: Option<LV>,
    /// Matching right rows.
    pub right: Vec<RV>,
}

/// A relational join of two independently-edited keyed streams on a
/// derived join key `JK`.
pub struct Join<LK, LV, RK, RV, JK> {
    kind: JoinKind,
    many: bool,
    left_key_of: Arc<dyn Fn(&LV) -> JK + Send + Sync>,
    right_key_of: Arc<dyn Fn(&RV) -> JK + Send + Sync>,
    left: FxIndexMap<LK, LV>,
    right: FxIndexMap<RK, RV>,
    left_by_join: FxIndexMap<JK, Vec<LK>>,
    right_by_join: FxIndexMap<JK, Vec<RK>>,
    left_join_of: FxIndexMap<LK, JK>,
    right_join_of: FxIndexMap<RK, JK>,
    emitted: FxIndexMap<JoinKey<LK, RK>, JoinRow<LV, RV>>,
    emitted_keys_by_join: FxIndexMap<JK, Vec<JoinKey<LK, RK>>>,
}

impl<LK, LV, RK, RV, JK> Join<LK, LV, RK, RV, JK>
where
    LK: Clone + Eq + Hash,
    RK: Clone + Eq + Hash,
    LV: Clone + PartialEq,
    RV: Clone + PartialEq,
    JK: Clone + Eq + Hash,
{
    /// A join of `kind`, matching a left and a right row when their
    /// derived join keys are equal. `many = true` groups every
    /// matching right row per left row rather than just the first.
    pub fn new(
        kind: JoinKind,
        many: bool,
        left_key_of: impl Fn(&LV) -> JK + Send + Sync + 'static,
        right_key_of: impl Fn(&RV) -> JK + Send + Sync + 'static,
    ) -> Self {
        Join {
            kind,
            many,
            left_key_of: Arc::new(left_key_of),
            right_key_of: Arc::new(right_key_of),
            left: FxIndexMap::default(),
            right: FxIndexMap::default(),
            left_by_join: FxIndexMap::default(),
            right_by_join: FxIndexMap::default(),
            left_join_of: FxIndexMap::default(),
            right_join_of: FxIndexMap::default(),
            emitted: FxIndexMap::default(),
            emitted_keys_by_join: FxIndexMap::default(),
        }
    }

    fn mark(join_key: &JK, affected: &mut Vec<JK>) {
        if !affected.contains(join_key) {
            affected.push(join_key.clone());
        }
    }

    /// Applies a changeset from the left side.
    pub fn apply_left(&mut self, changes: &ChangeSet<LK, LV>) -> ChangeSet<JoinKey<LK, RK>, JoinRow<LV, RV>> {
        let mut affected = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Moved => continue,
                ChangeReason::Remove => {
                    self.left.shift_remove(change.key());
                    if let Some(old_jk) = self.left_join_of.shift_remove(change.key()) {
                        if let Some(list) = self.left_by_join.get_mut(&old_jk) {
                            list.retain(|k| k != change.key());
                            if list.is_empty() {
                                self.left_by_join.shift_remove(&old_jk);
                            }
                        }
                        Self::mark(&old_jk, &mut affected);
                    }
                }
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    let new_jk = (self.left_key_of)(change.current());
                    if let Some(old_jk) = self.left_join_of.get(change.key()).cloned() {
                        if old_jk != new_jk {
                            if let Some(list) = self.left_by_join.get_mut(&old_jk) {
                                list.retain(|k| k != change.key());
                                if list.is_empty() {
                                    self.left_by_join.shift_remove(&old_jk);
                                }
                            }
                            Self::mark(&old_jk, &mut affected);
                        }
                    }
                    self.left.insert(change.key().clone(), change.current().clone());
                    let list = self.left_by_join.entry(new_jk.clone()).or_default();
                    if !list.contains(change.key()) {
                        list.push(change.key().clone());
                    }
                    self.left_join_of.insert(change.key().clone(), new_jk.clone());
                    Self::mark(&new_jk, &mut affected);
                }
            }
        }

        let mut out = Vec::new();
        for jk in affected {
            self.reconcile(&jk, &mut out);
        }
        ChangeSet::from_changes(out)
    }

    /// Applies a changeset from the right side.
    pub fn apply_right(&mut self, changes: &ChangeSet<RK, RV>) -> ChangeSet<JoinKey<LK, RK>, JoinRow<LV, RV>> {
        let mut affected = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Moved => continue,
                ChangeReason::Remove => {
                    self.right.shift_remove(change.key());
                    if let Some(old_jk) = self.right_join_of.shift_remove(change.key()) {
                        if let Some(list) = self.right_by_join.get_mut(&old_jk) {
                            list.retain(|k| k != change.key());
                            if list.is_empty() {
                                self.right_by_join.shift_remove(&old_jk);
                            }
                        }
                        Self::mark(&old_jk, &mut affected);
                    }
                }
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    let new_jk = (self.right_key_of)(change.current());
                    if let Some(old_jk) = self.right_join_of.get(change.key()).cloned() {
                        if old_jk != new_jk {
                            if let Some(list) = self.right_by_join.get_mut(&old_jk) {
                                list.retain(|k| k != change.key());
                                if list.is_empty() {
                                    self.right_by_join.shift_remove(&old_jk);
                                }
                            }
                            Self::mark(&old_jk, &mut affected);
                        }
                    }
                    self.right.insert(change.key().clone(), change.current().clone());
                    let list = self.right_by_join.entry(new_jk.clone()).or_default();
                    if !list.contains(change.key()) {
                        list.push(change.key().clone());
                    }
                    self.right_join_of.insert(change.key().clone(), new_jk.clone());
                    Self::mark(&new_jk, &mut affected);
                }
            }
        }

        let mut out = Vec::new();
        for jk in affected {
            self.reconcile(&jk, &mut out);
        }
        ChangeSet::from_changes(out)
    }

    fn compute_rows(&self, join_key: &JK) -> Vec<(JoinKey<LK, RK>, JoinRow<LV, RV>)> {
        let lefts = self.left_by_join.get(join_key).cloned().unwrap_or_default();
        let rights = self.right_by_join.get(join_key).cloned().unwrap_or_default();
        let mut rows = Vec::new();

        if self.kind == JoinKind::Right {
            for rk in &rights {
                let rv = match self.right.get(rk) {
                    Some(v) => v.clone(),
                    None => continue,
                };
                let matched_left = lefts.iter().find_map(|lk| self.left.get(lk).cloned());
                rows.push((JoinKey::Right(rk.clone()), JoinRow { left: matched_left, right: vec![rv] }));
            }
            return rows;
        }

        if lefts.is_empty() {
            if self.kind == JoinKind::Full {
                for rk in &rights {
                    if let Some(rv) = self.right.get(rk).cloned() {
                        rows.push((JoinKey::Right(rk.clone()), JoinRow { left: None, right: vec![rv] }));
                    }
                }
            }
            return rows;
        }

        for lk in &lefts {
            let lv = match self.left.get(lk) {
                Some(v) => v.clone(),
                None => continue,
            };
            let matched: Vec<RV> = rights.iter().filter_map(|rk| self.right.get(rk).cloned()).collect();
            if self.kind == JoinKind::Inner && matched.is_empty() {
                continue;
            }
            let right_field = if self.many { matched } else { matched.into_iter().take(1).collect() };
            rows.push((JoinKey::Left(lk.clone()), JoinRow { left: Some(lv), right: right_field }));
        }
        rows
    }

    fn reconcile(&mut self, join_key: &JK, out: &mut Vec<Change<JoinKey<LK, RK>, JoinRow<LV, RV>>>) {
        let new_rows = self.compute_rows(join_key);
        let new_keys: Vec<JoinKey<LK, RK>> = new_rows.iter().map(|(k, _)| k.clone()).collect();
        let old_keys = self.emitted_keys_by_join.get(join_key).cloned().unwrap_or_default();

        for old_key in &old_keys {
            if !new_keys.contains(old_key) {
                if let Some(old_row) = self.emitted.shift_remove(old_key) {
                    out.push(Change::remove(old_key.clone(), old_row));
                }
            }
        }

        for (key, row) in new_rows {
            match self.emitted.get(&key) {
                Some(existing) if *existing == row => {}
                Some(existing) => {
                    let previous = existing.clone();
                    self.emitted.insert(key.clone(), row.clone());
                    out.push(Change::update(key, row, previous));
                }
                None => {
                    self.emitted.insert(key.clone(), row.clone());
                    out.push(Change::add(key, row));
                }
            }
        }

        if new_keys.is_empty() {
            self.emitted_keys_by_join.shift_remove(join_key);
        } else {
            self.emitted_keys_by_join.insert(join_key.clone(), new_keys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Order {
        customer_id: u32,
        amount: u32,
    }
    #[derive(Clone, Debug, PartialEq)]
    struct Customer {
        id: u32,
        name: &'static str,
    }

    #[test]
    fn inner_join_emits_only_matched_rows() {
        let mut join: Join<u32, Order, u32, Customer, u32> = Join::new(
            JoinKind::Inner,
            true,
            |o: &Order| o.customer_id,
            |c: &Customer| c.id,
        );

        let mut customers = ChangeSet::new();
        customers.push(Change::add(1, Customer { id: 1, name: "Ada" }));
        join.apply_right(&customers);

        let mut orders = ChangeSet::new();
        orders.push(Change::add(100, Order { customer_id: 1, amount: 50 }));
        orders.push(Change::add(101, Order { customer_id: 2, amount: 75 }));
        let out = join.apply_left(&orders);
        assert_eq!(out.counts().adds, 1);
    }

    #[test]
    fn left_join_emits_unmatched_left_rows_with_empty_right() {
        let mut join: Join<u32, Order, u32, Customer, u32> = Join::new(
            JoinKind::Left,
            false,
            |o: &Order| o.customer_id,
            |c: &Customer| c.id,
        );
        let mut orders = ChangeSet::new();
        orders.push(Change::add(100, Order { customer_id: 9, amount: 50 }));
        let out = join.apply_left(&orders);
        assert_eq!(out.counts().adds, 1);
        let row = out.iter().next().unwrap();
        assert!(row.current().right.is_empty());
    }

    #[test]
    fn right_join_emits_unmatched_right_rows() {
        let mut join: Join<u32, Order, u32, Customer, u32> = Join::new(
            JoinKind::Right,
            false,
            |o: &Order| o.customer_id,
            |c: &Customer| c.id,
        );
        let mut customers = ChangeSet::new();
        customers.push(Change::add(7, Customer { id: 7, name: "Lin" }));
        let out = join.apply_right(&customers);
        assert_eq!(out.counts().adds, 1);
        let row = out.iter().next().unwrap();
        assert!(row.current().left.is_none());
        assert_eq!(row.current().right.len(), 1);
    }

    #[test]
    fn right_join_matches_left_rows_by_key() {
        let mut join: Join<u32, Order, u32, Customer, u32> = Join::new(
            JoinKind::Right,
            false,
            |o: &Order| o.customer_id,
            |c: &Customer| c.id,
        );
        let mut customers = ChangeSet::new();
        customers.push(Change::add(1, Customer { id: 1, name: "Ada" }));
        join.apply_right(&customers);

        let mut orders = ChangeSet::new();
        orders.push(Change::add(100, Order { customer_id: 1, amount: 50 }));
        let out = join.apply_left(&orders);
        assert_eq!(out.counts().updates, 1);
        let row = out.iter().next().unwrap();
        assert_eq!(row.current().left.as_ref().map(|o| o.amount), Some(50));
    }

    #[test]
    fn full_join_emits_unmatched_right_rows() {
        let mut join: Join<u32, Order, u32, Customer, u32> = Join::new(
            JoinKind::Full,
            false,
            |o: &Order| o.customer_id,
            |c: &Customer| c.id,
        );
        let mut customers = ChangeSet::new();
        customers.push(Change::add(5, Customer { id: 5, name: "Zoe" }));
        let out = join.apply_right(&customers);
        assert_eq!(out.counts().adds, 1);
        let row = out.iter().next().unwrap();
        assert!(row.current().left.is_none());
    }
}

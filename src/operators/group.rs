use crate::cache::change_aware_cache::FxIndexMap;
use crate::cache::ObservableCache;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;
use std::sync::Arc;

/// Partitions an upstream cache by a group selector `G(V)`, emitting an
/// `Add`/`Remove` of a group's inner [`ObservableCache`] handle as
/// groups come into and go out of existence. Membership changes within
/// an existing group are applied directly to that group's cache and
/// are not themselves surfaced on the returned changeset.
pub struct GroupOn<GK, K, V> {
    group_selector: Arc<dyn Fn(&V) -> GK + Send + Sync>,
    key_of: Arc<dyn Fn(&V) -> K + Send + Sync>,
    groups: FxIndexMap<GK, Arc<ObservableCache<K, V>>>,
    membership: FxIndexMap<K, GK>,
}

impl<GK, K, V> GroupOn<GK, K, V>
where
    GK: Clone + Eq + Hash,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Groups by `group_selector`; `key_of` is the key selector each
    /// group's inner cache is constructed with.
    pub fn new(
        group_selector: impl Fn(&V) -> GK + Send + Sync + 'static,
        key_of: impl Fn(&V) -> K + Send + Sync + 'static,
    ) -> Self {
        GroupOn {
            group_selector: Arc::new(group_selector),
            key_of: Arc::new(key_of),
            groups: FxIndexMap::default(),
            membership: FxIndexMap::default(),
        }
    }

    fn ensure_group(&mut self, group_key: &GK, out: &mut Vec<Change<GK, Arc<ObservableCache<K, V>>>>) -> Arc<ObservableCache<K, V>> {
        if let Some(group) = self.groups.get(group_key) {
            return group.clone();
        }
        let key_of = self.key_of.clone();
        let group = Arc::new(ObservableCache::new(move |v: &V| (key_of)(v)));
        self.groups.insert(group_key.clone(), group.clone());
        out.push(Change::add(group_key.clone(), group.clone()));
        group
    }

    fn remove_from_group(&mut self, group_key: &GK, key: &K, out: &mut Vec<Change<GK, Arc<ObservableCache<K, V>>>>) {
        let now_empty = match self.groups.get(group_key) {
            Some(group) => {
                group.edit(|u| u.remove_key(key));
                group.count() == 0
            }
            None => false,
        };
        if now_empty {
            if let Some(removed) = self.groups.shift_remove(group_key) {
                out.push(Change::remove(group_key.clone(), removed));
            }
        }
    }

    fn relocate(&mut self, key: &K, value: &V, old_group_key: &GK, new_group_key: &GK, out: &mut Vec<Change<GK, Arc<ObservableCache<K, V>>>>) {
        self.remove_from_group(old_group_key, key, out);
        let group = self.ensure_group(new_group_key, out);
        group.edit(|u| u.add_or_update(value.clone()));
        self.membership.insert(key.clone(), new_group_key.clone());
    }

    /// Applies an upstream changeset, returning the changeset of
    /// group handles created or emptied out as a result.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<GK, Arc<ObservableCache<K, V>>> {
        let mut out = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let group_key = (self.group_selector)(change.current());
                    let group = self.ensure_group(&group_key, &mut out);
                    group.edit(|u| u.add_or_update(change.current().clone()));
                    self.membership.insert(change.key().clone(), group_key);
                }
                ChangeReason::Update => {
                    let new_group_key = (self.group_selector)(change.current());
                    match self.membership.get(change.key()).cloned() {
                        Some(old_group_key) if old_group_key == new_group_key => {
                            if let Some(group) = self.groups.get(&old_group_key) {
                                group.edit(|u| u.add_or_update(change.current().clone()));
                            }
                        }
                        Some(old_group_key) => {
                            self.relocate(change.key(), change.current(), &old_group_key, &new_group_key, &mut out);
                        }
                        None => {
                            let group = self.ensure_group(&new_group_key, &mut out);
                            group.edit(|u| u.add_or_update(change.current().clone()));
                            self.membership.insert(change.key().clone(), new_group_key);
                        }
                    }
                }
                ChangeReason::Remove => {
                    if let Some(old_group_key) = self.membership.shift_remove(change.key()) {
                        self.remove_from_group(&old_group_key, change.key(), &mut out);
                    }
                }
                ChangeReason::Refresh => {
                    let new_group_key = (self.group_selector)(change.current());
                    if let Some(old_group_key) = self.membership.get(change.key()).cloned() {
                        if old_group_key == new_group_key {
                            if let Some(group) = self.groups.get(&old_group_key) {
                                group.edit(|u| u.refresh_key(change.key()));
                            }
                        } else {
                            self.relocate(change.key(), change.current(), &old_group_key, &new_group_key, &mut out);
                        }
                    }
                }
                ChangeReason::Moved => {}
            }
        }
        ChangeSet::from_changes(out)
    }

    /// Recomputes every item's group membership from scratch (an
    /// external "regroup" signal), relocating any item whose group key
    /// has changed since it was last classified.
    pub fn regroup(&mut self) -> ChangeSet<GK, Arc<ObservableCache<K, V>>> {
        let mut out = Vec::new();
        let keys: Vec<K> = self.membership.keys().cloned().collect();
        for key in keys {
            let old_group_key = match self.membership.get(&key).cloned() {
                Some(gk) => gk,
                None => continue,
            };
            let value = match self.groups.get(&old_group_key).and_then(|g| g.lookup(&key)) {
                Some(v) => v,
                None => continue,
            };
            let new_group_key = (self.group_selector)(&value);
            if new_group_key != old_group_key {
                self.relocate(&key, &value, &old_group_key, &new_group_key, &mut out);
            }
        }
        ChangeSet::from_changes(out)
    }

    /// The group handle for `group_key`, if it currently has members.
    pub fn group(&self, group_key: &GK) -> Option<Arc<ObservableCache<K, V>>> {
        self.groups.get(group_key).cloned()
    }
}

/// An immutable snapshot of one group's current membership, as
/// produced by [`GroupOnImmutable::process`].
#[derive(Clone, Debug)]
pub struct GroupSnapshot<GK, K, V> {
    /// The group's key.
    pub key: GK,
    /// The group's current members, in no particular order.
    pub items: Vec<(K, V)>,
}

/// Like [`GroupOn`], but produces a plain snapshot per affected group
/// rather than a mutable inner cache handle — cheaper when a consumer
/// only ever needs a point-in-time view of group contents.
pub struct GroupOnImmutable<GK, K, V> {
    group_selector: Arc<dyn Fn(&V) -> GK + Send + Sync>,
    members: FxIndexMap<GK, FxIndexMap<K, V>>,
    membership: FxIndexMap<K, GK>,
}

impl<GK, K, V> GroupOnImmutable<GK, K, V>
where
    GK: Clone + Eq + Hash,
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Groups by `group_selector`.
    pub fn new(group_selector: impl Fn(&V) -> GK + Send + Sync + 'static) -> Self {
        GroupOnImmutable {
            group_selector: Arc::new(group_selector),
            members: FxIndexMap::default(),
            membership: FxIndexMap::default(),
        }
    }

    fn mark(group_key: &GK, affected: &mut Vec<GK>) {
        if !affected.contains(group_key) {
            affected.push(group_key.clone());
        }
    }

    fn remove_member(&mut self, group_key: &GK, key: &K) {
        if let Some(group) = self.members.get_mut(group_key) {
            group.shift_remove(key);
            if group.is_empty() {
                self.members.shift_remove(group_key);
            }
        }
    }

    /// Applies an upstream changeset, returning a snapshot for every
    /// group with at least one member change this batch.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> Vec<GroupSnapshot<GK, K, V>> {
        let mut affected = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let group_key = (self.group_selector)(change.current());
                    self.members
                        .entry(group_key.clone())
                        .or_default()
                        .insert(change.key().clone(), change.current().clone());
                    self.membership.insert(change.key().clone(), group_key.clone());
                    Self::mark(&group_key, &mut affected);
                }
                ChangeReason::Update | ChangeReason::Refresh => {
                    let new_group_key = (self.group_selector)(change.current());
                    if let Some(old_group_key) = self.membership.get(change.key()).cloned() {
                        if old_group_key != new_group_key {
                            self.remove_member(&old_group_key, change.key());
                            Self::mark(&old_group_key, &mut affected);
                        }
                    }
                    self.members
                        .entry(new_group_key.clone())
                        .or_default()
                        .insert(change.key().clone(), change.current().clone());
                    self.membership.insert(change.key().clone(), new_group_key.clone());
                    Self::mark(&new_group_key, &mut affected);
                }
                ChangeReason::Remove => {
                    if let Some(old_group_key) = self.membership.shift_remove(change.key()) {
                        self.remove_member(&old_group_key, change.key());
                        Self::mark(&old_group_key, &mut affected);
                    }
                }
                ChangeReason::Moved => {}
            }
        }

        affected
            .into_iter()
            .map(|group_key| {
                let items = self
                    .members
                    .get(&group_key)
                    .map(|members| members.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                GroupSnapshot { key: group_key, items }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_on_creates_and_empties_groups() {
        let mut group_on: GroupOn<bool, i32, i32> = GroupOn::new(|v: &i32| v % 2 == 0, |v: &i32| *v);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(2, 2));
        changes.push(Change::add(4, 4));
        let out = group_on.process(&changes);
        assert_eq!(out.counts().adds, 1);
        assert_eq!(group_on.group(&true).unwrap().count(), 2);

        let mut removal = ChangeSet::new();
        removal.push(Change::remove(2, 2));
        removal.push(Change::remove(4, 4));
        let out = group_on.process(&removal);
        assert_eq!(out.counts().removes, 1);
        assert!(group_on.group(&true).is_none());
    }

    #[test]
    fn group_on_relocates_item_whose_group_key_changes() {
        let mut group_on: GroupOn<bool, i32, i32> = GroupOn::new(|v: &i32| v % 2 == 0, |v: &i32| *v);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(2, 2));
        group_on.process(&changes);

        let mut update = ChangeSet::new();
        update.push(Change::update(2, 3, 2));
        group_on.process(&update);

        assert!(group_on.group(&true).is_none());
        assert_eq!(group_on.group(&false).unwrap().count(), 1);
    }

    #[test]
    fn group_on_immutable_snapshots_affected_groups_only() {
        let mut group: GroupOnImmutable<bool, i32, i32> = GroupOnImmutable::new(|v: &i32| v % 2 == 0);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, 1));
        changes.push(Change::add(2, 2));
        let snapshots = group.process(&changes);
        assert_eq!(snapshots.len(), 2);

        let mut update = ChangeSet::new();
        update.push(Change::update(1, 1, 1));
        let snapshots = group.process(&update);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].key, false);
    }
}

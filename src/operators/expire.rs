use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tracks a future-dated removal deadline per item and evicts items
/// whose time-to-live has elapsed.
///
/// Driving this on a wall clock (sleeping until [`TimeExpirer::next_wakeup`]
/// and then calling [`TimeExpirer::sweep`]) is the embedder's job — the
/// expirer itself takes `now` as an argument rather than reading the
/// clock, so it stays deterministic and independently testable.
pub struct TimeExpirer<K, V> {
    ttl_of: Arc<dyn Fn(&V) -> Option<Duration> + Send + Sync>,
    poll_interval: Duration,
    deadlines: FxIndexMap<K, Instant>,
}

impl<K, V> TimeExpirer<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// `ttl_of` returns `None` for items that never expire. Deadline
    /// checks are coalesced onto a `poll_interval` grid rather than
    /// scheduled one wakeup per item.
    pub fn new(ttl_of: impl Fn(&V) -> Option<Duration> + Send + Sync + 'static, poll_interval: Duration) -> Self {
        TimeExpirer {
            ttl_of: Arc::new(ttl_of),
            poll_interval,
            deadlines: FxIndexMap::default(),
        }
    }

    /// Updates tracked deadlines from an upstream changeset. `now` is
    /// the caller-supplied current time, used to compute `Add`/`Update`
    /// deadlines.
    pub fn process(&mut self, changes: &ChangeSet<K, V>, now: Instant) {
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    match (self.ttl_of)(change.current()) {
                        Some(ttl) => {
                            self.deadlines.insert(change.key().clone(), now + ttl);
                        }
                        None => {
                            self.deadlines.shift_remove(change.key());
                        }
                    }
                }
                ChangeReason::Remove => {
                    self.deadlines.shift_remove(change.key());
                }
                ChangeReason::Moved => {}
            }
        }
    }

    /// Removes and returns every key whose deadline has passed as of
    /// `now`.
    pub fn sweep(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            self.deadlines.shift_remove(key);
        }
        due
    }

    /// The next instant the embedder should wake up and call
    /// [`TimeExpirer::sweep`], rounded to the poll-interval grid, or
    /// `None` if nothing is tracked.
    pub fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        let earliest = self.deadlines.values().min().copied()?;
        if earliest <= now {
            return Some(now);
        }
        let interval = self.poll_interval.max(Duration::from_millis(1));
        let elapsed_ticks = (earliest - now).as_nanos() / interval.as_nanos().max(1);
        Some(now + interval * (elapsed_ticks as u32 + 1))
    }
}

/// Evicts the oldest items by insertion order once the tracked count
/// exceeds a fixed limit.
pub struct SizeExpirer<K, V> {
    limit: usize,
    order: FxIndexMap<K, V>,
}

impl<K, V> SizeExpirer<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Evicts down to at most `limit` items whenever `process` is
    /// called with a changeset that pushes the count over it.
    pub fn new(limit: usize) -> Self {
        SizeExpirer {
            limit,
            order: FxIndexMap::default(),
        }
    }

    /// Applies an upstream changeset, returning the Remove changeset
    /// for any items evicted to stay within the size limit. An
    /// `Update` does not change an item's insertion position.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<K, V> {
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    self.order.insert(change.key().clone(), change.current().clone());
                }
                ChangeReason::Remove => {
                    self.order.shift_remove(change.key());
                }
                ChangeReason::Moved => {}
            }
        }

        let mut evicted = Vec::new();
        while self.order.len() > self.limit {
            if let Some((key, value)) = self.order.shift_remove_index(0) {
                evicted.push(Change::remove(key, value));
            } else {
                break;
            }
        }
        ChangeSet::from_changes(evicted)
    }

    /// Number of items currently tracked.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if no items are tracked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_expirer_sweeps_only_elapsed_deadlines() {
        let mut expirer = TimeExpirer::new(|ttl: &Option<Duration>| *ttl, Duration::from_millis(50));
        let now = Instant::now();

        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, Some(Duration::from_millis(100))));
        changes.push(Change::add(2, Some(Duration::from_millis(200))));
        changes.push(Change::add(3, None));
        expirer.process(&changes, now);

        let due_early = expirer.sweep(now + Duration::from_millis(150));
        assert_eq!(due_early, vec![1]);

        let due_later = expirer.sweep(now + Duration::from_millis(300));
        assert_eq!(due_later, vec![2]);
    }

    #[test]
    fn time_expirer_untracks_item_whose_ttl_becomes_infinite() {
        let mut expirer = TimeExpirer::new(|ttl: &Option<Duration>| *ttl, Duration::from_millis(10));
        let now = Instant::now();
        let mut add = ChangeSet::new();
        add.push(Change::add(1, Some(Duration::from_millis(10))));
        expirer.process(&add, now);

        let mut update = ChangeSet::new();
        update.push(Change::update(1, None, Some(Duration::from_millis(10))));
        expirer.process(&update, now);

        assert!(expirer.sweep(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn size_expirer_evicts_oldest_first() {
        let mut expirer = SizeExpirer::new(2);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, "a"));
        changes.push(Change::add(2, "b"));
        changes.push(Change::add(3, "c"));
        let evicted = expirer.process(&changes);
        assert_eq!(evicted.counts().removes, 1);
        assert_eq!(*evicted.iter().next().unwrap().key(), 1);
        assert_eq!(expirer.len(), 2);
    }

    #[test]
    fn size_expirer_update_does_not_move_insertion_order() {
        let mut expirer = SizeExpirer::new(2);
        let mut changes = ChangeSet::new();
        changes.push(Change::add(1, "a"));
        changes.push(Change::add(2, "b"));
        expirer.process(&changes);

        let mut update = ChangeSet::new();
        update.push(Change::update(1, "a2", "a"));
        update.push(Change::add(3, "c"));
        let evicted = expirer.process(&update);
        assert_eq!(evicted.counts().removes, 1);
        assert_eq!(*evicted.iter().next().unwrap().key(), 1);
    }
}

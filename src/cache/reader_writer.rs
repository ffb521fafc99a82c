use crate::cache::change_aware_cache::ChangeAwareCache;
use crate::changeset::ChangeSet;
use crate::revision::{AtomicRevision, Revision};
use parking_lot::RwLock;
use std::hash::Hash;

/// Serialises writes against a [`ChangeAwareCache`] and returns the
/// changeset each edit produced.
///
/// A single `RwLock` guards the cache: a write takes the exclusive
/// guard for the duration of the edit closure, which both serialises
/// concurrent writers and prevents any reader from observing a
/// partially-applied batch. Reads take the shared guard.
pub struct ReaderWriter<K, V> {
    cache: RwLock<ChangeAwareCache<K, V>>,
    revision: AtomicRevision,
}

impl<K, V> ReaderWriter<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A reader-writer over an empty cache.
    pub fn new() -> Self {
        ReaderWriter {
            cache: RwLock::new(ChangeAwareCache::new()),
            revision: AtomicRevision::start(),
        }
    }

    /// Applies `action` against a scratch clone of the cache under the
    /// write lock; if `action` succeeds the clone is swapped in and the
    /// resulting changeset captured, otherwise the real cache is left
    /// untouched. This is what lets a faulty edit action fail cleanly
    /// without corrupting cache state or requiring every operator
    /// closure to be panic/rollback-aware itself.
    pub fn try_write<E>(
        &self,
        action: impl FnOnce(&mut ChangeAwareCache<K, V>) -> Result<(), E>,
    ) -> Result<(ChangeSet<K, V>, Revision), E> {
        log::trace!("reader_writer: acquiring write lock");
        let mut guard = self.cache.write();
        let mut scratch = guard.clone();
        action(&mut scratch)?;
        *guard = scratch;
        let changes = guard.capture_changes();
        let revision = self.revision.fetch_then_increment();
        log::trace!(
            "reader_writer: write batch produced {} changes at revision {:?}",
            changes.len(),
            revision
        );
        Ok((changes, revision))
    }

    /// Applies an infallible `action` against the cache under the
    /// write lock, then captures and returns the resulting changeset
    /// together with the revision it was produced in.
    pub fn write(&self, action: impl FnOnce(&mut ChangeAwareCache<K, V>)) -> (ChangeSet<K, V>, Revision) {
        let result: Result<_, std::convert::Infallible> = self.try_write(|cache| {
            action(cache);
            Ok(())
        });
        result.unwrap_or_else(|never| match never {})
    }

    /// Looks up the current value for `key`.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.cache.read().lookup(key).cloned()
    }

    /// Current entry count.
    pub fn count(&self) -> usize {
        self.cache.read().len()
    }

    /// A stable, owned snapshot of every `(key, value)` pair currently
    /// held, in cache-internal (insertion) order.
    pub fn key_values(&self) -> Vec<(K, V)> {
        self.cache
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// A stable, owned snapshot of every key currently held.
    pub fn keys(&self) -> Vec<K> {
        self.cache.read().keys().cloned().collect()
    }

    /// A stable, owned snapshot of every value currently held.
    pub fn items(&self) -> Vec<V> {
        self.cache.read().iter().map(|(_, v)| v.clone()).collect()
    }

    /// The revision most recently produced by a write.
    pub fn current_revision(&self) -> Revision {
        self.revision.load()
    }
}

impl<K, V> Default for ReaderWriter<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        ReaderWriter::new()
    }
}

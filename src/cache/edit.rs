use crate::cache::change_aware_cache::ChangeAwareCache;
use std::hash::Hash;

/// The mutation surface handed to an edit closure passed to `edit`.
///
/// Values carry their own key via a key-selector supplied when the
/// owning cache was constructed (mirroring the `Func<TObject, TKey>`
/// selector of the system this crate's design is modeled on), so
/// `add_or_update` only needs the value itself.
pub struct Updater<'a, K, V> {
    cache: &'a mut ChangeAwareCache<K, V>,
    key_of: &'a dyn Fn(&V) -> K,
}

impl<'a, K, V> Updater<'a, K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub(crate) fn new(cache: &'a mut ChangeAwareCache<K, V>, key_of: &'a dyn Fn(&V) -> K) -> Self {
        Updater { cache, key_of }
    }

    /// Adds or updates a single item, deriving its key via the cache's
    /// key selector.
    pub fn add_or_update(&mut self, item: V) {
        let key = (self.key_of)(&item);
        self.cache.add_or_update(key, item);
    }

    /// Adds or updates every item in `items`, in order.
    pub fn add_or_update_many(&mut self, items: impl IntoIterator<Item = V>) {
        for item in items {
            self.add_or_update(item);
        }
    }

    /// Adds or updates `value` under an explicit `key`, bypassing the
    /// key selector. Used by intermediate caches and operators that
    /// maintain derived values under a key not embedded in the value
    /// itself (e.g. a group key).
    pub fn add_or_update_with_key(&mut self, key: K, value: V) {
        self.cache.add_or_update(key, value);
    }

    /// Removes the entry for `key`, if present.
    pub fn remove_key(&mut self, key: &K) {
        self.cache.remove(key);
    }

    /// Removes every key in `keys`.
    pub fn remove_keys(&mut self, keys: impl IntoIterator<Item = K>) {
        self.cache.remove_many(keys);
    }

    /// Removes `item`'s entry, deriving its key via the key selector.
    pub fn remove_item(&mut self, item: &V) {
        let key = (self.key_of)(item);
        self.cache.remove(&key);
    }

    /// Removes every item in `items`, deriving keys via the key selector.
    pub fn remove_items<'b>(&mut self, items: impl IntoIterator<Item = &'b V>)
    where
        V: 'b,
    {
        for item in items {
            self.remove_item(item);
        }
    }

    /// Removes every entry currently held.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Marks `key` for re-evaluation without changing its value.
    pub fn refresh_key(&mut self, key: &K) {
        self.cache.refresh(key);
    }

    /// Marks every key in `keys` for re-evaluation.
    pub fn refresh_keys(&mut self, keys: impl IntoIterator<Item = K>) {
        self.cache.refresh_many(keys);
    }

    /// Marks every currently held entry for re-evaluation.
    pub fn refresh_all(&mut self) {
        self.cache.refresh_all();
    }

    /// Replaces the entire contents of the cache with `items`: a
    /// `clear` followed by an `add_or_update_many`, applied within the
    /// same write batch and therefore atomic from a subscriber's
    /// point of view.
    pub fn load(&mut self, items: impl IntoIterator<Item = V>) {
        self.clear();
        self.add_or_update_many(items);
    }

    /// Direct access to the underlying cache, for operators that need
    /// to replay a foreign changeset (`ChangeAwareCache::clone_changes`)
    /// or otherwise bypass the key-selector convenience methods.
    pub fn raw(&mut self) -> &mut ChangeAwareCache<K, V> {
        self.cache
    }
}

use crate::cache::edit::Updater;
use crate::cache::observable_cache::ObservableCache;
use std::hash::Hash;
use std::sync::Arc;

/// The write-only facing handle for externally-sourced data: the
/// entry point an application uses to push raw data into a pipeline.
/// Only `edit` is exposed here; reading and subscribing happens
/// through [`SourceCache::observable`].
pub struct SourceCache<K, V> {
    inner: Arc<ObservableCache<K, V>>,
}

impl<K, V> SourceCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Wraps an existing cache as a source handle.
    pub fn new(cache: Arc<ObservableCache<K, V>>) -> Self {
        SourceCache { inner: cache }
    }

    /// Applies a batch of mutations, serialised with every other
    /// writer of the underlying cache.
    pub fn update_from_source(&self, action: impl FnOnce(&mut Updater<K, V>)) {
        self.inner.edit(action);
    }

    /// Like [`Self::update_from_source`], but `action` may fail,
    /// leaving the cache untouched on error.
    pub fn update_from_source_with_error_handler<E>(
        &self,
        action: impl FnOnce(&mut Updater<K, V>) -> Result<(), E>,
    ) -> Result<(), E> {
        self.inner.edit_with_error_handler(action)
    }

    /// The full read/subscribe surface backing this handle.
    pub fn observable(&self) -> Arc<ObservableCache<K, V>> {
        self.inner.clone()
    }
}

impl<K, V> Clone for SourceCache<K, V> {
    fn clone(&self) -> Self {
        SourceCache {
            inner: self.inner.clone(),
        }
    }
}

use crate::cache::edit::Updater;
use crate::cache::observable_cache::ObservableCache;
use std::hash::Hash;
use std::sync::Arc;

/// The write-only facing handle an operator uses to publish its
/// derived output: the operator-side analogue of [`crate::cache::SourceCache`].
/// Only `edit` is exposed here; the operator keeps the full
/// [`ObservableCache`] privately for its own reads.
pub struct IntermediateCache<K, V> {
    inner: Arc<ObservableCache<K, V>>,
}

impl<K, V> IntermediateCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Wraps an existing cache as an intermediate handle.
    pub fn new(cache: Arc<ObservableCache<K, V>>) -> Self {
        IntermediateCache { inner: cache }
    }

    /// Applies a batch of derived mutations.
    pub fn update_from_intermediate(&self, action: impl FnOnce(&mut Updater<K, V>)) {
        self.inner.edit(action);
    }

    /// Like [`Self::update_from_intermediate`], but `action` may fail,
    /// leaving the cache untouched on error.
    pub fn update_from_intermediate_with_error_handler<E>(
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

impl<K, V> Clone for IntermediateCache<K, V> {
    fn clone(&self) -> Self {
        IntermediateCache {
            inner: self.inner.clone(),
        }
    }
}

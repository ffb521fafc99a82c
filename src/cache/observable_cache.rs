use crate::cache::edit::Updater;
use crate::cache::reader_writer::ReaderWriter;
use crate::change::Change;
use crate::changeset::ChangeSet;
use crate::error::CacheError;
use crate::operators::filter::{apply_filter_change, Predicate};
use crate::subject::{Notification, Subject};
use crossbeam_utils::atomic::AtomicCell;
use futures_channel::mpsc;
use futures_util::stream::Stream;
use parking_lot::Mutex;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// The public, mutable, observable cache handle: a keyed store that
/// publishes the changeset of every edit to its subscribers.
///
/// Cloning a `KeyOf` closure in is how each value supplies its own key;
/// see [`Updater`] for the write-side convenience methods this enables.
pub struct ObservableCache<K, V> {
    reader_writer: ReaderWriter<K, V>,
    key_of: Arc<dyn Fn(&V) -> K + Send + Sync>,
    changes: Subject<ChangeSet<K, V>, CacheError<K>>,
    count: Subject<usize, CacheError<K>>,
    last_published_count: AtomicCell<Option<usize>>,
    /// Held for the duration of an edit or a `connect`/`watch`
    /// subscription setup, so a subscriber can never observe a change
    /// published between taking its initial snapshot and registering.
    publish_lock: Mutex<()>,
    disposed: AtomicCell<bool>,
}

impl<K, V> ObservableCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// An empty cache whose values supply their own key via `key_of`.
    pub fn new(key_of: impl Fn(&V) -> K + Send + Sync + 'static) -> Self {
        ObservableCache {
            reader_writer: ReaderWriter::new(),
            key_of: Arc::new(key_of),
            changes: Subject::new(),
            count: Subject::new(),
            last_published_count: AtomicCell::new(None),
            publish_lock: Mutex::new(()),
            disposed: AtomicCell::new(false),
        }
    }

    /// Applies a batch of mutations atomically, publishing the
    /// resulting changeset (if non-empty) to every subscriber. An
    /// add-then-remove of the same key within `action` nets to nothing
    /// and is never published.
    pub fn edit(&self, action: impl FnOnce(&mut Updater<K, V>)) {
        let result: Result<(), std::convert::Infallible> =
            self.edit_with_error_handler(|updater| {
                action(updater);
                Ok(())
            });
        result.unwrap_or_else(|never| match never {});
    }

    /// Like [`Self::edit`], but `action` may fail. On failure the cache
    /// is left exactly as it was before the call; no changeset is
    /// published.
    pub fn edit_with_error_handler<E>(
        &self,
        action: impl FnOnce(&mut Updater<K, V>) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.disposed.load() {
            log::warn!("edit ignored: cache has already been disposed");
            return Ok(());
        }

        let _publish_guard = self.publish_lock.lock();
        let key_of = self.key_of.clone();
        let (changes, _revision) = self.reader_writer.try_write(move |cache| {
            let mut updater = Updater::new(cache, &*key_of);
            action(&mut updater)
        })?;

        if !changes.is_empty() {
            log::debug!("publishing {} changes", changes.len());
            let new_count = self.reader_writer.count();
            self.changes.next(changes);
            self.publish_count_if_changed(new_count);
        }
        Ok(())
    }

    fn publish_count_if_changed(&self, new_count: usize) {
        let previous = self.last_published_count.swap(Some(new_count));
        if previous != Some(new_count) {
            self.count.next(new_count);
        }
    }

    /// Looks up the current value for `key`.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.reader_writer.lookup(key)
    }

    /// Current entry count.
    pub fn count(&self) -> usize {
        self.reader_writer.count()
    }

    /// A one-shot snapshot of every `(key, value)` pair, optionally
    /// restricted to those matching `predicate`. Unlike `connect`, this
    /// does not subscribe to future changes.
    pub fn preview(&self, predicate: Option<&dyn Fn(&V) -> bool>) -> Vec<(K, V)> {
        let items = self.reader_writer.key_values();
        match predicate {
            Some(predicate) => items.into_iter().filter(|(_, v)| predicate(v)).collect(),
            None => items,
        }
    }

    /// Subscribes to the live changeset stream: an initial synthetic
    /// changeset of `Add`s reflecting the current contents, followed by
    /// every subsequent edit's changeset, optionally restricted to
    /// items matching `predicate`.
    ///
    /// When `predicate` is supplied, each change is independently
    /// re-evaluated against it using private per-subscriber state, so
    /// an item crossing the predicate boundary correctly emits an
    /// `Add`/`Remove` rather than being silently included or dropped.
    pub fn connect(&self, predicate: Option<Predicate<V>>) -> ConnectStream<K, V> {
        let _publish_guard = self.publish_lock.lock();
        let snapshot = self.reader_writer.key_values();

        let initial: Vec<Change<K, V>> = match &predicate {
            Some(predicate) => snapshot
                .into_iter()
                .filter(|(_, v)| predicate(v))
                .map(|(k, v)| Change::add(k, v))
                .collect(),
            None => snapshot.into_iter().map(|(k, v)| Change::add(k, v)).collect(),
        };

        let receiver = self.changes.subscribe();

        ConnectStream {
            initial: Some(ChangeSet::from_changes(initial)),
            receiver,
            predicate,
            filter_state: crate::cache::change_aware_cache::ChangeAwareCache::new(),
        }
    }

    /// Subscribes to the lifecycle of a single key: a synthetic initial
    /// `Add` if the key is currently present, then every subsequent
    /// change affecting that key.
    pub fn watch(&self, key: K) -> Watch<K, V> {
        let _publish_guard = self.publish_lock.lock();
        let initial = self
            .reader_writer
            .lookup(&key)
            .map(|value| Change::add(key.clone(), value));
        let receiver = self.changes.subscribe();
        Watch {
            key,
            initial,
            receiver,
        }
    }

    /// Subscribes to the entry count: the current count immediately,
    /// then every subsequent distinct count (consecutive duplicates are
    /// suppressed).
    pub fn count_changed(&self) -> CountChanged<K> {
        let _publish_guard = self.publish_lock.lock();
        let current = self.reader_writer.count();
        let receiver = self.count.subscribe();
        CountChanged {
            initial: Some(current),
            receiver,
        }
    }

    /// Tears the cache down: completes both subjects (current
    /// subscribers see stream completion, not an error) and marks all
    /// further edits as no-ops. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true) {
            return;
        }
        self.changes.complete();
        self.count.complete();
    }

    /// True once [`Self::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load()
    }
}

/// Stream returned by [`ObservableCache::connect`].
pub struct ConnectStream<K, V> {
    initial: Option<ChangeSet<K, V>>,
    receiver: mpsc::UnboundedReceiver<Notification<ChangeSet<K, V>, CacheError<K>>>,
    predicate: Option<Predicate<V>>,
    filter_state: crate::cache::change_aware_cache::ChangeAwareCache<K, V>,
}

impl<K, V> Stream for ConnectStream<K, V>
where
    K: Clone + Eq + Hash + Unpin,
    V: Clone + Unpin,
{
    type Item = Result<ChangeSet<K, V>, Arc<CacheError<K>>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(initial) = this.initial.take() {
            if let Some(predicate) = &this.predicate {
                for change in initial.iter() {
                    apply_filter_change(&mut this.filter_state, &**predicate, change);
                }
                let seeded = this.filter_state.capture_changes();
                return Poll::Ready(Some(Ok(seeded)));
            } else {
                return Poll::Ready(Some(Ok(initial)));
            }
        }

        loop {
            match Pin::new(&mut this.receiver).poll_next(cx) {
                Poll::Ready(Some(Notification::Next(changes))) => {
                    if let Some(predicate) = &this.predicate {
                        for change in changes.iter() {
                            apply_filter_change(&mut this.filter_state, &**predicate, change);
                        }
                        let filtered = this.filter_state.capture_changes();
                        if filtered.is_empty() {
                            continue;
                        }
                        return Poll::Ready(Some(Ok(filtered)));
                    }
                    return Poll::Ready(Some(Ok(changes)));
                }
                Poll::Ready(Some(Notification::Error(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Stream returned by [`ObservableCache::watch`].
pub struct Watch<K, V> {
    key: K,
    initial: Option<Change<K, V>>,
    receiver: mpsc::UnboundedReceiver<Notification<ChangeSet<K, V>, CacheError<K>>>,
}

impl<K, V> Stream for Watch<K, V>
where
    K: Clone + Eq + Hash + Unpin,
    V: Clone + Unpin,
{
    type Item = Result<Change<K, V>, Arc<CacheError<K>>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(initial) = this.initial.take() {
            return Poll::Ready(Some(Ok(initial)));
        }

        loop {
            match Pin::new(&mut this.receiver).poll_next(cx) {
                Poll::Ready(Some(Notification::Next(changes))) => {
                    if let Some(matching) = changes.iter().find(|c| *c.key() == this.key) {
                        return Poll::Ready(Some(Ok(matching.clone())));
                    }
                    continue;
                }
                Poll::Ready(Some(Notification::Error(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Stream returned by [`ObservableCache::count_changed`].
pub struct CountChanged<K> {
    initial: Option<usize>,
    receiver: mpsc::UnboundedReceiver<Notification<usize, CacheError<K>>>,
}

impl<K> Stream for CountChanged<K>
where
    K: Unpin,
{
    type Item = usize;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(initial) = this.initial.take() {
            return Poll::Ready(Some(initial));
        }
        match Pin::new(&mut this.receiver).poll_next(cx) {
            Poll::Ready(Some(Notification::Next(count))) => Poll::Ready(Some(count)),
            Poll::Ready(Some(Notification::Error(_))) | Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        id: u32,
        value: i32,
    }

    fn cache() -> ObservableCache<u32, Item> {
        ObservableCache::new(|item: &Item| item.id)
    }

    #[tokio::test]
    async fn add_then_remove_in_same_edit_publishes_nothing() {
        let cache = cache();
        let mut stream = cache.connect(None);
        assert!(stream.next().await.unwrap().unwrap().is_empty());

        cache.edit(|updater| {
            updater.add_or_update(Item { id: 1, value: 1 });
            updater.remove_key(&1);
        });

        // No further changeset should already be queued; dispose to end the stream cleanly.
        cache.dispose();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn connect_with_predicate_emits_add_remove_on_boundary_crossing() {
        let cache = cache();
        cache.edit(|updater| updater.add_or_update(Item { id: 1, value: 1 }));

        let mut stream = cache.connect(Some(Arc::new(|item: &Item| item.value > 5)));
        let initial = stream.next().await.unwrap().unwrap();
        assert!(initial.is_empty());

        cache.edit(|updater| updater.add_or_update(Item { id: 1, value: 10 }));
        let crossed = stream.next().await.unwrap().unwrap();
        assert_eq!(crossed.counts().adds, 1);

        cache.edit(|updater| updater.add_or_update(Item { id: 1, value: 1 }));
        let crossed_back = stream.next().await.unwrap().unwrap();
        assert_eq!(crossed_back.counts().removes, 1);
    }

    #[tokio::test]
    async fn watch_yields_initial_then_lifecycle_changes() {
        let cache = cache();
        cache.edit(|updater| updater.add_or_update(Item { id: 7, value: 1 }));

        let mut watch = cache.watch(7);
        let initial = watch.next().await.unwrap().unwrap();
        assert_eq!(initial.reason(), crate::change::ChangeReason::Add);

        cache.edit(|updater| updater.remove_key(&7));
        let removed = watch.next().await.unwrap().unwrap();
        assert_eq!(removed.reason(), crate::change::ChangeReason::Remove);
    }

    #[tokio::test]
    async fn count_changed_suppresses_consecutive_duplicates() {
        let cache = cache();
        let mut counts = cache.count_changed();
        assert_eq!(counts.next().await, Some(0));

        cache.edit(|updater| updater.add_or_update(Item { id: 1, value: 1 }));
        assert_eq!(counts.next().await, Some(1));

        // Updating an existing key doesn't change the count; no further
        // notification should be produced for this edit.
        cache.edit(|updater| updater.add_or_update(Item { id: 1, value: 2 }));
        cache.edit(|updater| updater.add_or_update(Item { id: 2, value: 2 }));
        assert_eq!(counts.next().await, Some(2));
    }

    #[test]
    fn edit_with_error_handler_rolls_back_on_failure() {
        let cache = cache();
        cache.edit(|updater| updater.add_or_update(Item { id: 1, value: 1 }));

        let result: Result<(), &str> = cache.edit_with_error_handler(|updater| {
            updater.add_or_update(Item { id: 2, value: 2 });
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(cache.count(), 1);
        assert!(cache.lookup(&2).is_none());
    }
}

use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use crate::error::SafeCallbackError;
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, `Send` future, as returned by a [`TransformAsync`] projection.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Projects each value `V -> V2` while preserving keys, forwarding the
/// last-projected value on `Remove`/`Refresh`/`Moved` rather than
/// re-running the projection.
pub struct Transform<K, V2> {
    cache: FxIndexMap<K, V2>,
}

impl<K, V2> Transform<K, V2>
where
    K: Clone + Eq + Hash,
    V2: Clone,
{
    /// A transform with no items yet observed.
    pub fn new() -> Self {
        Transform {
            cache: FxIndexMap::default(),
        }
    }

    /// Applies `project` to every `Add`/`Update` in `changes`, forwards
    /// the retained projection for `Remove`/`Refresh`/`Moved`.
    pub fn process<V>(&mut self, changes: &ChangeSet<K, V>, mut project: impl FnMut(&K, &V) -> V2) -> ChangeSet<K, V2> {
        let mut out = Vec::with_capacity(changes.len());
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let projected = project(change.key(), change.current());
                    self.cache.insert(change.key().clone(), projected.clone());
                    out.push(Change::add(change.key().clone(), projected));
                }
                ChangeReason::Update => {
                    let projected = project(change.key(), change.current());
                    let previous = self.cache.insert(change.key().clone(), projected.clone());
                    if let Some(previous) = previous {
                        out.push(Change::update(change.key().clone(), projected, previous));
                    } else {
                        out.push(Change::add(change.key().clone(), projected));
                    }
                }
                ChangeReason::Remove => {
                    if let Some(previous) = self.cache.shift_remove(change.key()) {
                        out.push(Change::remove(change.key().clone(), previous));
                    }
                }
                ChangeReason::Refresh => {
                    if let Some(current) = self.cache.get(change.key()) {
                        out.push(Change::refresh(change.key().clone(), current.clone()));
                    }
                }
                ChangeReason::Moved => {
                    if let Some(current) = self.cache.get(change.key()) {
                        out.push(Change::moved(
                            change.key().clone(),
                            current.clone(),
                            change.current_index(),
                            change.previous_index(),
                        ));
                    }
                }
            }
        }
        ChangeSet::from_changes(out)
    }

    /// Re-runs the projection for the named keys (a "force transform"
    /// signal), given their current upstream values, emitting `Update`
    /// for each.
    pub fn force_transform<V>(
        &mut self,
        items: impl IntoIterator<Item = (K, V)>,
        mut project: impl FnMut(&K, &V) -> V2,
    ) -> ChangeSet<K, V2> {
        let mut out = Vec::new();
        for (key, value) in items {
            let projected = project(&key, &value);
            let previous = self.cache.insert(key.clone(), projected.clone());
            if let Some(previous) = previous {
                out.push(Change::update(key, projected, previous));
            }
        }
        ChangeSet::from_changes(out)
    }
}

impl<K, V2> Default for Transform<K, V2>
where
    K: Clone + Eq + Hash,
    V2: Clone,
{
    fn default() -> Self {
        Transform::new()
    }
}

/// Like [`Transform`], but the projection is asynchronous. Concurrency
/// is bounded by `concurrency`; the upstream's serialised write model
/// means only one batch is ever in flight, so bounding and ordering
/// projections within a batch (via `buffered`, which preserves input
/// order) is sufficient to preserve per-key ordering across batches too.
pub struct TransformAsync<K, V, V2, E> {
    project: Arc<dyn Fn(K, V) -> BoxFuture<'static, Result<V2, E>> + Send + Sync>,
    concurrency: usize,
    cache: FxIndexMap<K, V2>,
    on_error: Option<Arc<dyn Fn(SafeCallbackError<K, V, E>) + Send + Sync>>,
}

impl<K, V, V2, E> TransformAsync<K, V, V2, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    V2: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// A transform running up to `concurrency` projections at once.
    pub fn new(concurrency: usize, project: impl Fn(K, V) -> BoxFuture<'static, Result<V2, E>> + Send + Sync + 'static) -> Self {
        TransformAsync {
            project: Arc::new(project),
            concurrency: concurrency.max(1),
            cache: FxIndexMap::default(),
            on_error: None,
        }
    }

    /// Routes projection failures to `handler` instead of propagating
    /// them, dropping the failing change while keeping the stream alive.
    pub fn with_error_handler(mut self, handler: impl Fn(SafeCallbackError<K, V, E>) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Applies `changes`, awaiting all `Add`/`Update` projections.
    pub async fn process(&mut self, changes: ChangeSet<K, V>) -> ChangeSet<K, V2> {
        let to_project: Vec<Change<K, V>> = changes
            .iter()
            .filter(|c| matches!(c.reason(), ChangeReason::Add | ChangeReason::Update))
            .cloned()
            .collect();

        let project = self.project.clone();
        let projected: Vec<(Change<K, V>, Result<V2, E>)> = stream::iter(to_project.into_iter())
            .map(|change| {
                let project = project.clone();
                async move {
                    let key = change.key().clone();
                    let value = change.current().clone();
                    let result = project(key, value).await;
                    (change, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        let mut projected = projected.into_iter();

        let mut out = Vec::with_capacity(changes.len());
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add | ChangeReason::Update => {
                    let (original, result) = projected.next().expect("one projected result per add/update change");
                    match result {
                        Ok(projected_value) => {
                            let previous = self.cache.insert(original.key().clone(), projected_value.clone());
                            match previous {
                                Some(previous) => out.push(Change::update(original.key().clone(), projected_value, previous)),
                                None => out.push(Change::add(original.key().clone(), projected_value)),
                            }
                        }
                        Err(error) => {
                            if let Some(handler) = &self.on_error {
                                handler(SafeCallbackError {
                                    error,
                                    key: original.key().clone(),
                                    value: Some(original.current().clone()),
                                });
                            }
                        }
                    }
                }
                ChangeReason::Remove => {
                    if let Some(previous) = self.cache.shift_remove(change.key()) {
                        out.push(Change::remove(change.key().clone(), previous));
                    }
                }
                ChangeReason::Refresh => {
                    if let Some(current) = self.cache.get(change.key()) {
                        out.push(Change::refresh(change.key().clone(), current.clone()));
                    }
                }
                ChangeReason::Moved => {
                    if let Some(current) = self.cache.get(change.key()) {
                        out.push(Change::moved(
                            change.key().clone(),
                            current.clone(),
                            change.current_index(),
                            change.previous_index(),
                        ));
                    }
                }
            }
        }
        ChangeSet::from_changes(out)
    }
}

/// Flattens each parent value into zero or more keyed children. A
/// parent's removal removes all of its children; children carry their
/// own key space (which may overlap across parents only if the caller
/// arranges parent-local uniqueness).
pub struct TransformMany<PK, CK, C> {
    children_by_parent: FxIndexMap<PK, Vec<(CK, C)>>,
}

impl<PK, CK, C> TransformMany<PK, CK, C>
where
    PK: Clone + Eq + Hash,
    CK: Clone + Eq,
    C: Clone,
{
    /// A transform-many with no parents yet observed.
    pub fn new() -> Self {
        TransformMany {
            children_by_parent: FxIndexMap::default(),
        }
    }

    /// Applies `expand` to every changed parent, reconciling its
    /// emitted children against what was previously emitted for it.
    pub fn process<P>(&mut self, changes: &ChangeSet<PK, P>, mut expand: impl FnMut(&PK, &P) -> Vec<(CK, C)>) -> ChangeSet<CK, C> {
        let mut out = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let children = expand(change.key(), change.current());
                    for (ck, cv) in &children {
                        out.push(Change::add(ck.clone(), cv.clone()));
                    }
                    self.children_by_parent.insert(change.key().clone(), children);
                }
                ChangeReason::Update => {
                    let old = self.children_by_parent.shift_remove(change.key()).unwrap_or_default();
                    for (ck, cv) in &old {
                        out.push(Change::remove(ck.clone(), cv.clone()));
                    }
                    let new_children = expand(change.key(), change.current());
                    for (ck, cv) in &new_children {
                        out.push(Change::add(ck.clone(), cv.clone()));
                    }
                    self.children_by_parent.insert(change.key().clone(), new_children);
                }
                ChangeReason::Remove => {
                    if let Some(old) = self.children_by_parent.shift_remove(change.key()) {
                        for (ck, cv) in old {
                            out.push(Change::remove(ck, cv));
                        }
                    }
                }
                ChangeReason::Refresh => {
                    if let Some(old) = self.children_by_parent.get(change.key()).cloned() {
                        let new_children = expand(change.key(), change.current());
                        for (ck, cv) in &old {
                            if !new_children.iter().any(|(nk, _)| nk == ck) {
                                out.push(Change::remove(ck.clone(), cv.clone()));
                            }
                        }
                        for (ck, cv) in &new_children {
                            if old.iter().any(|(ok, _)| ok == ck) {
                                out.push(Change::refresh(ck.clone(), cv.clone()));
                            } else {
                                out.push(Change::add(ck.clone(), cv.clone()));
                            }
                        }
                        self.children_by_parent.insert(change.key().clone(), new_children);
                    }
                }
                ChangeReason::Moved => {}
            }
        }
        ChangeSet::from_changes(out)
    }
}

impl<PK, CK, C> Default for TransformMany<PK, CK, C>
where
    PK: Clone + Eq + Hash,
    CK: Clone + Eq,
    C: Clone,
{
    fn default() -> Self {
        TransformMany::new()
    }
}

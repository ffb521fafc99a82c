use parking_lot::Mutex;
use std::sync::Arc;

/// Shares one upstream resource across subscribers by reference count:
/// the first `acquire` opens it (calling `factory`), the last dropped
/// guard closes it, and a subsequent `acquire` after the count has
/// dropped to zero reopens a fresh one. This is the "RefCount"/
/// "CacheOnDemand" sharing policy — an upstream subscription opened on
/// demand rather than eagerly.
pub struct RefCount<T> {
    factory: Arc<dyn Fn() -> T + Send + Sync>,
    inner: Mutex<Option<(T, usize)>>,
}

impl<T> RefCount<T> {
    /// A not-yet-open resource, built by `factory` on first `acquire`.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        RefCount {
            factory: Arc::new(factory),
            inner: Mutex::new(None),
        }
    }

    /// Acquires a reference, opening the upstream resource if this is
    /// the first outstanding one. The resource stays open for as long
    /// as the returned guard (or a clone of it, once cloned) lives.
    pub fn acquire(self: &Arc<Self>) -> RefCountGuard<T> {
        let mut inner = self.inner.lock();
        match inner.as_mut() {
            Some((_, count)) => *count += 1,
            None => *inner = Some(((self.factory)(), 1)),
        }
        drop(inner);
        RefCountGuard { refcount: self.clone() }
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        if let Some((_, count)) = inner.as_mut() {
            *count -= 1;
            if *count == 0 {
                *inner = None;
            }
        }
    }

    /// Runs `f` against the currently-open resource, if any is open.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.inner.lock();
        inner.as_ref().map(|(resource, _)| f(resource))
    }

    /// True while at least one guard is outstanding.
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Number of outstanding guards (0 if not open).
    pub fn count(&self) -> usize {
        self.inner.lock().as_ref().map(|(_, count)| *count).unwrap_or(0)
    }
}

/// A held reference into a [`RefCount`]'s shared resource. Dropping it
/// releases the reference, closing the resource if it was the last.
pub struct RefCountGuard<T> {
    refcount: Arc<RefCount<T>>,
}

impl<T> Clone for RefCountGuard<T> {
    fn clone(&self) -> Self {
        let mut inner = self.refcount.inner.lock();
        if let Some((_, count)) = inner.as_mut() {
            *count += 1;
        }
        drop(inner);
        RefCountGuard { refcount: self.refcount.clone() }
    }
}

impl<T> Drop for RefCountGuard<T> {
    fn drop(&mut self) {
        self.refcount.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn first_acquire_opens_and_last_drop_closes() {
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_clone = opens.clone();
        let refcount = Arc::new(RefCount::new(move || {
            opens_clone.fetch_add(1, Ordering::SeqCst);
            42
        }));

        let guard_a = refcount.acquire();
        let guard_b = refcount.acquire();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(refcount.count(), 2);

        drop(guard_a);
        assert!(refcount.is_open());
        drop(guard_b);
        assert!(!refcount.is_open());
    }

    #[test]
    fn reacquiring_after_zero_reopens_fresh() {
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_clone = opens.clone();
        let refcount = Arc::new(RefCount::new(move || {
            opens_clone.fetch_add(1, Ordering::SeqCst);
            ()
        }));

        drop(refcount.acquire());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        drop(refcount.acquire());
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }
}

use std::fmt;

/// Errors produced by the cache's own bookkeeping: illegal arguments
/// to an otherwise-infallible operation.
///
/// Modeled, like the rest of this crate's error surface, as a plain
/// enum with a hand-written `Display`/`Error` impl rather than via a
/// derive macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError<K: fmt::Debug> {
    /// A `refresh`/`remove` (or similar) named a key that is not present.
    MissingKey(K),
    /// A `Change` was constructed with an index that violates its
    /// reason's invariants (e.g. a negative index on a `Moved` change).
    InvalidIndex {
        /// The key the offending change concerned.
        key: K,
        /// The out-of-range index.
        index: isize,
    },
    /// An operation was attempted after the owning cache was disposed.
    AlreadyDisposed,
}

impl<K: fmt::Debug> fmt::Display for CacheError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::MissingKey(key) => write!(f, "no entry exists for key {:?}", key),
            CacheError::InvalidIndex { key, index } => {
                write!(f, "invalid index {} for key {:?}", index, key)
            }
            CacheError::AlreadyDisposed => write!(f, "cache has already been disposed"),
        }
    }
}

impl<K: fmt::Debug> std::error::Error for CacheError<K> {}

/// Carries a predicate/selector failure to a "safe" operator variant's
/// error callback.
///
/// The failing key/value are preserved so the callback can log or
/// report without the operator itself needing to know how.
#[derive(Debug)]
pub struct SafeCallbackError<K, V, E> {
    /// The underlying error the user closure raised.
    pub error: E,
    /// The key whose projection/predicate failed.
    pub key: K,
    /// The value that was being projected/tested, if still available.
    pub value: Option<V>,
}

impl<K: fmt::Debug, V, E: fmt::Display> fmt::Display for SafeCallbackError<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operator callback failed for key {:?}: {}", self.key, self.error)
    }
}

impl<K: fmt::Debug, V: fmt::Debug, E: fmt::Display + fmt::Debug> std::error::Error
    for SafeCallbackError<K, V, E>
{
}

use crossbeam_utils::atomic::AtomicCell;

/// A monotonically increasing edit-batch counter. Every successful
/// [`crate::cache::ReaderWriter::write`] bumps the cache's revision by
/// one; it is not exposed for cross-cache comparison, only used
/// internally to give each subscriber's count subject and `QueryWhenChanged`
/// snapshot a stable "as of" marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(u64);

impl Revision {
    /// The revision before any edits have been applied.
    pub fn start() -> Self {
        Revision(0)
    }

    /// The next revision after this one.
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

/// A [`Revision`] that can be read and incremented without taking a lock.
#[derive(Debug)]
pub struct AtomicRevision(AtomicCell<Revision>);

impl AtomicRevision {
    /// An atomic counter starting at [`Revision::start`].
    pub fn start() -> Self {
        AtomicRevision(AtomicCell::new(Revision::start()))
    }

    /// Reads the current value.
    pub fn load(&self) -> Revision {
        self.0.load()
    }

    /// Bumps the counter and returns the value it held beforehand.
    pub fn fetch_then_increment(&self) -> Revision {
        let mut current = self.load();
        loop {
            let next = current.next();
            match self.0.compare_exchange(current, next) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicRevision {
    fn default() -> Self {
        AtomicRevision::start()
    }
}

use crate::changeset::ChangeSet;

/// Buffers changesets and emits nothing until the initial load
/// changeset is observed from upstream, then flushes everything
/// buffered as one batch. A degenerate case of [`crate::operators::batch_if::BatchIf`]
/// whose gate is "has the initial load happened yet".
pub struct DeferUntilLoaded<K, V> {
    loaded: bool,
    buffer: Vec<ChangeSet<K, V>>,
}

impl<K, V> DeferUntilLoaded<K, V> {
    /// Starts in the un-loaded state: every changeset is buffered.
    pub fn new() -> Self {
        DeferUntilLoaded {
            loaded: false,
            buffer: Vec::new(),
        }
    }

    /// Applies an upstream changeset. `is_initial_load` marks the
    /// changeset that completes the initial load; until it arrives,
    /// every changeset is buffered and `None` is returned. On the
    /// initial-load changeset, everything buffered (it included) is
    /// flushed as a single combined changeset. After that, every
    /// changeset passes straight through.
    pub fn process(&mut self, changes: ChangeSet<K, V>, is_initial_load: bool) -> Option<ChangeSet<K, V>> {
        if self.loaded {
            return Some(changes);
        }

        self.buffer.push(changes);
        if !is_initial_load {
            return None;
        }

        self.loaded = true;
        let mut combined = ChangeSet::with_capacity(self.buffer.iter().map(ChangeSet::len).sum());
        for buffered in self.buffer.drain(..) {
            combined.extend(buffered);
        }
        Some(combined)
    }

    /// True once the initial load changeset has been observed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl<K, V> Default for DeferUntilLoaded<K, V> {
    fn default() -> Self {
        DeferUntilLoaded::new()
    }
}

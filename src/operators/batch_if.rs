use crate::changeset::ChangeSet;

/// Accumulates changesets until released, concatenating them into one
/// combined changeset at release time.
pub struct Batch<K, V> {
    buffered: Vec<ChangeSet<K, V>>,
}

impl<K, V> Batch<K, V> {
    /// An empty batch.
    pub fn new() -> Self {
        Batch { buffered: Vec::new() }
    }

    /// Buffers a changeset. A no-op for an already-empty changeset.
    pub fn push(&mut self, changes: ChangeSet<K, V>) {
        if !changes.is_empty() {
            self.buffered.push(changes);
        }
    }

    /// Concatenates and clears everything buffered. `None` if nothing
    /// was buffered.
    pub fn release(&mut self) -> Option<ChangeSet<K, V>> {
        if self.buffered.is_empty() {
            return None;
        }
        let mut combined = ChangeSet::with_capacity(self.buffered.iter().map(ChangeSet::len).sum());
        for changes in self.buffered.drain(..) {
            combined.extend(changes);
        }
        Some(combined)
    }

    /// True if nothing is currently buffered.
    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }
}

impl<K, V> Default for Batch<K, V> {
    fn default() -> Self {
        Batch::new()
    }
}

/// A [`Batch`] gated by an externally driven boolean signal — a
/// gate observable or a time window, in the embedder's terms. While
/// the gate is closed, every changeset is buffered; opening it (or
/// processing while already open) releases everything concatenated.
pub struct BatchIf<K, V> {
    batch: Batch<K, V>,
    gate_open: bool,
}

impl<K, V> BatchIf<K, V> {
    /// A batch gate starting open or closed.
    pub fn new(initially_open: bool) -> Self {
        BatchIf {
            batch: Batch::new(),
            gate_open: initially_open,
        }
    }

    /// Applies an upstream changeset: passed straight through while the
    /// gate is open, buffered otherwise.
    pub fn process(&mut self, changes: ChangeSet<K, V>) -> Option<ChangeSet<K, V>> {
        if self.gate_open {
            Some(changes)
        } else {
            self.batch.push(changes);
            None
        }
    }

    /// Changes the gate's state, releasing everything buffered if it
    /// is now open.
    pub fn set_gate(&mut self, open: bool) -> Option<ChangeSet<K, V>> {
        self.gate_open = open;
        if open {
            self.batch.release()
        } else {
            None
        }
    }

    /// True while the gate is open.
    pub fn is_open(&self) -> bool {
        self.gate_open
    }
}

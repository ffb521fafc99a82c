use std::fmt;

/// The reason a [`Change`] was produced.
///
/// `Refresh` signals that a value's downstream-visible state may have
/// changed without the value itself being replaced (e.g. a watched
/// property ticked). `Moved` signals a pure position change with no
/// value change at all.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// The key was not previously present and now is.
    Add,
    /// The key was previously present and its value was replaced.
    Update,
    /// The key was previously present and is no longer.
    Remove,
    /// The key's value did not change, but consumers should re-evaluate it.
    Refresh,
    /// The key's position changed; its value did not.
    Moved,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeReason::Add => "Add",
            ChangeReason::Update => "Update",
            ChangeReason::Remove => "Remove",
            ChangeReason::Refresh => "Refresh",
            ChangeReason::Moved => "Moved",
        };
        f.write_str(s)
    }
}

/// An index that is not meaningful for a given change (e.g. an unsorted
/// cache does not track positions).
pub const NO_INDEX: isize = -1;

/// An immutable record describing a single per-key mutation.
///
/// # Invariants
///
/// - `Add` implies `previous` is `None`.
/// - `Update` implies `previous` is `Some`.
/// - `Moved` implies both indices are `>= 0`, `previous` is `None`, and
///   the value did not change (`current` is simply carried along).
/// - `Refresh` implies `previous` is `None` and `current` holds the
///   present state.
#[derive(Clone, Debug)]
pub struct Change<K, V> {
    reason: ChangeReason,
    key: K,
    current: V,
    previous: Option<V>,
    current_index: isize,
    previous_index: isize,
}

impl<K, V> Change<K, V> {
    /// Builds an `Add` change. There is no previous value and no known index.
    pub fn add(key: K, current: V) -> Self {
        Change {
            reason: ChangeReason::Add,
            key,
            current,
            previous: None,
            current_index: NO_INDEX,
            previous_index: NO_INDEX,
        }
    }

    /// Builds an `Update` change carrying the replaced value.
    pub fn update(key: K, current: V, previous: V) -> Self {
        Change {
            reason: ChangeReason::Update,
            key,
            current,
            previous: Some(previous),
            current_index: NO_INDEX,
            previous_index: NO_INDEX,
        }
    }

    /// Builds a `Remove` change carrying the value that was present.
    pub fn remove(key: K, current: V) -> Self {
        Change {
            reason: ChangeReason::Remove,
            key,
            current,
            previous: None,
            current_index: NO_INDEX,
            previous_index: NO_INDEX,
        }
    }

    /// Builds a `Refresh` change; the value is unchanged but should be
    /// re-evaluated downstream.
    pub fn refresh(key: K, current: V) -> Self {
        Change {
            reason: ChangeReason::Refresh,
            key,
            current,
            previous: None,
            current_index: NO_INDEX,
            previous_index: NO_INDEX,
        }
    }

    /// Builds a `Moved` change: a pure position change at `previous_index
    /// -> current_index`, no value replacement.
    pub fn moved(key: K, current: V, current_index: isize, previous_index: isize) -> Self {
        debug_assert!(current_index >= 0 && previous_index >= 0);
        Change {
            reason: ChangeReason::Moved,
            key,
            current,
            previous: None,
            current_index,
            previous_index,
        }
    }

    /// Attaches positional information to an already-built change
    /// (used by `Sort`/`Page`/`Virtualise` once the index is known).
    pub fn with_indices(mut self, current_index: isize, previous_index: isize) -> Self {
        self.current_index = current_index;
        self.previous_index = previous_index;
        self
    }

    /// The reason this change was produced.
    pub fn reason(&self) -> ChangeReason {
        self.reason
    }

    /// The affected key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The current value (the value after the change, or the final
    /// value for a `Remove`).
    pub fn current(&self) -> &V {
        &self.current
    }

    /// The value prior to the change, present only for `Update`.
    pub fn previous(&self) -> Option<&V> {
        self.previous.as_ref()
    }

    /// Position after the change, or `NO_INDEX` if not tracked.
    pub fn current_index(&self) -> isize {
        self.current_index
    }

    /// Position before the change, or `NO_INDEX` if not tracked.
    pub fn previous_index(&self) -> isize {
        self.previous_index
    }

    /// Decomposes the change into its key and current value, discarding
    /// the previous value and positional metadata.
    pub fn into_key_value(self) -> (K, V) {
        (self.key, self.current)
    }

    /// Maps the value carried by this change, preserving the reason and
    /// indices. Used by `Transform` to re-point a change at a projected
    /// value without re-deriving its reason.
    pub fn map_value<V2>(self, mut f: impl FnMut(V) -> V2) -> Change<K, V2> {
        Change {
            reason: self.reason,
            key: self.key,
            current: f(self.current),
            previous: self.previous.map(&mut f),
            current_index: self.current_index,
            previous_index: self.previous_index,
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Change<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.reason == other.reason
            && self.key == other.key
            && self.current == other.current
            && self.previous == other.previous
            && self.current_index == other.current_index
            && self.previous_index == other.previous_index
    }
}

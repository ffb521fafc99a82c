//! A minimal multicast primitive: the reactive-stream substrate itself
//! (subscribe/unsubscribe, scheduling, debounce, merging) is an external
//! collaborator; this module supplies just enough of it — fan-out to
//! registered receivers plus a terminal error/complete state — for the
//! cache and its operators to publish on.

use futures_channel::mpsc;
use parking_lot::Mutex;
use std::sync::Arc;

/// A value pushed through a [`Subject`]: either the next item, or a
/// terminal error that completes every subscriber. An upstream error
/// is forwarded to all subscribers and then the subject is terminated.
#[derive(Clone, Debug)]
pub enum Notification<T, E> {
    /// The next value in the sequence.
    Next(T),
    /// A terminal error. No further notifications follow.
    Error(Arc<E>),
}

struct Inner<T, E> {
    subscribers: Vec<mpsc::UnboundedSender<Notification<T, E>>>,
    terminated: Option<Arc<E>>,
}

/// A hot multicast channel of `Notification<T, E>`. Subscribing after
/// the subject has completed or errored yields a receiver that is
/// immediately closed (or immediately delivers the terminal error), so
/// disposing twice stays idempotent.
pub struct Subject<T, E> {
    inner: Mutex<Inner<T, E>>,
}

impl<T: Clone, E> Subject<T, E> {
    /// A subject with no subscribers yet.
    pub fn new() -> Self {
        Subject {
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                terminated: None,
            }),
        }
    }

    /// Registers a new receiver. Call while holding whatever lock
    /// guards the publisher's state, so the first item the caller
    /// pushes afterwards is guaranteed to be seen by this subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification<T, E>> {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.inner.lock();
        if let Some(err) = &inner.terminated {
            let _ = tx.unbounded_send(Notification::Error(err.clone()));
        } else {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Publishes `value` to every live subscriber.
    pub fn next(&self, value: T) {
        let inner = self.inner.lock();
        if inner.terminated.is_some() {
            return;
        }
        for sub in &inner.subscribers {
            let _ = sub.unbounded_send(Notification::Next(value.clone()));
        }
    }

    /// Terminates the subject with an error; every current and future
    /// subscriber observes it exactly once.
    pub fn error(&self, err: E) {
        let err = Arc::new(err);
        let mut inner = self.inner.lock();
        if inner.terminated.is_some() {
            return;
        }
        for sub in &inner.subscribers {
            let _ = sub.unbounded_send(Notification::Error(err.clone()));
        }
        inner.subscribers.clear();
        inner.terminated = Some(err);
    }

    /// Completes the subject cleanly: subscribers observe channel
    /// closure with no terminal error.
    pub fn complete(&self) {
        let mut inner = self.inner.lock();
        inner.subscribers.clear();
    }

    /// True once [`Subject::error`] has fired.
    pub fn is_terminated(&self) -> bool {
        self.inner.lock().terminated.is_some()
    }

    /// Number of currently live subscribers. Used by `RefCount`/
    /// `CacheOnDemand` to decide when to open/close the upstream.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl<T: Clone, E> Default for Subject<T, E> {
    fn default() -> Self {
        Subject::new()
    }
}

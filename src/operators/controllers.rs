use crate::operators::page::PageRequest;
use crate::operators::virtualise::VirtualRequest;
use crate::subject::{Notification, Subject};
use futures_channel::mpsc;
use parking_lot::Mutex;
use std::convert::Infallible;

/// A small external trigger observable: holds the latest value set on
/// it and multicasts every subsequent one. Used for the handful of
/// "signal" inputs operators accept besides their upstream changeset —
/// a new filter predicate, a new comparer, a page/virtual range
/// request, or a bare resort/regroup pulse (`Controller<()>`).
///
/// `current` and `subscribe` are independent calls; a caller that needs
/// "the value in effect at the moment of subscribing, with no gap" must
/// hold its own lock around both, the way [`crate::cache::ObservableCache::connect`]
/// does for its changeset subject.
pub struct Controller<T> {
    subject: Subject<T, Infallible>,
    latest: Mutex<Option<T>>,
}

impl<T: Clone> Controller<T> {
    /// A controller with no value set yet.
    pub fn new() -> Self {
        Controller {
            subject: Subject::new(),
            latest: Mutex::new(None),
        }
    }

    /// Sets the latest value and publishes it to every subscriber.
    pub fn set(&self, value: T) {
        *self.latest.lock() = Some(value.clone());
        self.subject.next(value);
    }

    /// The most recently set value, if any.
    pub fn current(&self) -> Option<T> {
        self.latest.lock().clone()
    }

    /// Subscribes to every value set from this point on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification<T, Infallible>> {
        self.subject.subscribe()
    }
}

impl<T: Clone> Default for Controller<T> {
    fn default() -> Self {
        Controller::new()
    }
}

/// Signals a bare trigger with no payload: a resort or regroup pulse.
pub type SignalController = Controller<()>;

/// Signals a page-window change.
pub type PageController = Controller<PageRequest>;

/// Signals a virtual-window change.
pub type VirtualController = Controller<VirtualRequest>;

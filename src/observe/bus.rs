//! Call Bus Module
//!
//! Explicit publish/subscribe channel carrying Call Events from the proxy to
//! its observers. Replaces any notion of a process-wide implicit signal:
//! subscriptions are handles with lifetimes tied to the unit of work they
//! measure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::observe::event::CallEvent;

// == Call Observer Trait ==
/// Receives every event published while its subscription is live.
pub trait CallObserver: Send + Sync {
    /// Handles one event. Called synchronously from the emitting call.
    fn on_call(&self, event: &CallEvent);
}

// == Bus Internals ==
#[derive(Default)]
struct BusInner {
    /// Live subscribers in subscription order
    subscribers: Mutex<Vec<(u64, Arc<dyn CallObserver>)>>,
    /// Next subscription id
    next_id: AtomicU64,
}

// A poisoned lock only means another publisher panicked mid-push; the
// list itself is still usable.
fn lock_subscribers(
    inner: &BusInner,
) -> std::sync::MutexGuard<'_, Vec<(u64, Arc<dyn CallObserver>)>> {
    inner
        .subscribers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

// == Call Bus ==
/// Publish/subscribe channel for Call Events.
///
/// Cloning the bus is cheap and every clone shares the same subscriber list.
/// Publishing snapshots the current subscribers and delivers outside the
/// lock, so subscribe/unsubscribe are safe concurrently with emission; a
/// subscriber is delivered each event at most once.
#[derive(Clone, Default)]
pub struct CallBus {
    inner: Arc<BusInner>,
}

impl CallBus {
    // == Constructor ==
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    // == Subscribe ==
    /// Registers an observer and returns its subscription handle.
    ///
    /// The observer receives every event published until the handle is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self, observer: Arc<dyn CallObserver>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock_subscribers(&self.inner).push((id, observer));
        debug!(subscription = id, "observer subscribed");
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    // == Publish ==
    /// Delivers `event` to all currently subscribed observers, in
    /// subscription order.
    pub fn publish(&self, event: &CallEvent) {
        let snapshot: Vec<Arc<dyn CallObserver>> = lock_subscribers(&self.inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer.on_call(event);
        }
    }

    // == Subscriber Count ==
    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock_subscribers(&self.inner).len()
    }
}

// == Subscription Handle ==
/// Handle for one observer registration.
///
/// Dropping the handle unsubscribes; events published afterwards are not
/// delivered to the observer.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Explicitly detaches the observer from the bus.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    fn detach(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock_subscribers(&inner).retain(|(id, _)| *id != self.id);
            debug!(subscription = self.id, "observer unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

//! Subscriber registries with per-callback failure isolation.
//!
//! [`Registry`] stores callbacks keyed by a monotonically increasing id.
//! [`Registry::subscribe`] hands back a [`Subscription`] that removes the
//! callback again; dropping the subscription does **not** unsubscribe, so
//! fire-and-forget listeners can simply ignore it.
//!
//! Emission snapshots the callback list before calling out, so a callback
//! may subscribe, unsubscribe or trigger another emission without
//! deadlocking.  A panicking callback is caught and logged; the remaining
//! callbacks still run.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T: ?Sized> {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback<T>>,
}

/// An ordered set of callbacks for one event kind.
pub struct Registry<T: ?Sized> {
    name: &'static str,
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: ?Sized + 'static> Registry<T> {
    /// Create an empty registry; `name` only appears in log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                callbacks: BTreeMap::new(),
            })),
        }
    }

    /// Register `callback` and return the handle that removes it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let id = slots.next_id;
        slots.next_id += 1;
        slots.callbacks.insert(id, Arc::new(callback));

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription {
            id,
            remove: Some(Box::new(move |id| {
                if let Some(slots) = weak.upgrade() {
                    slots
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .callbacks
                        .remove(&id);
                }
            })),
        }
    }

    /// Call every registered callback with `event`, in subscription order.
    ///
    /// Returns the number of callbacks that panicked.
    pub fn emit(&self, event: &T) -> usize {
        let callbacks: Vec<(u64, Callback<T>)> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots
                .callbacks
                .iter()
                .map(|(id, cb)| (*id, Arc::clone(cb)))
                .collect()
        };

        let mut failures = 0;
        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                failures += 1;
                log::warn!("{}: subscriber #{id} panicked; continuing", self.name);
            }
        }
        failures
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`Registry::subscribe`].
pub struct Subscription {
    id: u64,
    remove: Option<Box<dyn FnOnce(u64) + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback from its registry.  Safe to call after the
    /// registry itself has been dropped.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emits_in_subscription_order() {
        let registry: Registry<u32> = Registry::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            registry.subscribe(move |v: &u32| seen.lock().unwrap().push(format!("{tag}{v}")));
        }

        registry.emit(&7);
        assert_eq!(*seen.lock().unwrap(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_callback() {
        let registry: Registry<()> = Registry::new("test");
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        let first = registry.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&count);
        let _second = registry.subscribe(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        first.unsubscribe();
        registry.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let registry: Registry<str> = Registry::new("test");
        let delivered = Arc::new(AtomicUsize::new(0));

        registry.subscribe(|_: &str| panic!("subscriber failure"));
        let d = Arc::clone(&delivered);
        registry.subscribe(move |_: &str| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let failures = registry.emit("hello");

        assert_eq!(failures, 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_during_emit() {
        let registry = Arc::new(Registry::<()>::new("test"));
        let handle: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let h = Arc::clone(&handle);
        let sub = registry.subscribe(move |_| {
            if let Some(sub) = h.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *handle.lock().unwrap() = Some(sub);

        registry.emit(&());
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_harmless() {
        let registry: Registry<()> = Registry::new("test");
        let sub = registry.subscribe(|_| {});
        drop(registry);
        sub.unsubscribe();
    }
}

//! Synchronous publish/subscribe fan-out.
//!
//! An `EventHub` is a value its owner composes in and exposes through its
//! own interface; there is no inheritance relationship between publishers.
//! `publish` runs every callback once, in registration order, on the
//! calling thread. Subscribers must be fast and must not panic: a slow
//! subscriber stalls the publishing thread, which is the explicit contract.
//!
//! Independent hubs give no ordering guarantee relative to each other.

use std::sync::{Arc, Mutex};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct EventHub<T> {
    subscribers: Mutex<Vec<Callback<T>>>,
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback. Callbacks are invoked in registration order and
    /// are never removed; subscriber lifetime is the hub's lifetime.
    pub fn register(&self, callback: impl Fn(&T) + Send + Sync + 'static) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscribers.push(Arc::new(callback));
    }

    /// Invoke every registered callback once with `value`.
    pub fn publish(&self, value: &T) {
        // Clone the list out so a callback that registers another
        // subscriber does not deadlock on the hub lock.
        let subscribers: Vec<Callback<T>> = {
            let guard = self
                .subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        for callback in subscribers {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn publish_invokes_all_subscribers_in_order() {
        let hub = EventHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..4 {
            let order = order.clone();
            hub.register(move |value: &u32| {
                order.lock().unwrap().push((id, *value));
            });
        }

        hub.publish(&7);
        let seen = order.lock().unwrap().clone();
        assert_eq!(seen, vec![(0, 7), (1, 7), (2, 7), (3, 7)]);
    }

    #[test]
    fn publish_invokes_each_subscriber_exactly_once_per_call() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        hub.register(move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hub.publish(&());
        hub.publish(&());
        hub.publish(&());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_hub_publish_is_a_no_op() {
        let hub: EventHub<u8> = EventHub::new();
        assert!(hub.is_empty());
        hub.publish(&0);
    }

    #[test]
    fn subscriber_may_register_another_subscriber() {
        let hub = Arc::new(EventHub::new());
        let inner_hub = hub.clone();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_inner = fired.clone();
        hub.register(move |_: &()| {
            let fired = fired_inner.clone();
            inner_hub.register(move |_: &()| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        });

        hub.publish(&());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        hub.publish(&());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

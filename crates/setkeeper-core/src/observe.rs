//! Publish/subscribe helpers scoped to one owning component.
//!
//! Listeners run synchronously on the publishing thread, outside of the
//! registry lock, so a listener may subscribe or unsubscribe re-entrantly.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A set of listener functions for events of type `T`.
pub struct Listeners<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Arc::new(listener)));
            id
        };

        let registry: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    pub fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the listener registered.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A value whose subscribers see the current state on subscribe and every change after.
///
/// Stores and deliveries are serialized, so listeners observe changes in the
/// order they were stored. The delivery lock is re-entrant: a listener may
/// publish to the same observable from its own thread.
pub struct Observable<T> {
    current: Arc<Mutex<T>>,
    listeners: Listeners<T>,
    delivery: Arc<ReentrantMutex<()>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            listeners: self.listeners.clone(),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
            listeners: Listeners::new(),
            delivery: Arc::new(ReentrantMutex::new(())),
        }
    }

    pub fn get(&self) -> T {
        self.current.lock().clone()
    }

    pub fn set(&self, value: T) {
        let _delivery = self.delivery.lock();
        let published = {
            let mut current = self.current.lock();
            *current = value;
            current.clone()
        };
        self.listeners.emit(&published);
    }

    /// Store and publish `value` only if `newer(current, &value)` holds.
    pub fn set_if(&self, value: T, newer: impl FnOnce(&T, &T) -> bool) -> bool {
        let _delivery = self.delivery.lock();
        let published = {
            let mut current = self.current.lock();
            if !newer(&current, &value) {
                return false;
            }
            *current = value;
            current.clone()
        };
        self.listeners.emit(&published);
        true
    }

    /// Mutate in place and publish the result.
    pub fn update(&self, change: impl FnOnce(&mut T)) -> T {
        let _delivery = self.delivery.lock();
        let published = {
            let mut current = self.current.lock();
            change(&mut current);
            current.clone()
        };
        self.listeners.emit(&published);
        published
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let _delivery = self.delivery.lock();
        let initial = self.get();
        listener(&initial);
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observable_sends_current_value_on_subscribe() {
        let observable = Observable::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = observable.subscribe(move |value| sink.lock().push(*value));

        observable.set(2);
        observable.update(|value| *value += 1);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let listeners = Listeners::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let subscription = listeners.subscribe(move |value: &i32| *sink.lock() += value);

        listeners.emit(&5);
        subscription.unsubscribe();
        listeners.emit(&5);

        assert_eq!(*seen.lock(), 5);
        assert!(listeners.is_empty());
    }

    #[test]
    fn stale_value_is_not_published() {
        let observable = Observable::new(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = observable.subscribe(move |value| sink.lock().push(*value));

        assert!(!observable.set_if(2, |current, next| next > current));
        assert!(observable.set_if(4, |current, next| next > current));

        assert_eq!(*seen.lock(), vec![3, 4]);
        assert_eq!(observable.get(), 4);
    }

    #[test]
    fn listener_may_publish_reentrantly() {
        let observable = Observable::new(0);
        let inner = observable.clone();
        let _subscription = observable.subscribe(move |value| {
            if *value == 1 {
                inner.set(2);
            }
        });

        observable.set(1);
        assert_eq!(observable.get(), 2);
    }

    #[test]
    fn concurrent_subscribers_never_miss_a_transition() {
        for _ in 0..50 {
            let observable = Observable::new(0_u32);
            let last_seen = Arc::new(Mutex::new(None));
            let writer = {
                let observable = observable.clone();
                std::thread::spawn(move || {
                    for value in 1..=100 {
                        observable.set(value);
                    }
                })
            };
            let sink = Arc::clone(&last_seen);
            let subscription = observable.subscribe(move |value| *sink.lock() = Some(*value));
            writer.join().unwrap();

            assert_eq!(*last_seen.lock(), Some(100));
            subscription.unsubscribe();
        }
    }

    #[test]
    fn listener_may_subscribe_reentrantly() {
        let listeners: Listeners<u8> = Listeners::new();
        let inner = listeners.clone();
        let _outer = listeners.subscribe(move |_| {
            let _nested = inner.subscribe(|_| {});
        });

        listeners.emit(&0);
        assert_eq!(listeners.len(), 2);
    }
}

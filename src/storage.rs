// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-local key/value storage and write observation.
//!
//! [`KeyValueStore`] is the page's persistent string storage. [`ObservedStorage`]
//! wraps any store and lets components subscribe to writes; a subscription is
//! released when its [`Subscription`] guard is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Synchronous string storage scoped to one client.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

/// In-memory store. Keys iterate in sorted order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map still holds consistent strings.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }
}

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type Handler = Arc<dyn Fn(&str, &str) + Send + Sync>;

struct Subscriber {
    id: u64,
    predicate: Predicate,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Registry {
    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Storage wrapper that notifies subscribers after every write.
pub struct ObservedStorage<S> {
    inner: S,
    registry: Arc<Registry>,
}

impl<S: KeyValueStore> ObservedStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            registry: Arc::new(Registry::default()),
        }
    }

    /// Call `handler(key, value)` after each write whose key satisfies `predicate`.
    pub fn subscribe<P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        H: Fn(&str, &str) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers().push(Subscriber {
            id,
            predicate: Arc::new(predicate),
            handler: Arc::new(handler),
        });

        tracing::debug!(subscription = id, "Storage subscription installed");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers().len()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: KeyValueStore> KeyValueStore for ObservedStorage<S> {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) {
        // The write always lands before any observer runs.
        self.inner.set(key, value);

        // Snapshot handlers so they may write to storage or unsubscribe.
        let handlers: Vec<Handler> = self
            .registry
            .subscribers()
            .iter()
            .filter(|s| (s.predicate)(key))
            .map(|s| s.handler.clone())
            .collect();

        for handler in handlers {
            handler(key, value);
        }
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

/// Live subscription. Dropping it detaches the handler.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.subscribers().retain(|s| s.id != self.id);
            tracing::debug!(subscription = self.id, "Storage subscription released");
        }
    }
}

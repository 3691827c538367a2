// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local storage of anonymous HTTP clients, keyed by their client cookie.
//!
//! Only anonymous callers get an entry. Entries expire after a period without
//! use, and the map never grows past its capacity: when full, expired entries
//! are pruned first and then the least recently seen one is evicted.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::storage::{KeyValueStore, MemoryStorage};

/// How long an unused anonymous client is remembered.
pub const CLIENT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Most anonymous clients held at once.
pub const MAX_CLIENTS: usize = 100_000;

struct ClientEntry {
    storage: Arc<MemoryStorage>,
    last_seen: Instant,
}

pub struct AnonymousClients {
    entries: DashMap<String, ClientEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for AnonymousClients {
    fn default() -> Self {
        Self::with_limits(CLIENT_TTL, MAX_CLIENTS)
    }
}

impl AnonymousClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Storage for `client_id`, created on first use.
    pub fn storage_for(&self, client_id: &str) -> Arc<MemoryStorage> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(client_id) {
            entry.last_seen = now;
            return entry.storage.clone();
        }

        if self.entries.len() >= self.max_entries {
            self.prune_expired_at(now);
        }
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }

        self.entries
            .entry(client_id.to_string())
            .or_insert_with(|| ClientEntry {
                storage: Arc::new(MemoryStorage::new()),
                last_seen: now,
            })
            .storage
            .clone()
    }

    /// Storage for `client_id` if the client is already known.
    pub fn lookup(&self, client_id: &str) -> Option<Arc<MemoryStorage>> {
        let mut entry = self.entries.get_mut(client_id)?;
        entry.last_seen = Instant::now();
        Some(entry.storage.clone())
    }

    /// Drop `client_id` once its storage holds nothing.
    pub fn release_if_empty(&self, client_id: &str) {
        let removed = self
            .entries
            .remove_if(client_id, |_, entry| entry.storage.keys().is_empty());
        if removed.is_some() {
            tracing::debug!(client_id, "Released anonymous client");
        }
    }

    /// Drop `client_id` and its counter.
    pub fn forget(&self, client_id: &str) {
        self.entries.remove(client_id);
    }

    /// Remove clients not seen within the TTL.
    pub fn prune_expired(&self) {
        self.prune_expired_at(Instant::now());
    }

    fn prune_expired_at(&self, now: Instant) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.ttl);
        let pruned = before.saturating_sub(self.entries.len());
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired anonymous clients");
        }
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_seen)
            .map(|entry| entry.key().clone());
        if let Some(client_id) = oldest {
            self.entries.remove(&client_id);
            tracing::info!(client_id, "Evicted anonymous client at capacity");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

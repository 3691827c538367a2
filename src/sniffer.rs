// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Passive recovery of provider tokens from client storage.
//!
//! The identity provider's client library persists session material under
//! undocumented keys. When a page only learns late that it serves the
//! extension, watching those writes is the fallback path for getting a token
//! across. Everything recovered here is advisory and relayed as
//! [`Provenance::Sniffed`].

use crate::models::{Provenance, SessionToken};
use crate::relay::RelayBroadcaster;
use crate::storage::{KeyValueStore, ObservedStorage, Subscription};

/// Key substrings that mark a write as provider-related.
const WRITE_KEY_MARKERS: [&str; 3] = ["firebase", "Auth", "token"];

/// Key substrings checked by the one-shot scan.
const SCAN_KEY_MARKERS: [&str; 2] = ["firebase", "Auth"];

/// Written values must be longer than this to be inspected.
const MIN_VALUE_LEN: usize = 20;

/// A non-JSON value longer than this is taken as a raw token.
const RAW_TOKEN_LEN: usize = 100;

/// A JSON-looking value that fails to parse is taken as a token above this.
const UNPARSED_TOKEN_LEN: usize = 50;

fn key_matches(key: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| key.contains(m))
}

/// Token candidate from a storage write, if any.
pub fn candidate_from_write(key: &str, value: &str) -> Option<String> {
    if !key_matches(key, &WRITE_KEY_MARKERS)
        || value == "undefined"
        || value.len() <= MIN_VALUE_LEN
    {
        return None;
    }

    if value.starts_with('{') {
        match serde_json::from_str::<serde_json::Value>(value) {
            Ok(data) => data
                .pointer("/stsTokenManager/accessToken")
                .or_else(|| data.get("accessToken"))
                .and_then(|t| t.as_str())
                .map(str::to_string),
            Err(e) => {
                tracing::debug!(key, error = %e, "Unparseable provider data");
                (value.len() > UNPARSED_TOKEN_LEN).then(|| value.to_string())
            }
        }
    } else if value.len() > RAW_TOKEN_LEN {
        Some(value.to_string())
    } else {
        None
    }
}

/// Token candidate from an existing storage entry found by a scan.
pub fn candidate_from_scan(key: &str, value: &str) -> Option<String> {
    if !key_matches(key, &SCAN_KEY_MARKERS) || !value.starts_with('{') {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(data) => data
            .pointer("/stsTokenManager/accessToken")
            .and_then(|t| t.as_str())
            .map(str::to_string),
        Err(e) => {
            tracing::debug!(key, error = %e, "Unparseable provider data");
            (value.len() > UNPARSED_TOKEN_LEN).then(|| value.to_string())
        }
    }
}

/// Watches storage and relays anything that looks like a token.
#[derive(Clone)]
pub struct CredentialSniffer {
    relay: RelayBroadcaster,
}

impl CredentialSniffer {
    pub fn new(relay: RelayBroadcaster) -> Self {
        Self { relay }
    }

    /// Subscribe to writes on `storage`. The returned guard ends the watch.
    pub fn install<S: KeyValueStore>(&self, storage: &ObservedStorage<S>) -> Subscription {
        let relay = self.relay.clone();
        storage.subscribe(
            |key| key_matches(key, &WRITE_KEY_MARKERS),
            move |key, value| {
                if let Some(token) = candidate_from_write(key, value) {
                    tracing::info!(key, "Recovered provider token from storage write");
                    relay.broadcast(&SessionToken::new(token, Provenance::Sniffed), None);
                }
            },
        )
    }

    /// Check every existing entry once. Returns the number of candidates relayed.
    pub fn scan_now<S: KeyValueStore + ?Sized>(&self, storage: &S) -> usize {
        let mut found = 0;
        for key in storage.keys() {
            let Some(value) = storage.get(&key) else {
                continue;
            };
            if let Some(token) = candidate_from_scan(&key, &value) {
                tracing::info!(key = %key, "Recovered existing provider token");
                self.relay
                    .broadcast(&SessionToken::new(token, Provenance::Sniffed), None);
                found += 1;
            }
        }
        found
    }
}

/// Ties a sniffer subscription to a page's visible lifetime.
///
/// Mounting again replaces the previous subscription instead of stacking a
/// second one.
#[derive(Default)]
pub struct SnifferMount {
    subscription: Option<Subscription>,
}

impl SnifferMount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the watch, then scan existing entries.
    pub fn mount<S: KeyValueStore>(
        &mut self,
        sniffer: &CredentialSniffer,
        storage: &ObservedStorage<S>,
    ) -> usize {
        // Release first so the old handler never overlaps the new one.
        self.subscription = None;
        self.subscription = Some(sniffer.install(storage));
        sniffer.scan_now(storage)
    }

    pub fn unmount(&mut self) {
        self.subscription = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }
}

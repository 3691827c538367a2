// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Solthron account service: cross-context session relay and metered generation.
//!
//! A page opened by the browser extension signs the user in, turns that
//! sign-in into a session token, and relays the token to every window
//! context that might belong to the extension. Independently, a usage gate
//! decides whether each generation request may reach the backend.

pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod flows;
pub mod gate;
pub mod middleware;
pub mod models;
pub mod relay;
pub mod routes;
pub mod services;
pub mod sniffer;
pub mod storage;

use std::sync::Arc;

use clients::AnonymousClients;
use config::Config;
use db::AccountStore;
use services::{
    BackendClient, CredentialSource, FirebaseTokenVerifier, IdentitySessions, SessionExchanger,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub accounts: Arc<dyn AccountStore>,
    pub identity: Arc<dyn IdentitySessions>,
    pub backend: BackendClient,
    pub exchanger: SessionExchanger,
    pub token_verifier: Arc<FirebaseTokenVerifier>,
    /// Local storage of anonymous clients, keyed by their client cookie.
    pub anonymous: AnonymousClients,
}

impl AppState {
    pub fn new(
        config: Config,
        accounts: Arc<dyn AccountStore>,
        identity: Arc<dyn IdentitySessions>,
        backend: BackendClient,
        token_verifier: Arc<FirebaseTokenVerifier>,
    ) -> Self {
        Self {
            config,
            accounts,
            identity,
            exchanger: SessionExchanger::new(backend.clone()),
            backend,
            token_verifier,
            anonymous: AnonymousClients::new(),
        }
    }

    /// Credential source over a fresh provider session.
    pub fn credential_source(&self) -> CredentialSource {
        CredentialSource::new(
            self.identity.session(),
            self.accounts.clone(),
            self.backend.clone(),
        )
    }
}

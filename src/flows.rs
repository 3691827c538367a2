// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end flows composed from the credential source, exchanger, relay,
//! sniffer and gate.

use std::sync::Arc;

use crate::db::AccountStore;
use crate::error::AppError;
use crate::gate::UsageGate;
use crate::models::{Identity, Provenance, SessionToken};
use crate::relay::{PageContext, RelayBroadcaster, WindowHandles};
use crate::services::{AuthMethod, BackendClient, CredentialSource, GenerateRequest, SessionExchanger};
use crate::sniffer::{CredentialSniffer, SnifferMount};
use crate::storage::{KeyValueStore, ObservedStorage};

/// Credits charged per generation for signed-in users.
pub const GENERATION_COST: u32 = 1;

/// Which token is handed to the other window contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// The provider's ID token, for receivers that share the provider session.
    IdToken,
    /// An exchanged application token, for a detached extension process.
    Exchanged,
}

/// Result of a sign-in that was relayed.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: Identity,
    pub token: SessionToken,
    pub delivered: usize,
}

/// Sign-in, token handoff and relay.
pub struct AuthFlow<'a> {
    source: &'a CredentialSource,
    exchanger: &'a SessionExchanger,
    relay: &'a RelayBroadcaster,
}

impl<'a> AuthFlow<'a> {
    pub fn new(
        source: &'a CredentialSource,
        exchanger: &'a SessionExchanger,
        relay: &'a RelayBroadcaster,
    ) -> Self {
        Self {
            source,
            exchanger,
            relay,
        }
    }

    /// Authenticate, obtain the handoff token, and broadcast it.
    ///
    /// When `gate` is given it is moved to the authenticated state, clearing
    /// the anonymous counter.
    pub async fn sign_in<S: KeyValueStore>(
        &self,
        method: AuthMethod<'_>,
        handoff: Handoff,
        gate: Option<&mut UsageGate<S>>,
    ) -> Result<SignedIn, AppError> {
        let identity = self.source.authenticate(method).await?;

        if let Some(gate) = gate {
            gate.on_authenticated(&identity.uid);
        }

        let id_token = self.source.id_token().await?;
        let token = match handoff {
            Handoff::IdToken => SessionToken::new(id_token, Provenance::IdToken),
            Handoff::Exchanged => self.exchanger.exchange(&id_token).await?,
        };

        let delivered = self.relay.broadcast(&token, Some(&identity));

        Ok(SignedIn {
            identity,
            token,
            delivered,
        })
    }
}

/// Result of an allowed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub prompt: String,
    pub remaining_credits: Option<u32>,
}

/// Run the metered generation if the gate allows it.
pub async fn metered_generate<S: KeyValueStore>(
    gate: &mut UsageGate<S>,
    accounts: &dyn AccountStore,
    backend: &BackendClient,
    request: &GenerateRequest,
) -> Result<Generated, AppError> {
    let remaining_credits = gate.request(accounts, GENERATION_COST).await?.into_result()?;
    let prompt = backend.generate(request).await?;

    Ok(Generated {
        prompt,
        remaining_credits,
    })
}

/// A page opened by (or possibly for) the extension.
///
/// Owns the page's relay context and its storage watch. Dropping the page
/// releases the watch.
pub struct ExtensionPage {
    relay: RelayBroadcaster,
    sniffer: CredentialSniffer,
    mount: SnifferMount,
}

impl ExtensionPage {
    pub fn new(targets: WindowHandles, query: &str) -> Self {
        let relay = RelayBroadcaster::new(targets, Arc::new(PageContext::from_query(query)));
        Self {
            sniffer: CredentialSniffer::new(relay.clone()),
            relay,
            mount: SnifferMount::new(),
        }
    }

    /// Page became visible: watch storage, then scan what is already there.
    pub fn mount<S: KeyValueStore>(&mut self, storage: &ObservedStorage<S>) -> usize {
        self.mount.mount(&self.sniffer, storage)
    }

    pub fn unmount(&mut self) {
        self.mount.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    pub fn relay(&self) -> &RelayBroadcaster {
        &self.relay
    }

    pub fn context(&self) -> &Arc<PageContext> {
        self.relay.page()
    }
}

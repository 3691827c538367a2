// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Usage gate for the metered generation operation.
//!
//! Anonymous clients get one free operation, tracked by a counter in their
//! local storage. Signed-in clients pay with credits from their account
//! record instead, and the counter is never consulted for them.
//!
//! The credit debit is a plain read-modify-write against the account store.
//! Two debits racing on the same account can both read the same balance and
//! both succeed. Callers that need strict accounting must serialize debits
//! per account.
//!
//! The anonymous step from Fresh to OnceUsed is a separate `get` and `set` on
//! the client's storage, so two concurrent requests from one client can both
//! be allowed. That over-grant is tolerated.

use crate::db::AccountStore;
use crate::error::{AppError, GateError};
use crate::models::{now_rfc3339, AccountUpdate};
use crate::storage::KeyValueStore;

/// Storage key for the anonymous attempt counter.
pub const ATTEMPTS_KEY: &str = "generationAttempts";

/// Anonymous operations allowed before sign-up is required.
pub const FREE_ATTEMPTS: u32 = 1;

/// Where a client stands with respect to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Anonymous, free operation still available.
    Fresh,
    /// Anonymous, free operation used up.
    OnceUsed { attempts: u32 },
    /// Signed in; requests are paid from `uid`'s credits.
    Authenticated { uid: String },
}

/// Outcome of a metered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Go ahead. `remaining_credits` is set for paid requests.
    Allowed { remaining_credits: Option<u32> },
    /// Anonymous allowance used; prompt the user to create an account.
    SignupRequired,
    /// Paid request refused; send the user to the upgrade flow.
    UpgradeRequired(GateError),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed { .. })
    }

    /// Convert a refusal into the matching application error.
    pub fn into_result(self) -> Result<Option<u32>, AppError> {
        match self {
            GateDecision::Allowed { remaining_credits } => Ok(remaining_credits),
            GateDecision::SignupRequired => Err(AppError::SignupRequired),
            GateDecision::UpgradeRequired(err) => Err(err.into()),
        }
    }
}

/// Debits credits from account records.
pub struct CreditLedger<'a> {
    accounts: &'a dyn AccountStore,
}

impl<'a> CreditLedger<'a> {
    pub fn new(accounts: &'a dyn AccountStore) -> Self {
        Self { accounts }
    }

    /// Take `amount` credits from `uid`. Returns the remaining balance.
    ///
    /// The outer error is an infrastructure failure; the inner one a refusal
    /// that left the balance untouched.
    pub async fn debit(&self, uid: &str, amount: u32) -> Result<Result<u32, GateError>, AppError> {
        let Some(record) = self.accounts.get(uid).await? else {
            tracing::warn!(uid, "Debit for missing account record");
            return Ok(Err(GateError::AccountNotFound {
                uid: uid.to_string(),
            }));
        };

        if record.credits < amount {
            tracing::info!(uid, balance = record.credits, amount, "Insufficient credits");
            return Ok(Err(GateError::InsufficientCredits {
                balance: record.credits,
                requested: amount,
            }));
        }

        let remaining = record.credits - amount;
        self.accounts
            .update(uid, &AccountUpdate::debit(remaining, &now_rfc3339()))
            .await?;

        tracing::debug!(uid, amount, remaining, "Debited credits");
        Ok(Ok(remaining))
    }
}

/// Per-client gate over that client's local storage.
pub struct UsageGate<S> {
    storage: S,
    session: Option<String>,
}

impl<S: KeyValueStore> UsageGate<S> {
    /// Restore the gate from storage and the current session, if any.
    ///
    /// An active session clears any leftover anonymous counter.
    pub fn restore(storage: S, session_uid: Option<&str>) -> Self {
        let mut gate = Self {
            storage,
            session: None,
        };
        if let Some(uid) = session_uid {
            gate.on_authenticated(uid);
        }
        gate
    }

    /// Persisted anonymous attempts. Unparseable values count as zero.
    pub fn attempts(&self) -> u32 {
        self.storage
            .get(ATTEMPTS_KEY)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn state(&self) -> GateState {
        if let Some(uid) = &self.session {
            return GateState::Authenticated { uid: uid.clone() };
        }
        match self.attempts() {
            n if n < FREE_ATTEMPTS => GateState::Fresh,
            attempts => GateState::OnceUsed { attempts },
        }
    }

    /// Decide one metered request costing `amount` credits when signed in.
    pub async fn request(
        &mut self,
        accounts: &dyn AccountStore,
        amount: u32,
    ) -> Result<GateDecision, AppError> {
        match self.state() {
            GateState::Authenticated { uid } => {
                let decision = match CreditLedger::new(accounts).debit(&uid, amount).await? {
                    Ok(remaining) => GateDecision::Allowed {
                        remaining_credits: Some(remaining),
                    },
                    Err(refusal) => GateDecision::UpgradeRequired(refusal),
                };
                Ok(decision)
            }
            GateState::Fresh => {
                let attempts = self.attempts() + 1;
                self.storage.set(ATTEMPTS_KEY, &attempts.to_string());
                tracing::debug!(attempts, "Anonymous attempt recorded");
                Ok(GateDecision::Allowed {
                    remaining_credits: None,
                })
            }
            GateState::OnceUsed { attempts } => {
                tracing::info!(attempts, "Sign-up required for further generations");
                Ok(GateDecision::SignupRequired)
            }
        }
    }

    /// Authentication succeeded: drop the anonymous counter.
    pub fn on_authenticated(&mut self, uid: &str) {
        self.storage.remove(ATTEMPTS_KEY);
        self.session = Some(uid.to_string());
    }

    /// Signed out: back to a fresh anonymous allowance.
    pub fn on_signed_out(&mut self) {
        self.session = None;
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

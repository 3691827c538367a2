// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential source: provider sign-in plus the account record that goes with it.
//!
//! Password sessions require a verified email; federated sessions do not.
//! Every successful sign-in makes sure an account record exists for the uid,
//! creating it at most once.

use std::sync::Arc;

use crate::db::AccountStore;
use crate::error::{AppError, AuthError};
use crate::models::{
    now_rfc3339, AccountRecord, AccountUpdate, Identity, Provider, SignupProfile,
};
use crate::services::backend::BackendClient;
use crate::services::identity::{AccountChooser, IdentityProvider};

/// How the user is signing in.
pub enum AuthMethod<'a> {
    Password { email: &'a str, password: &'a str },
    Federated(&'a dyn AccountChooser),
}

/// What `ensure_account` did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSync {
    Created,
    Refreshed,
    Unchanged,
}

#[derive(Clone)]
pub struct CredentialSource {
    provider: Arc<dyn IdentityProvider>,
    accounts: Arc<dyn AccountStore>,
    backend: BackendClient,
}

impl CredentialSource {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        accounts: Arc<dyn AccountStore>,
        backend: BackendClient,
    ) -> Self {
        Self {
            provider,
            accounts,
            backend,
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    /// Sign in and make sure the account record exists.
    pub async fn authenticate(&self, method: AuthMethod<'_>) -> Result<Identity, AppError> {
        match method {
            AuthMethod::Password { email, password } => {
                let identity = self.provider.sign_in(email, password).await?;

                if !identity.email_verified {
                    self.provider.sign_out().await;
                    tracing::info!(uid = %identity.uid, "Password sign-in blocked, email unverified");
                    return Err(AuthError::EmailNotVerified {
                        email: email.to_string(),
                    }
                    .into());
                }

                // The session is already valid; a record hiccup must not undo it.
                if let Err(e) = self.ensure_account(&identity, Provider::Password).await {
                    tracing::error!(uid = %identity.uid, error = %e, "Failed to sync account record");
                }

                tracing::info!(uid = %identity.uid, "Password sign-in");
                Ok(identity)
            }
            AuthMethod::Federated(chooser) => {
                let identity = self.provider.sign_in_federated(chooser).await?;
                self.ensure_account(&identity, Provider::Google).await?;

                tracing::info!(uid = %identity.uid, "Federated sign-in");
                Ok(identity)
            }
        }
    }

    /// Create the record for `identity` if absent, else refresh stale verification.
    pub async fn ensure_account(
        &self,
        identity: &Identity,
        provider: Provider,
    ) -> Result<AccountSync, AppError> {
        let now = now_rfc3339();

        let Some(record) = self.accounts.get(&identity.uid).await? else {
            let record = match provider {
                Provider::Google => AccountRecord::for_federated(identity, &now),
                Provider::Password => AccountRecord::for_password_identity(identity, &now),
            };
            self.accounts.create(&identity.uid, &record).await?;
            tracing::info!(uid = %identity.uid, provider = ?provider, "Created account record");
            return Ok(AccountSync::Created);
        };

        let verified_now = provider == Provider::Google || identity.email_verified;
        if record.email_verified || !verified_now {
            return Ok(AccountSync::Unchanged);
        }

        let photo_url = match provider {
            Provider::Google => identity.photo_url.clone(),
            Provider::Password => None,
        };
        self.accounts
            .update(&identity.uid, &AccountUpdate::verified(&now, photo_url))
            .await?;

        tracing::info!(uid = %identity.uid, "Refreshed account verification");
        Ok(AccountSync::Refreshed)
    }

    /// Password sign-up.
    ///
    /// The verification email and the account record are best effort: the
    /// provider account already exists, so their failures are only logged.
    /// The new session is signed out; the user logs in after verifying.
    pub async fn register(
        &self,
        profile: &SignupProfile,
        password: &str,
    ) -> Result<Identity, AppError> {
        let identity = self.provider.create_account(&profile.email, password).await?;

        if let Err(e) = self
            .backend
            .send_verification_email(&profile.email, &profile.first_name)
            .await
        {
            tracing::warn!(uid = %identity.uid, error = %e, "Verification email not sent");
        }

        let record = AccountRecord::for_password_signup(&identity.uid, profile, &now_rfc3339());
        if let Err(e) = self.accounts.create(&identity.uid, &record).await {
            tracing::error!(uid = %identity.uid, error = %e, "Failed to create account record");
        }

        self.provider.sign_out().await;

        tracing::info!(uid = %identity.uid, "Registered password account");
        Ok(identity)
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.provider.send_password_reset(email).await?;
        tracing::info!("Password reset email requested");
        Ok(())
    }

    /// Resend the verification link. The sender does not know the user's name.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        self.backend.send_verification_email(email, "").await
    }

    /// ID token of the signed-in user.
    pub async fn id_token(&self) -> Result<String, AuthError> {
        self.provider.get_id_token().await
    }

    pub async fn sign_out(&self) {
        self.provider.sign_out().await
    }
}

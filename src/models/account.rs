// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account record model stored in Firestore.

use serde::{Deserialize, Serialize};

use crate::models::identity::Identity;

/// Credits granted to every account on creation.
pub const SIGNUP_CREDITS: u32 = 250;

/// How the account was first authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Password,
    Google,
}

/// Account document in the `users` collection, keyed by uid.
///
/// Field names are camelCase to match documents written by the web client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub user_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// Absent on records written by older password sign-ups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(
        rename = "photoURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<String>,
    /// When the account was created (RFC3339)
    pub created_at: String,
    #[serde(default = "default_subscription_status")]
    pub subscription_status: String,
    #[serde(default)]
    pub credits: u32,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_credit_use: Option<String>,
}

fn default_subscription_status() -> String {
    "free".to_string()
}

impl AccountRecord {
    /// Record for a federated (Google) sign-in. Federated email is trusted as verified.
    pub fn for_federated(identity: &Identity, now: &str) -> Self {
        let display_name = identity.display_name.clone().unwrap_or_default();
        let (first_name, last_name) = split_display_name(&display_name);
        let username = if display_name.is_empty() {
            email_local_part(&identity.email)
        } else {
            display_name
        };

        Self {
            user_id: identity.uid.clone(),
            first_name,
            last_name,
            username,
            email: identity.email.clone(),
            provider: Some(Provider::Google),
            photo_url: identity.photo_url.clone(),
            created_at: now.to_string(),
            subscription_status: default_subscription_status(),
            credits: SIGNUP_CREDITS,
            email_verified: true,
            email_verified_at: Some(now.to_string()),
            last_credit_use: None,
        }
    }

    /// Record for a password sign-up. Unverified until the user follows the email link.
    pub fn for_password_signup(uid: &str, profile: &SignupProfile, now: &str) -> Self {
        Self {
            user_id: uid.to_string(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            username: profile.username.clone(),
            email: profile.email.clone(),
            provider: Some(Provider::Password),
            photo_url: None,
            created_at: now.to_string(),
            subscription_status: default_subscription_status(),
            credits: SIGNUP_CREDITS,
            email_verified: false,
            email_verified_at: None,
            last_credit_use: None,
        }
    }

    /// Record for a password identity that signed in without a record on file.
    pub fn for_password_identity(identity: &Identity, now: &str) -> Self {
        let display_name = identity.display_name.clone().unwrap_or_default();
        let (first_name, last_name) = split_display_name(&display_name);

        Self {
            user_id: identity.uid.clone(),
            first_name,
            last_name,
            username: email_local_part(&identity.email),
            email: identity.email.clone(),
            provider: Some(Provider::Password),
            photo_url: identity.photo_url.clone(),
            created_at: now.to_string(),
            subscription_status: default_subscription_status(),
            credits: SIGNUP_CREDITS,
            email_verified: identity.email_verified,
            email_verified_at: identity.email_verified.then(|| now.to_string()),
            last_credit_use: None,
        }
    }
}

/// Profile fields collected by the sign-up form.
#[derive(Debug, Clone, Default)]
pub struct SignupProfile {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

/// Partial update of an account record.
///
/// Only `Some` fields are written; everything else on the document is left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_credit_use: Option<String>,
}

impl AccountUpdate {
    /// Mark the email verified now, optionally refreshing the photo.
    pub fn verified(now: &str, photo_url: Option<String>) -> Self {
        Self {
            email_verified: Some(true),
            email_verified_at: Some(now.to_string()),
            photo_url,
            ..Default::default()
        }
    }

    /// Set the credit balance after a debit.
    pub fn debit(remaining: u32, now: &str) -> Self {
        Self {
            credits: Some(remaining),
            last_credit_use: Some(now.to_string()),
            ..Default::default()
        }
    }

    /// Firestore field paths touched by this update (the update mask).
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.email_verified.is_some() {
            paths.push("emailVerified");
        }
        if self.email_verified_at.is_some() {
            paths.push("emailVerifiedAt");
        }
        if self.photo_url.is_some() {
            paths.push("photoURL");
        }
        if self.credits.is_some() {
            paths.push("credits");
        }
        if self.last_credit_use.is_some() {
            paths.push("lastCreditUse");
        }
        paths
    }

    /// Apply this update to an in-memory record.
    pub fn apply_to(&self, record: &mut AccountRecord) {
        if let Some(verified) = self.email_verified {
            record.email_verified = verified;
        }
        if let Some(at) = &self.email_verified_at {
            record.email_verified_at = Some(at.clone());
        }
        if let Some(photo) = &self.photo_url {
            record.photo_url = Some(photo.clone());
        }
        if let Some(credits) = self.credits {
            record.credits = credits;
        }
        if let Some(at) = &self.last_credit_use {
            record.last_credit_use = Some(at.clone());
        }
    }
}

fn split_display_name(display_name: &str) -> (String, String) {
    let mut words = display_name.split(' ');
    let first = words.next().unwrap_or_default().to_string();
    let rest = words.collect::<Vec<_>>().join(" ");
    (first, rest)
}

fn email_local_part(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod account;
pub mod identity;
pub mod session;

pub use account::{AccountRecord, AccountUpdate, Provider, SignupProfile, SIGNUP_CREDITS};
pub use identity::{Identity, RelayUser};
pub use session::{AuthType, Provenance, SessionToken};

/// Current time as RFC3339 with a `Z` suffix.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

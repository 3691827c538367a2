// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session tokens handed to other execution contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a session token was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Short-lived ID token issued directly by the identity provider.
    IdToken,
    /// Long-lived application token from the session exchange endpoint.
    Exchanged,
    /// Token recovered from local storage written by the provider library.
    Sniffed,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::IdToken => "id_token",
            Provenance::Exchanged => "exchanged",
            Provenance::Sniffed => "sniffed",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which flow the page was opened for (`?type=login|signup`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Login,
    Signup,
}

impl AuthType {
    /// Parse the `type` query value; anything unrecognised means login.
    pub fn from_query_value(value: Option<&str>) -> Self {
        match value {
            Some("signup") => AuthType::Signup,
            _ => AuthType::Login,
        }
    }
}

/// Opaque bearer credential with its provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    provenance: Provenance,
    /// Unix milliseconds
    issued_at: i64,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            value: value.into(),
            provenance,
            issued_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }
}

// Keep bearer material out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &format_args!("<{} chars>", self.value.len()))
            .field("provenance", &self.provenance)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session relay to the extension's window contexts.
//!
//! A page opened by the extension (popup, iframe or tab) does not know in
//! advance which of its window relationships leads back to the extension, so
//! every successful sign-in is posted to the parent, the top frame and the
//! opener. Delivery is fire-and-forget: a missing or failing target is logged
//! and skipped, and nothing here ever returns an error to the caller.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::models::{AuthType, Identity, Provenance, RelayUser, SessionToken};

/// Marker the extension checks before trusting a message.
pub const RELAY_MESSAGE_TYPE: &str = "SOLTHRON_AUTH_SUCCESS";

/// Target origin for every post; receivers do their own trust check.
pub const ANY_ORIGIN: &str = "*";

/// Shorter values are never plausible bearer tokens.
pub const MIN_TOKEN_LEN: usize = 20;

/// How long a success banner stays on the page.
pub const BANNER_TTL: Duration = Duration::from_secs(8);

/// Relay payload as posted across window contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
    pub source: MessageSource,
    /// Unix milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<RelayUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
}

/// Label of where a relayed token came from.
///
/// Senders other than this crate use their own labels (`google_auth`, raw
/// storage keys, ...); receivers keep them as-is instead of rejecting the
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(untagged)]
pub enum MessageSource {
    Known(Provenance),
    Other(String),
}

impl MessageSource {
    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            MessageSource::Known(p) => Some(*p),
            MessageSource::Other(_) => None,
        }
    }
}

impl From<Provenance> for MessageSource {
    fn from(provenance: Provenance) -> Self {
        MessageSource::Known(provenance)
    }
}

impl PartialEq<Provenance> for MessageSource {
    fn eq(&self, other: &Provenance) -> bool {
        self.provenance() == Some(*other)
    }
}

impl RelayMessage {
    pub fn new(token: &SessionToken, identity: Option<&Identity>, auth_type: Option<AuthType>) -> Self {
        Self {
            kind: RELAY_MESSAGE_TYPE.to_string(),
            token: token.value().to_string(),
            source: MessageSource::Known(token.provenance()),
            timestamp: chrono::Utc::now().timestamp_millis(),
            user: identity.map(RelayUser::from),
            auth_type,
        }
    }

    /// Receiver-side check: accept only payloads carrying our marker and a token.
    ///
    /// The `source` label is informational and never a reason to reject.
    pub fn accept(payload: &serde_json::Value) -> Option<Self> {
        if payload.get("type").and_then(|t| t.as_str()) != Some(RELAY_MESSAGE_TYPE) {
            return None;
        }

        let message: RelayMessage = serde_json::from_value(payload.clone()).ok()?;
        if message.token.is_empty() {
            return None;
        }
        Some(message)
    }
}

/// True if `token` is worth relaying at all.
pub fn is_plausible_token(token: &str) -> bool {
    token != "undefined" && token.len() >= MIN_TOKEN_LEN
}

/// A window context that accepts posted messages.
pub trait WindowTarget: Send + Sync {
    fn post_message(&self, message: &serde_json::Value, target_origin: &str) -> anyhow::Result<()>;
}

/// Which window relationship a target represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Parent,
    Top,
    Opener,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Parent => "parent",
            TargetKind::Top => "top",
            TargetKind::Opener => "opener",
        }
    }
}

/// Candidate receivers of a relay. Absent handles are skipped.
#[derive(Clone, Default)]
pub struct WindowHandles {
    pub parent: Option<Arc<dyn WindowTarget>>,
    pub top: Option<Arc<dyn WindowTarget>>,
    pub opener: Option<Arc<dyn WindowTarget>>,
}

impl WindowHandles {
    /// Targets in delivery order: parent, top, opener.
    pub fn candidates(&self) -> impl Iterator<Item = (TargetKind, &Arc<dyn WindowTarget>)> {
        [
            (TargetKind::Parent, self.parent.as_ref()),
            (TargetKind::Top, self.top.as_ref()),
            (TargetKind::Opener, self.opener.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, target)| target.map(|t| (kind, t)))
    }
}

/// Transient on-page notice after a relay.
#[derive(Debug, Clone)]
pub struct Banner {
    pub text: String,
    pub source: Provenance,
    pub shown_at: Instant,
}

impl Banner {
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < BANNER_TTL
    }
}

/// Per-page state, created on mount and dropped on unmount.
#[derive(Debug, Default)]
pub struct PageContext {
    extension_login: bool,
    auth_type: AuthType,
    banners: Mutex<Vec<Banner>>,
}

impl PageContext {
    pub fn new(extension_login: bool, auth_type: AuthType) -> Self {
        Self {
            extension_login,
            auth_type,
            banners: Mutex::new(Vec::new()),
        }
    }

    /// Build from the page's query string (`ext`/`extension` and `type`).
    pub fn from_query(query: &str) -> Self {
        let mut extension_login = false;
        let mut auth_type = None;

        for pair in query.trim_start_matches('?').split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_default();

            match key {
                "ext" | "extension" if !value.is_empty() => extension_login = true,
                "type" if auth_type.is_none() => {
                    auth_type = Some(AuthType::from_query_value(Some(&value)))
                }
                _ => {}
            }
        }

        Self::new(extension_login, auth_type.unwrap_or_default())
    }

    /// Whether the page was opened for extension authentication.
    pub fn is_extension_login(&self) -> bool {
        self.extension_login
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    fn show_banner(&self, source: Provenance) {
        let banner = Banner {
            text: format!("Extension Login Successful! Source: {}", source),
            source,
            shown_at: Instant::now(),
        };
        self.banners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(banner);
    }

    /// Banners still visible at `now`; expired ones are dropped.
    pub fn visible_banners(&self, now: Instant) -> Vec<Banner> {
        let mut banners = self.banners.lock().unwrap_or_else(|e| e.into_inner());
        banners.retain(|b| b.is_visible(now));
        banners.clone()
    }
}

/// Posts session tokens to every candidate window.
#[derive(Clone)]
pub struct RelayBroadcaster {
    targets: WindowHandles,
    page: Arc<PageContext>,
}

impl RelayBroadcaster {
    pub fn new(targets: WindowHandles, page: Arc<PageContext>) -> Self {
        Self { targets, page }
    }

    pub fn page(&self) -> &Arc<PageContext> {
        &self.page
    }

    /// Relay `token` to all targets. Returns how many accepted the post.
    pub fn broadcast(&self, token: &SessionToken, identity: Option<&Identity>) -> usize {
        if !is_plausible_token(token.value()) {
            tracing::debug!(source = %token.provenance(), "Implausible token, not relaying");
            return 0;
        }

        let auth_type = identity.map(|_| self.page.auth_type());
        let message = RelayMessage::new(token, identity, auth_type);
        let payload = match serde_json::to_value(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode relay message");
                return 0;
            }
        };

        let mut delivered = 0;
        for (kind, target) in self.targets.candidates() {
            match target.post_message(&payload, ANY_ORIGIN) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(target = kind.as_str(), error = %e, "Relay post failed");
                }
            }
        }

        tracing::info!(
            source = %token.provenance(),
            delivered,
            "Relayed session token"
        );

        if self.page.is_extension_login() {
            self.page.show_banner(token.provenance());
        }

        delivered
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account and sign-in routes.
//!
//! Sign-in handlers run the same flows the page would run in-process. The
//! relay message that would have been posted to the extension's windows is
//! captured and returned, and the page script forwards it.

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::flows::{AuthFlow, Handoff, SignedIn};
use crate::gate::UsageGate;
use crate::models::{Provenance, SignupProfile};
use crate::relay::{PageContext, RelayBroadcaster, RelayMessage, WindowHandles, WindowTarget};
use crate::routes::ANON_COOKIE;
use crate::services::{AuthMethod, FederatedCredential, PresentedCredential};
use crate::storage::{KeyValueStore, MemoryStorage};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google))
        .route("/auth/password-reset", post(password_reset))
        .route("/auth/resend-verification", post(resend_verification))
}

fn validate<T: Validate>(body: &T) -> Result<()> {
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Validation error: {}", e)))
}

// ─── Relay capture ───────────────────────────────────────────

/// Window target that keeps the last message posted to it.
#[derive(Default)]
struct CapturedRelay(Mutex<Option<serde_json::Value>>);

impl WindowTarget for CapturedRelay {
    fn post_message(&self, message: &serde_json::Value, _target_origin: &str) -> anyhow::Result<()> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.clone());
        Ok(())
    }
}

impl CapturedRelay {
    fn take(&self) -> Option<RelayMessage> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .and_then(|v| RelayMessage::accept(&v))
    }
}

/// Relay whose only window is the capture, with the page context from `query`.
fn capturing_relay(query: Option<&str>) -> (RelayBroadcaster, Arc<CapturedRelay>) {
    let capture = Arc::new(CapturedRelay::default());
    let targets = WindowHandles {
        opener: Some(capture.clone()),
        ..Default::default()
    };
    let page = Arc::new(PageContext::from_query(query.unwrap_or("")));
    (RelayBroadcaster::new(targets, page), capture)
}

/// Gate over the caller's anonymous storage, so signing in clears its counter.
fn caller_gate(state: &AppState, jar: &CookieJar) -> UsageGate<Arc<dyn KeyValueStore>> {
    let storage: Arc<dyn KeyValueStore> = match jar
        .get(ANON_COOKIE)
        .and_then(|cookie| state.anonymous.lookup(cookie.value()))
    {
        Some(storage) => storage,
        None => Arc::new(MemoryStorage::new()),
    };
    UsageGate::restore(storage, None)
}

/// Drop the caller's anonymous entry once sign-in has cleared its counter.
fn release_anonymous(state: &AppState, jar: &CookieJar) {
    if let Some(cookie) = jar.get(ANON_COOKIE) {
        state.anonymous.release_if_empty(cookie.value());
    }
}

/// Sign-in response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SignInResponse {
    pub uid: String,
    pub email: String,
    pub source: Provenance,
    /// Message for the page to post to the extension's windows.
    pub relay: Option<RelayMessage>,
    /// Success banner text when the page was opened for the extension.
    pub banner: Option<String>,
}

fn sign_in_response(
    signed_in: SignedIn,
    relay: &RelayBroadcaster,
    capture: &CapturedRelay,
) -> SignInResponse {
    let banner = relay
        .page()
        .visible_banners(std::time::Instant::now())
        .pop()
        .map(|b| b.text);

    SignInResponse {
        uid: signed_in.identity.uid,
        email: signed_in.identity.email,
        source: signed_in.token.provenance(),
        relay: capture.take(),
        banner,
    }
}

// ─── Sign-up ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub uid: String,
    pub message: String,
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    validate(&body)?;

    let profile = SignupProfile {
        first_name: body.first_name,
        last_name: body.last_name,
        username: body.username,
        email: body.email,
    };

    let identity = state
        .credential_source()
        .register(&profile, &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            uid: identity.uid,
            message: "Account created. Please verify your email before logging in.".to_string(),
        }),
    ))
}

// ─── Password login ──────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    RawQuery(query): RawQuery,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SignInResponse>> {
    validate(&body)?;

    let source = state.credential_source();
    let (relay, capture) = capturing_relay(query.as_deref());

    let mut gate = caller_gate(&state, &jar);

    let signed_in = AuthFlow::new(&source, &state.exchanger, &relay)
        .sign_in(
            AuthMethod::Password {
                email: &body.email,
                password: &body.password,
            },
            Handoff::IdToken,
            Some(&mut gate),
        )
        .await?;
    release_anonymous(&state, &jar);

    Ok(Json(sign_in_response(signed_in, &relay, &capture)))
}

// ─── Federated sign-in ───────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInRequest {
    /// Google ID token from the account chooser.
    pub credential: Option<String>,
    /// Provider error code when the chooser failed (`auth/popup-blocked`, ...).
    pub error_code: Option<String>,
    /// Exchange for an application token (default) or hand off the ID token.
    #[serde(default = "default_exchange")]
    pub exchange: bool,
}

fn default_exchange() -> bool {
    true
}

async fn google(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    RawQuery(query): RawQuery,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<Json<SignInResponse>> {
    let chooser = match (body.credential, body.error_code) {
        (_, Some(code)) => PresentedCredential::failed(&code),
        (Some(credential), None) if !credential.is_empty() => {
            PresentedCredential(Ok(FederatedCredential::google_id_token(credential)))
        }
        _ => {
            return Err(AppError::BadRequest(
                "credential or errorCode is required".to_string(),
            ))
        }
    };

    let source = state.credential_source();
    let (relay, capture) = capturing_relay(query.as_deref());

    let mut gate = caller_gate(&state, &jar);

    let handoff = if body.exchange {
        Handoff::Exchanged
    } else {
        Handoff::IdToken
    };

    let signed_in = AuthFlow::new(&source, &state.exchanger, &relay)
        .sign_in(AuthMethod::Federated(&chooser), handoff, Some(&mut gate))
        .await?;
    release_anonymous(&state, &jar);

    Ok(Json(sign_in_response(signed_in, &relay, &capture)))
}

// ─── Email actions ───────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn password_reset(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>> {
    validate(&body)?;

    state
        .credential_source()
        .send_password_reset(&body.email)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password reset email sent! Check your inbox.".to_string(),
    }))
}

async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>> {
    validate(&body)?;

    state
        .credential_source()
        .resend_verification(&body.email)
        .await?;

    Ok(Json(MessageResponse {
        message: "Verification email sent! Check your inbox and spam folder.".to_string(),
    }))
}

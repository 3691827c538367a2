// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Metered generation route.

use axum::{extract::State, routing::post, Extension, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::flows::metered_generate;
use crate::gate::UsageGate;
use crate::middleware::AuthUser;
use crate::routes::ANON_COOKIE;
use crate::services::GenerateRequest;
use crate::storage::{KeyValueStore, MemoryStorage};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/generate", post(generate))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateBody {
    #[validate(length(min = 1, message = "Topic is required"))]
    pub topic: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_length")]
    pub length: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub additional_context: String,
}

fn default_tone() -> String {
    "professional".to_string()
}

fn default_length() -> String {
    "medium".to_string()
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GenerateResponse {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_credits: Option<u32>,
}

/// Run one generation through the usage gate.
///
/// Signed-in callers pay one credit and keep no anonymous state; a client
/// cookie they still carry is forgotten. Anonymous callers are tracked by a
/// client cookie issued on their first request. The cookie is set even when
/// the request fails so the attempt stays attributed.
async fn generate(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
    jar: CookieJar,
    Json(body): Json<GenerateBody>,
) -> (CookieJar, Result<Json<GenerateResponse>>) {
    let client_id = jar.get(ANON_COOKIE).map(|c| c.value().to_string());

    if let Some(Extension(user)) = user {
        if let Some(id) = &client_id {
            state.anonymous.forget(id);
        }
        let mut gate = UsageGate::restore(MemoryStorage::new(), Some(&user.uid));
        let result = run_generation(&state, &mut gate, Some(&user.uid), body).await;
        return (jar, result);
    }

    let (jar, client_id) = match client_id {
        Some(id) => (jar, id),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let cookie = Cookie::build((ANON_COOKIE, id.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .permanent()
                .build();
            (jar.add(cookie), id)
        }
    };

    let mut gate = UsageGate::restore(state.anonymous.storage_for(&client_id), None);
    let result = run_generation(&state, &mut gate, None, body).await;
    (jar, result)
}

async fn run_generation<S: KeyValueStore>(
    state: &AppState,
    gate: &mut UsageGate<S>,
    session_uid: Option<&str>,
    body: GenerateBody,
) -> Result<Json<GenerateResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Validation error: {}", e)))?;

    let request = GenerateRequest {
        topic: body.topic,
        tone: body.tone,
        length: body.length,
        mode: body.mode,
        additional_context: body.additional_context,
    };

    let generated =
        metered_generate(gate, state.accounts.as_ref(), &state.backend, &request).await?;

    tracing::info!(
        uid = session_uid.unwrap_or("anonymous"),
        output_length = generated.prompt.len(),
        "Generated prompt"
    );

    Ok(Json(GenerateResponse {
        prompt: generated.prompt,
        remaining_credits: generated.remaining_credits,
    }))
}

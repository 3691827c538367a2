// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token authentication middleware.

use crate::error::AppError;
use crate::services::IdTokenError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Authenticated user extracted from a verified ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Middleware that authenticates a Bearer ID token when one is presented.
///
/// Requests without an Authorization header pass through anonymously. A
/// header carrying a bad token is rejected rather than downgraded to
/// anonymous.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION).cloned() else {
        return next.run(request).await;
    };

    match state.token_verifier.verify_header(Some(&auth_header)).await {
        Ok(user) => {
            request.extensions_mut().insert(AuthUser {
                uid: user.uid,
                email: user.email,
            });
            next.run(request).await
        }
        Err(IdTokenError::Rejected(reason)) => {
            tracing::info!(reason = %reason, "Rejected ID token");
            AppError::InvalidToken.into_response()
        }
        Err(IdTokenError::Transient(reason)) => {
            AppError::Internal(anyhow::anyhow!("ID token verification unavailable: {}", reason))
                .into_response()
        }
    }
}

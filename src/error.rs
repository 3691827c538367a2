// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error taxonomy and consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Path the client is sent to when credits run out.
pub const UPGRADE_PATH: &str = "/subscription";

/// Identity provider failures, mapped from the provider's error codes.
///
/// `Display` is the human-readable message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredential,

    /// Password sign-in for an unverified email. Carries the email for a resend action.
    #[error("Please verify your email before logging in. Check your inbox for the verification link.")]
    EmailNotVerified { email: String },

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("This email is already registered")]
    EmailInUse,

    #[error("Popup was blocked. Please allow popups and try again.")]
    PopupBlocked,

    #[error("Sign-in was cancelled.")]
    PopupClosedByUser,

    #[error("Network error. Please check your connection.")]
    NetworkError,

    #[error("Too many attempts. Please try again later.")]
    TooManyRequests,

    /// A provider code with no dedicated variant; shown with the provider's message.
    #[error("{message}")]
    Provider { code: String, message: String },
}

impl AuthError {
    /// Map a provider error code onto the taxonomy.
    ///
    /// Accepts both Identity Toolkit REST codes (`EMAIL_EXISTS`,
    /// `WEAK_PASSWORD : ...`) and web SDK codes (`auth/email-already-in-use`).
    pub fn from_provider_code(code: &str, message: &str) -> Self {
        let code = code.split(" : ").next().unwrap_or(code).trim();

        match code {
            "EMAIL_EXISTS" | "auth/email-already-in-use" => AuthError::EmailInUse,
            "WEAK_PASSWORD" | "auth/weak-password" => AuthError::WeakPassword,
            "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_PASSWORD"
            | "EMAIL_NOT_FOUND"
            | "auth/invalid-credential"
            | "auth/wrong-password"
            | "auth/user-not-found" => AuthError::InvalidCredential,
            "auth/popup-blocked" => AuthError::PopupBlocked,
            "auth/popup-closed-by-user" | "auth/cancelled-popup-request" => {
                AuthError::PopupClosedByUser
            }
            "auth/network-request-failed" => AuthError::NetworkError,
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => {
                AuthError::TooManyRequests
            }
            other => AuthError::Provider {
                code: other.to_string(),
                message: if message.is_empty() {
                    "Authentication failed".to_string()
                } else {
                    message.to_string()
                },
            },
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::EmailNotVerified { .. } => "email_not_verified",
            AuthError::WeakPassword => "weak_password",
            AuthError::EmailInUse => "email_in_use",
            AuthError::PopupBlocked => "popup_blocked",
            AuthError::PopupClosedByUser => "popup_closed_by_user",
            AuthError::NetworkError => "network_error",
            AuthError::TooManyRequests => "too_many_requests",
            AuthError::Provider { .. } => "auth_failed",
        }
    }
}

/// Session exchange failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("Failed to create session: {0}")]
    BackendUnavailable(String),

    #[error("Session creation failed: {0}")]
    ExchangeRejected(String),
}

/// Credit gate failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: u32, requested: u32 },

    #[error("Account record not found: {uid}")]
    AccountNotFound { uid: String },
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Create an account to continue")]
    SignupRequired,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resend_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upgrade_path: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut resend_email = None;
        let mut upgrade_path = None;

        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Auth(err) => {
                let status = match err {
                    AuthError::EmailNotVerified { email } => {
                        resend_email = Some(email.clone());
                        StatusCode::FORBIDDEN
                    }
                    AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
                    AuthError::EmailInUse => StatusCode::CONFLICT,
                    AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
                    AuthError::NetworkError => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.code(), Some(err.to_string()))
            }
            AppError::Exchange(err) => {
                tracing::warn!(error = %err, "Session exchange failed");
                (StatusCode::BAD_GATEWAY, "exchange_failed", Some(err.to_string()))
            }
            AppError::Gate(_) => {
                upgrade_path = Some(UPGRADE_PATH);
                (StatusCode::PAYMENT_REQUIRED, "insufficient_credits", None)
            }
            AppError::SignupRequired => (
                StatusCode::FORBIDDEN,
                "signup_required",
                Some(self.to_string()),
            ),
            AppError::Backend(msg) => {
                tracing::warn!(error = %msg, "Backend error");
                (StatusCode::BAD_GATEWAY, "backend_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            resend_email,
            upgrade_path,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_codes_map_with_suffix() {
        assert_eq!(
            AuthError::from_provider_code("WEAK_PASSWORD : Password should be at least 6 characters", ""),
            AuthError::WeakPassword
        );
        assert_eq!(
            AuthError::from_provider_code("TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled", ""),
            AuthError::TooManyRequests
        );
        assert_eq!(
            AuthError::from_provider_code("EMAIL_EXISTS", ""),
            AuthError::EmailInUse
        );
    }

    #[test]
    fn test_sdk_codes_map() {
        assert_eq!(
            AuthError::from_provider_code("auth/popup-blocked", ""),
            AuthError::PopupBlocked
        );
        assert_eq!(
            AuthError::from_provider_code("auth/popup-closed-by-user", ""),
            AuthError::PopupClosedByUser
        );
        assert_eq!(
            AuthError::from_provider_code("auth/network-request-failed", ""),
            AuthError::NetworkError
        );
    }

    #[test]
    fn test_unknown_code_keeps_message() {
        let err = AuthError::from_provider_code("USER_DISABLED", "The account is disabled");
        assert_eq!(err.code(), "auth_failed");
        assert_eq!(err.to_string(), "The account is disabled");

        let err = AuthError::from_provider_code("SOMETHING", "");
        assert_eq!(err.to_string(), "Authentication failed");
    }

    #[test]
    fn test_email_not_verified_response() {
        let response = AppError::from(AuthError::EmailNotVerified {
            email: "a@example.com".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_insufficient_credits_response() {
        let response = AppError::from(GateError::InsufficientCredits {
            balance: 0,
            requested: 1,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}

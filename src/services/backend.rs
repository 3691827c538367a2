// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the generation and email backend.
//!
//! The backend is an opaque JSON service. Only the request and response
//! shapes this crate relies on are modelled here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, ExchangeError};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
    pub tone: String,
    pub length: String,
    pub mode: String,
    #[serde(default)]
    pub additional_context: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    prompt: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationEmailResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

/// Response of `POST /auth/google-login`.
#[derive(Debug, Deserialize)]
pub struct GoogleLoginResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Backend HTTP client.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the backend to email a verification link.
    pub async fn send_verification_email(
        &self,
        email: &str,
        first_name: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.url("/send-verification-email"))
            .json(&serde_json::json!({
                "email": email,
                "firstName": first_name,
            }))
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Verification email request failed: {}", e)))?;

        let body: VerificationEmailResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Invalid verification email response: {}", e)))?;

        if !body.success {
            return Err(AppError::Backend(
                body.message
                    .unwrap_or_else(|| "Failed to send verification email".to_string()),
            ));
        }

        tracing::info!("Verification email sent");
        Ok(())
    }

    /// Trade a Firebase ID token for a long-lived application token.
    ///
    /// Transport failures and non-2xx statuses are `BackendUnavailable`. The
    /// caller interprets the body.
    pub async fn google_login(
        &self,
        firebase_token: &str,
    ) -> Result<GoogleLoginResponse, ExchangeError> {
        let response = self
            .http
            .post(self.url("/auth/google-login"))
            .json(&serde_json::json!({ "firebaseToken": firebase_token }))
            .send()
            .await
            .map_err(|e| ExchangeError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::BackendUnavailable(format!(
                "session endpoint returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeError::BackendUnavailable(format!("invalid response: {}", e)))
    }

    /// Run the metered generation. Returns the generated prompt.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String, AppError> {
        let response = self
            .http
            .post(self.url("/generate"))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Generate request failed: {}", e)))?;

        let status = response.status();
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Invalid generate response ({}): {}", status, e)))?;

        body.prompt.ok_or_else(|| {
            AppError::Backend(
                body.error
                    .unwrap_or_else(|| format!("No prompt in response ({})", status)),
            )
        })
    }
}

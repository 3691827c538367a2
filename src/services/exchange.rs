// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session exchange: short-lived ID token in, long-lived session token out.
//!
//! Only needed when the credential is handed to a context that cannot hold a
//! live provider session itself, such as the extension's background process.

use crate::error::ExchangeError;
use crate::models::{Provenance, SessionToken};
use crate::services::backend::BackendClient;

#[derive(Clone)]
pub struct SessionExchanger {
    backend: BackendClient,
}

impl SessionExchanger {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Exchange `id_token` for an application session token. Not retried.
    pub async fn exchange(&self, id_token: &str) -> Result<SessionToken, ExchangeError> {
        let response = self.backend.google_login(id_token).await?;

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "Session creation failed".to_string());
            tracing::info!(reason = %reason, "Session exchange rejected");
            return Err(ExchangeError::ExchangeRejected(reason));
        }

        match response.token.filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!("Session token issued");
                Ok(SessionToken::new(token, Provenance::Exchanged))
            }
            None => Err(ExchangeError::ExchangeRejected(
                "No token in session response".to_string(),
            )),
        }
    }
}

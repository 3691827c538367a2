// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider boundary and the Firebase Identity Toolkit adapter.
//!
//! The provider is stateful in the same way the web SDK is: a successful
//! sign-in makes that user current until `sign_out`, and `get_id_token`
//! returns the current user's token. The REST adapter keeps one such session
//! per [`FirebaseAuthSession`], created per request from a shared
//! [`FirebaseAuthClient`].

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AuthError;
use crate::models::Identity;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider id for Google federated sign-in.
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Credential returned by an interactive account chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl FederatedCredential {
    pub fn google_id_token(id_token: impl Into<String>) -> Self {
        Self {
            provider_id: GOOGLE_PROVIDER_ID.to_string(),
            id_token: Some(id_token.into()),
            access_token: None,
        }
    }

    /// Form-encoded `postBody` for `accounts:signInWithIdp`.
    fn post_body(&self) -> String {
        let mut parts = Vec::new();
        if let Some(token) = &self.id_token {
            parts.push(format!("id_token={}", urlencoding::encode(token)));
        }
        if let Some(token) = &self.access_token {
            parts.push(format!("access_token={}", urlencoding::encode(token)));
        }
        parts.push(format!("providerId={}", urlencoding::encode(&self.provider_id)));
        parts.join("&")
    }
}

/// The interactive account-chooser step of a federated sign-in.
#[async_trait]
pub trait AccountChooser: Send + Sync {
    async fn choose(&self) -> Result<FederatedCredential, AuthError>;
}

/// A chooser whose outcome is already known, e.g. reported by the page script.
#[derive(Debug, Clone)]
pub struct PresentedCredential(pub Result<FederatedCredential, AuthError>);

impl PresentedCredential {
    /// Outcome reported as a provider error code (`auth/popup-blocked`, ...).
    pub fn failed(code: &str) -> Self {
        Self(Err(AuthError::from_provider_code(code, "")))
    }
}

#[async_trait]
impl AccountChooser for PresentedCredential {
    async fn choose(&self) -> Result<FederatedCredential, AuthError> {
        self.0.clone()
    }
}

/// Identity provider operations used by the credential source.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in_federated(&self, chooser: &dyn AccountChooser) -> Result<Identity, AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn sign_out(&self);

    /// ID token of the current user.
    async fn get_id_token(&self) -> Result<String, AuthError>;
}

/// Hands out a fresh provider session per request.
pub trait IdentitySessions: Send + Sync {
    fn session(&self) -> Arc<dyn IdentityProvider>;
}

/// Shared Identity Toolkit REST client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirebaseAuthClient {
    /// Client against production, or the Auth emulator when `emulator_host` is set.
    pub fn new(api_key: &str, emulator_host: Option<&str>) -> anyhow::Result<Self> {
        let base_url = match emulator_host {
            Some(host) => {
                tracing::info!(host, "Using Firebase Auth emulator");
                format!("http://{}/identitytoolkit.googleapis.com/v1", host)
            }
            None => IDENTITY_TOOLKIT_URL.to_string(),
        };
        Self::with_base_url(api_key, &base_url)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Start a fresh provider session with no current user.
    pub fn new_session(&self) -> FirebaseAuthSession {
        FirebaseAuthSession {
            client: self.clone(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = format!("{}/accounts:{}?key={}", self.base_url, method, self.api_key);

        let response = self.http.post(&url).json(body).send().await.map_err(|e| {
            tracing::warn!(method, error = %e, "Identity Toolkit request failed");
            AuthError::NetworkError
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: ToolkitErrorBody = response.json().await.unwrap_or_default();
            let code = body.error.message;
            tracing::info!(method, status = %status, code = %code, "Identity Toolkit rejected request");
            return Err(AuthError::from_provider_code(&code, &code));
        }

        response.json().await.map_err(|e| {
            tracing::warn!(method, error = %e, "Invalid Identity Toolkit response");
            AuthError::NetworkError
        })
    }

    async fn lookup(&self, id_token: &str) -> Result<ToolkitUser, AuthError> {
        let response: LookupResponse = self
            .call("lookup", &serde_json::json!({ "idToken": id_token }))
            .await?;

        response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::from_provider_code("USER_NOT_FOUND", "User not found"))
    }
}

impl IdentitySessions for FirebaseAuthClient {
    fn session(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(self.new_session())
    }
}

struct SignedIn {
    identity: Identity,
    id_token: String,
}

/// One provider session. Clones share the same current user.
#[derive(Clone)]
pub struct FirebaseAuthSession {
    client: FirebaseAuthClient,
    current: Arc<Mutex<Option<SignedIn>>>,
}

impl FirebaseAuthSession {
    fn set_current(&self, identity: Identity, id_token: String) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(SignedIn { identity, id_token });
    }

    /// The signed-in identity, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.identity.clone())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthSession {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let created: TokenResponse = self.client.call("signUp", &body).await?;

        let identity = Identity {
            uid: created.local_id,
            email: created.email.unwrap_or_else(|| email.to_string()),
            display_name: None,
            photo_url: None,
            email_verified: false,
        };
        tracing::info!(uid = %identity.uid, "Created provider account");

        self.set_current(identity.clone(), created.id_token);
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let signed_in: TokenResponse = self.client.call("signInWithPassword", &body).await?;

        // signInWithPassword does not report verification status.
        let user = self.client.lookup(&signed_in.id_token).await?;
        let identity = user.into_identity(email);

        self.set_current(identity.clone(), signed_in.id_token);
        Ok(identity)
    }

    async fn sign_in_federated(&self, chooser: &dyn AccountChooser) -> Result<Identity, AuthError> {
        let credential = chooser.choose().await?;

        let body = serde_json::json!({
            "postBody": credential.post_body(),
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        let signed_in: IdpResponse = self.client.call("signInWithIdp", &body).await?;

        let identity = Identity {
            uid: signed_in.local_id,
            email: signed_in.email.unwrap_or_default(),
            display_name: signed_in.display_name,
            photo_url: signed_in.photo_url,
            email_verified: signed_in.email_verified,
        };
        tracing::info!(uid = %identity.uid, provider = %credential.provider_id, "Federated sign-in");

        self.set_current(identity.clone(), signed_in.id_token);
        Ok(identity)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let body = serde_json::json!({
            "requestType": "PASSWORD_RESET",
            "email": email,
        });
        let _: serde_json::Value = self.client.call("sendOobCode", &body).await?;
        Ok(())
    }

    async fn sign_out(&self) {
        if let Some(previous) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            tracing::debug!(uid = %previous.identity.uid, "Signed out");
        }
    }

    async fn get_id_token(&self) -> Result<String, AuthError> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.id_token.clone())
            .ok_or_else(|| AuthError::Provider {
                code: "no-current-user".to_string(),
                message: "No user is signed in".to_string(),
            })
    }
}

// ─── Identity Toolkit wire types ─────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ToolkitErrorBody {
    #[serde(default)]
    error: ToolkitError,
}

#[derive(Debug, Default, Deserialize)]
struct ToolkitError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpResponse {
    local_id: String,
    id_token: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<ToolkitUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolkitUser {
    local_id: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl ToolkitUser {
    fn into_identity(self, fallback_email: &str) -> Identity {
        Identity {
            uid: self.local_id,
            email: self.email.unwrap_or_else(|| fallback_email.to_string()),
            display_name: self.display_name,
            photo_url: self.photo_url,
            email_verified: self.email_verified,
        }
    }
}

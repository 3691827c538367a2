// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::Serialize;
use solthron_auth::config::Config;
use solthron_auth::db::{FirestoreDb, MemoryAccountStore};
use solthron_auth::error::AuthError;
use solthron_auth::models::Identity;
use solthron_auth::relay::WindowTarget;
use solthron_auth::routes::create_router;
use solthron_auth::services::{
    AccountChooser, BackendClient, FirebaseTokenVerifier, IdentityProvider, IdentitySessions,
};
use solthron_auth::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_PROJECT: &str = "test-project";
pub const TEST_KID: &str = "test-kid";

const PRIVATE_KEY_PEM: &str = include_str!("../fixtures/test_rsa_private.pem");
const PUBLIC_KEY_PEM: &str = include_str!("../fixtures/test_rsa_public.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new(TEST_PROJECT)
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique suffix for test isolation.
#[allow(dead_code)]
pub fn unique_id() -> String {
    format!(
        "{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

// ─── ID tokens ───────────────────────────────────────────────

#[derive(Serialize)]
struct TestClaims<'a> {
    iss: String,
    aud: &'a str,
    sub: &'a str,
    iat: u64,
    exp: u64,
    email: &'a str,
    email_verified: bool,
}

/// Mint a Firebase-style ID token signed with the test key.
#[allow(dead_code)]
pub fn mint_id_token(uid: &str, email: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = TestClaims {
        iss: format!("https://securetoken.google.com/{}", TEST_PROJECT),
        aud: TEST_PROJECT,
        sub: uid,
        iat: now,
        exp: now + 3600,
        email,
        email_verified: true,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());

    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

/// Verifier that trusts the test key.
#[allow(dead_code)]
pub fn test_verifier() -> FirebaseTokenVerifier {
    FirebaseTokenVerifier::new_with_static_key(
        TEST_PROJECT,
        TEST_KID,
        DecodingKey::from_rsa_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

// ─── Identity provider fake ──────────────────────────────────

struct FakeUser {
    identity: Identity,
    password: String,
}

/// Accounts known to the fake identity provider, shared by all its sessions.
#[derive(Default)]
pub struct FakeDirectory {
    users: Mutex<HashMap<String, FakeUser>>,
    google: Mutex<HashMap<String, Identity>>,
    next_uid: AtomicUsize,
    sign_outs: AtomicUsize,
    resets: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn allocate_uid(&self) -> String {
        format!("uid-{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn add_password_user(&self, email: &str, password: &str, verified: bool) -> Identity {
        let identity = Identity {
            uid: self.allocate_uid(),
            email: email.to_string(),
            display_name: None,
            photo_url: None,
            email_verified: verified,
        };
        self.users.lock().unwrap().insert(
            email.to_string(),
            FakeUser {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        identity
    }

    /// Register a Google account reachable with `google_token`.
    pub fn add_google_user(&self, google_token: &str, email: &str, display_name: &str) -> Identity {
        self.insert_google_user(google_token, email, display_name, true)
    }

    /// Register a Google account whose email the provider reports unverified.
    pub fn add_unverified_google_user(
        &self,
        google_token: &str,
        email: &str,
        display_name: &str,
    ) -> Identity {
        self.insert_google_user(google_token, email, display_name, false)
    }

    fn insert_google_user(
        &self,
        google_token: &str,
        email: &str,
        display_name: &str,
        verified: bool,
    ) -> Identity {
        let identity = Identity {
            uid: self.allocate_uid(),
            email: email.to_string(),
            display_name: Some(display_name.to_string()),
            photo_url: Some(format!("https://photos.example.com/{}.png", email)),
            email_verified: verified,
        };
        self.google
            .lock()
            .unwrap()
            .insert(google_token.to_string(), identity.clone());
        identity
    }

    pub fn verify_email(&self, email: &str) {
        if let Some(user) = self.users.lock().unwrap().get_mut(email) {
            user.identity.email_verified = true;
        }
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    pub fn password_resets(&self) -> Vec<String> {
        self.resets.lock().unwrap().clone()
    }
}

/// One session against the fake directory.
pub struct FakeIdentity {
    directory: Arc<FakeDirectory>,
    current: Mutex<Option<Identity>>,
}

#[allow(dead_code)]
impl FakeIdentity {
    pub fn new(directory: Arc<FakeDirectory>) -> Self {
        Self {
            directory,
            current: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone()
    }

    fn set_current(&self, identity: &Identity) {
        *self.current.lock().unwrap() = Some(identity.clone());
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if password.len() < 6 {
            return Err(AuthError::WeakPassword);
        }
        if self.directory.users.lock().unwrap().contains_key(email) {
            return Err(AuthError::EmailInUse);
        }
        let identity = self.directory.add_password_user(email, password, false);
        self.set_current(&identity);
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let users = self.directory.users.lock().unwrap();
            match users.get(email) {
                Some(user) if user.password == password => user.identity.clone(),
                _ => return Err(AuthError::InvalidCredential),
            }
        };
        self.set_current(&identity);
        Ok(identity)
    }

    async fn sign_in_federated(&self, chooser: &dyn AccountChooser) -> Result<Identity, AuthError> {
        let credential = chooser.choose().await?;
        let token = credential.id_token.unwrap_or_default();
        let identity = self
            .directory
            .google
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or(AuthError::InvalidCredential)?;
        self.set_current(&identity);
        Ok(identity)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.directory.resets.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn sign_out(&self) {
        self.directory.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
    }

    async fn get_id_token(&self) -> Result<String, AuthError> {
        let current = self.current().ok_or(AuthError::InvalidCredential)?;
        Ok(mint_id_token(&current.uid, &current.email))
    }
}

/// Session factory over a fake directory.
pub struct FakeSessions(pub Arc<FakeDirectory>);

impl IdentitySessions for FakeSessions {
    fn session(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(FakeIdentity::new(self.0.clone()))
    }
}

// ─── Window targets ──────────────────────────────────────────

/// Window target that records every post.
#[derive(Default)]
pub struct RecordingTarget {
    posts: Mutex<Vec<(serde_json::Value, String)>>,
}

#[allow(dead_code)]
impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.posts.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn origins(&self) -> Vec<String> {
        self.posts.lock().unwrap().iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

impl WindowTarget for RecordingTarget {
    fn post_message(&self, message: &serde_json::Value, target_origin: &str) -> anyhow::Result<()> {
        self.posts
            .lock()
            .unwrap()
            .push((message.clone(), target_origin.to_string()));
        Ok(())
    }
}

/// Window target whose context has gone away.
pub struct FailingTarget;

impl WindowTarget for FailingTarget {
    fn post_message(&self, _message: &serde_json::Value, _target_origin: &str) -> anyhow::Result<()> {
        anyhow::bail!("window closed")
    }
}

// ─── App ─────────────────────────────────────────────────────

/// Router plus handles on its fakes.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub accounts: Arc<MemoryAccountStore>,
    pub directory: Arc<FakeDirectory>,
}

/// Create a test app with in-memory accounts and a fake identity provider.
///
/// `backend_url` is usually a wiremock server.
#[allow(dead_code)]
pub fn create_test_app(backend_url: &str) -> TestApp {
    let config = Config {
        firebase_project_id: TEST_PROJECT.to_string(),
        backend_url: backend_url.to_string(),
        ..Config::default()
    };

    let accounts = Arc::new(MemoryAccountStore::new());
    let directory = FakeDirectory::new();

    let state = Arc::new(AppState::new(
        config,
        accounts.clone(),
        Arc::new(FakeSessions(directory.clone())),
        BackendClient::new(backend_url).unwrap(),
        Arc::new(test_verifier()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        accounts,
        directory,
    }
}

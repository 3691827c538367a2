// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential source tests: sign-in policy and account record upkeep.

use solthron_auth::db::MemoryAccountStore;
use solthron_auth::error::{AppError, AuthError};
use solthron_auth::models::{Provider, SignupProfile, SIGNUP_CREDITS};
use solthron_auth::services::{
    AccountSync, AuthMethod, BackendClient, CredentialSource, FederatedCredential,
    IdentityProvider, PresentedCredential,
};
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{FakeDirectory, FakeIdentity};

struct Harness {
    source: CredentialSource,
    provider: Arc<FakeIdentity>,
    accounts: Arc<MemoryAccountStore>,
    directory: Arc<FakeDirectory>,
}

fn harness(backend_url: &str) -> Harness {
    let directory = FakeDirectory::new();
    let provider = Arc::new(FakeIdentity::new(directory.clone()));
    let accounts = Arc::new(MemoryAccountStore::new());
    let source = CredentialSource::new(
        provider.clone(),
        accounts.clone(),
        BackendClient::new(backend_url).unwrap(),
    );
    Harness {
        source,
        provider,
        accounts,
        directory,
    }
}

fn google(token: &str) -> PresentedCredential {
    PresentedCredential(Ok(FederatedCredential::google_id_token(token)))
}

#[tokio::test]
async fn test_federated_first_sign_in_creates_record() {
    let h = harness("http://127.0.0.1:9");
    let expected = h
        .directory
        .add_google_user("g-token", "ada@example.com", "Ada King Lovelace");

    let chooser = google("g-token");
    let identity = h
        .source
        .authenticate(AuthMethod::Federated(&chooser))
        .await
        .unwrap();
    assert_eq!(identity.uid, expected.uid);

    let record = h.accounts.record(&identity.uid).unwrap();
    assert_eq!(record.credits, SIGNUP_CREDITS);
    assert!(record.email_verified);
    assert!(record.email_verified_at.is_some());
    assert_eq!(record.provider, Some(Provider::Google));
    assert_eq!(record.first_name, "Ada");
    assert_eq!(record.last_name, "King Lovelace");
    assert_eq!(record.username, "Ada King Lovelace");
    assert_eq!(record.subscription_status, "free");
    assert_eq!(record.photo_url, expected.photo_url);
}

#[tokio::test]
async fn test_repeated_sign_ins_create_once() {
    let h = harness("http://127.0.0.1:9");
    h.directory
        .add_google_user("g-token", "grace@example.com", "Grace Hopper");
    let chooser = google("g-token");

    for _ in 0..3 {
        h.source
            .authenticate(AuthMethod::Federated(&chooser))
            .await
            .unwrap();
    }

    assert_eq!(h.accounts.create_calls(), 1);
}

#[tokio::test]
async fn test_federated_refreshes_stale_verification() {
    let h = harness("http://127.0.0.1:9");
    let identity = h
        .directory
        .add_google_user("g-token", "linus@example.com", "Linus");

    // Record left unverified by an earlier password sign-up
    let mut record = solthron_auth::models::AccountRecord::for_password_identity(
        &solthron_auth::models::Identity {
            email_verified: false,
            photo_url: None,
            ..identity.clone()
        },
        "2026-01-01T00:00:00Z",
    );
    record.credits = 42;
    h.accounts.insert(record);

    let sync = h.source.ensure_account(&identity, Provider::Google).await.unwrap();
    assert_eq!(sync, AccountSync::Refreshed);

    let record = h.accounts.record(&identity.uid).unwrap();
    assert!(record.email_verified);
    assert_eq!(record.photo_url, identity.photo_url);
    // Nothing but verification and photo changes
    assert_eq!(record.credits, 42);
    assert_eq!(h.accounts.create_calls(), 0);
}

#[tokio::test]
async fn test_unverified_federated_identity_still_signs_in() {
    let h = harness("http://127.0.0.1:9");
    let expected = h
        .directory
        .add_unverified_google_user("g-token", "ken@example.com", "Ken Thompson");

    let chooser = google("g-token");
    let identity = h
        .source
        .authenticate(AuthMethod::Federated(&chooser))
        .await
        .unwrap();
    assert_eq!(identity.uid, expected.uid);
    assert!(!identity.email_verified);
    assert_eq!(h.directory.sign_out_count(), 0);
    assert!(h.provider.current().is_some());

    let record = h.accounts.record(&identity.uid).unwrap();
    assert!(record.email_verified);
    assert!(record.email_verified_at.is_some());
    assert_eq!(record.provider, Some(Provider::Google));
}

#[tokio::test]
async fn test_unverified_federated_identity_refreshes_stale_record() {
    let h = harness("http://127.0.0.1:9");
    let identity = h
        .directory
        .add_unverified_google_user("g-token", "dmr@example.com", "Dennis");

    let mut record = solthron_auth::models::AccountRecord::for_password_identity(
        &identity,
        "2026-01-01T00:00:00Z",
    );
    record.credits = 7;
    h.accounts.insert(record);

    let chooser = google("g-token");
    h.source
        .authenticate(AuthMethod::Federated(&chooser))
        .await
        .unwrap();

    let record = h.accounts.record(&identity.uid).unwrap();
    assert!(record.email_verified);
    assert_eq!(record.credits, 7);
    assert_eq!(h.accounts.create_calls(), 0);
}

#[tokio::test]
async fn test_unverified_password_sign_in_is_revoked() {
    let h = harness("http://127.0.0.1:9");
    h.directory
        .add_password_user("new@example.com", "secret123", false);

    let err = h
        .source
        .authenticate(AuthMethod::Password {
            email: "new@example.com",
            password: "secret123",
        })
        .await
        .unwrap_err();

    match err {
        AppError::Auth(AuthError::EmailNotVerified { email }) => {
            assert_eq!(email, "new@example.com")
        }
        other => panic!("expected EmailNotVerified, got {other:?}"),
    }
    assert!(h.provider.current().is_none(), "session must be revoked");
    assert_eq!(h.directory.sign_out_count(), 1);
}

#[tokio::test]
async fn test_verified_password_sign_in_refreshes_record() {
    let h = harness("http://127.0.0.1:9");
    h.directory
        .add_password_user("ok@example.com", "secret123", false);

    // Sign-up wrote an unverified record
    let profile = SignupProfile {
        first_name: "Ok".to_string(),
        last_name: "User".to_string(),
        username: "okuser".to_string(),
        email: "ok@example.com".to_string(),
    };
    let uid = h
        .provider
        .sign_in("ok@example.com", "secret123")
        .await
        .unwrap()
        .uid;
    h.accounts.insert(
        solthron_auth::models::AccountRecord::for_password_signup(&uid, &profile, "2026-01-01T00:00:00Z"),
    );

    h.directory.verify_email("ok@example.com");
    let identity = h
        .source
        .authenticate(AuthMethod::Password {
            email: "ok@example.com",
            password: "secret123",
        })
        .await
        .unwrap();

    assert!(identity.email_verified);
    let record = h.accounts.record(&uid).unwrap();
    assert!(record.email_verified);
    assert!(record.email_verified_at.is_some());
    assert_eq!(record.username, "okuser");
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credential() {
    let h = harness("http://127.0.0.1:9");
    h.directory
        .add_password_user("ok@example.com", "secret123", true);

    let err = h
        .source
        .authenticate(AuthMethod::Password {
            email: "ok@example.com",
            password: "nope",
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::InvalidCredential)));
}

#[tokio::test]
async fn test_chooser_failures_surface() {
    let h = harness("http://127.0.0.1:9");

    for (code, expected) in [
        ("auth/popup-blocked", AuthError::PopupBlocked),
        ("auth/popup-closed-by-user", AuthError::PopupClosedByUser),
        ("auth/network-request-failed", AuthError::NetworkError),
        ("auth/too-many-requests", AuthError::TooManyRequests),
    ] {
        let chooser = PresentedCredential::failed(code);
        let err = h
            .source
            .authenticate(AuthMethod::Federated(&chooser))
            .await
            .unwrap_err();
        match err {
            AppError::Auth(e) => assert_eq!(e, expected),
            other => panic!("expected auth error for {code}, got {other:?}"),
        }
    }
    assert_eq!(h.accounts.create_calls(), 0);
}

#[tokio::test]
async fn test_register_creates_unverified_record_and_signs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-verification-email"))
        .and(body_json(serde_json::json!({
            "email": "fresh@example.com",
            "firstName": "Fresh"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let profile = SignupProfile {
        first_name: "Fresh".to_string(),
        last_name: "Person".to_string(),
        username: "fresh".to_string(),
        email: "fresh@example.com".to_string(),
    };

    let identity = h.source.register(&profile, "secret123").await.unwrap();

    let record = h.accounts.record(&identity.uid).unwrap();
    assert!(!record.email_verified);
    assert_eq!(record.credits, SIGNUP_CREDITS);
    assert_eq!(record.provider, Some(Provider::Password));
    assert_eq!(record.username, "fresh");
    assert!(h.provider.current().is_none());
}

#[tokio::test]
async fn test_register_survives_email_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-verification-email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "mailgun down"
        })))
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let profile = SignupProfile {
        email: "fresh@example.com".to_string(),
        ..Default::default()
    };

    let identity = h.source.register(&profile, "secret123").await.unwrap();
    assert!(h.accounts.record(&identity.uid).is_some());
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let h = harness("http://127.0.0.1:9");
    h.directory
        .add_password_user("taken@example.com", "secret123", true);

    let profile = SignupProfile {
        email: "taken@example.com".to_string(),
        ..Default::default()
    };
    let err = h.source.register(&profile, "secret123").await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::EmailInUse)));
}

#[tokio::test]
async fn test_resend_verification_sends_empty_first_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-verification-email"))
        .and(body_json(serde_json::json!({
            "email": "again@example.com",
            "firstName": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    h.source
        .resend_verification("again@example.com")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_password_reset_goes_to_provider() {
    let h = harness("http://127.0.0.1:9");
    h.source
        .send_password_reset("forgot@example.com")
        .await
        .unwrap();
    assert_eq!(h.directory.password_resets(), vec!["forgot@example.com"]);
}

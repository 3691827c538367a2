// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity Toolkit adapter tests against a mock REST endpoint.

use solthron_auth::error::AuthError;
use solthron_auth::services::{
    FederatedCredential, FirebaseAuthClient, IdentityProvider, PresentedCredential,
};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-api-key";

async fn client(server: &MockServer) -> FirebaseAuthClient {
    FirebaseAuthClient::with_base_url(API_KEY, &format!("{}/v1", server.uri())).unwrap()
}

fn toolkit_error(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "error": { "code": 400, "message": message }
    }))
}

#[tokio::test]
async fn test_sign_up_sets_current_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .and(query_param("key", API_KEY))
        .and(body_partial_json(serde_json::json!({
            "email": "new@example.com",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "localId": "uid-new",
            "idToken": "id-token-new",
            "email": "new@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    let identity = session
        .create_account("new@example.com", "secret123")
        .await
        .unwrap();

    assert_eq!(identity.uid, "uid-new");
    assert!(!identity.email_verified);
    assert_eq!(session.get_id_token().await.unwrap(), "id-token-new");
}

#[tokio::test]
async fn test_sign_up_error_codes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .and(body_partial_json(serde_json::json!({ "email": "taken@example.com" })))
        .respond_with(toolkit_error("EMAIL_EXISTS"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .and(body_partial_json(serde_json::json!({ "email": "weak@example.com" })))
        .respond_with(toolkit_error(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        ))
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    assert_eq!(
        session.create_account("taken@example.com", "secret123").await,
        Err(AuthError::EmailInUse)
    );
    assert_eq!(
        session.create_account("weak@example.com", "123").await,
        Err(AuthError::WeakPassword)
    );
    assert!(session.current_identity().is_none());
}

#[tokio::test]
async fn test_password_sign_in_reads_verification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "localId": "uid-1",
            "idToken": "id-token-1",
            "email": "ok@example.com",
            "registered": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:lookup"))
        .and(body_partial_json(serde_json::json!({ "idToken": "id-token-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "users": [{
                "localId": "uid-1",
                "email": "ok@example.com",
                "emailVerified": true,
                "displayName": "Ok User"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    let identity = session.sign_in("ok@example.com", "secret123").await.unwrap();

    assert_eq!(identity.uid, "uid-1");
    assert!(identity.email_verified);
    assert_eq!(identity.display_name.as_deref(), Some("Ok User"));
    assert_eq!(session.current_identity(), Some(identity));

    session.sign_out().await;
    assert!(session.current_identity().is_none());
    assert!(session.get_id_token().await.is_err());
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(toolkit_error("INVALID_LOGIN_CREDENTIALS"))
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    assert_eq!(
        session.sign_in("ok@example.com", "nope").await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_federated_sign_in_posts_id_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithIdp"))
        .and(body_partial_json(serde_json::json!({
            "postBody": "id_token=google-id-token&providerId=google.com",
            "requestUri": "http://localhost",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "localId": "uid-g",
            "idToken": "firebase-id-token",
            "email": "g@example.com",
            "emailVerified": true,
            "displayName": "Gee User",
            "photoUrl": "https://photos.example.com/g.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    let chooser = PresentedCredential(Ok(FederatedCredential::google_id_token("google-id-token")));
    let identity = session.sign_in_federated(&chooser).await.unwrap();

    assert_eq!(identity.uid, "uid-g");
    assert_eq!(identity.photo_url.as_deref(), Some("https://photos.example.com/g.png"));
    assert_eq!(session.get_id_token().await.unwrap(), "firebase-id-token");
}

#[tokio::test]
async fn test_chooser_failure_never_calls_toolkit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    let chooser = PresentedCredential::failed("auth/popup-closed-by-user");
    assert_eq!(
        session.sign_in_federated(&chooser).await,
        Err(AuthError::PopupClosedByUser)
    );
}

#[tokio::test]
async fn test_password_reset_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:sendOobCode"))
        .and(body_partial_json(serde_json::json!({
            "requestType": "PASSWORD_RESET",
            "email": "forgot@example.com"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "email": "forgot@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).await.new_session();
    session.send_password_reset("forgot@example.com").await.unwrap();
}

#[tokio::test]
async fn test_unreachable_toolkit_is_network_error() {
    let session = FirebaseAuthClient::with_base_url(API_KEY, "http://127.0.0.1:9/v1")
        .unwrap()
        .new_session();
    assert_eq!(
        session.sign_in("ok@example.com", "secret123").await,
        Err(AuthError::NetworkError)
    );
}

#[test]
fn test_emulator_base_url() {
    // Construction only; the emulator host is not contacted.
    assert!(FirebaseAuthClient::new(API_KEY, Some("127.0.0.1:9099")).is_ok());
}

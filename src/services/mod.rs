// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod backend;
pub mod credential_source;
pub mod exchange;
pub mod firebase_token;
pub mod identity;

pub use backend::{BackendClient, GenerateRequest};
pub use credential_source::{AccountSync, AuthMethod, CredentialSource};
pub use exchange::SessionExchanger;
pub use firebase_token::{FirebaseTokenVerifier, IdTokenError, VerifiedUser};
pub use identity::{
    AccountChooser, FederatedCredential, FirebaseAuthClient, FirebaseAuthSession,
    IdentityProvider, IdentitySessions, PresentedCredential,
};

//! Database layer (Firestore).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryAccountStore;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{AccountRecord, AccountUpdate};

/// Collection names as constants.
pub mod collections {
    /// Account records (keyed by uid)
    pub const USERS: &str = "users";
}

/// Document store holding one account record per uid.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch the record for `uid`, if any.
    async fn get(&self, uid: &str) -> Result<Option<AccountRecord>, AppError>;

    /// Create the record for `uid`. Fails if one already exists.
    async fn create(&self, uid: &str, record: &AccountRecord) -> Result<(), AppError>;

    /// Write only the fields present in `update`.
    async fn update(&self, uid: &str, update: &AccountUpdate) -> Result<(), AppError>;
}

//! In-memory account store for tests and offline runs.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::db::AccountStore;
use crate::error::AppError;
use crate::models::{AccountRecord, AccountUpdate};

#[derive(Default)]
pub struct MemoryAccountStore {
    records: DashMap<String, AccountRecord>,
    creates: AtomicUsize,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a create.
    pub fn insert(&self, record: AccountRecord) {
        self.records.insert(record.user_id.clone(), record);
    }

    /// Snapshot of the stored record.
    pub fn record(&self, uid: &str) -> Option<AccountRecord> {
        self.records.get(uid).map(|r| r.clone())
    }

    /// Number of successful `create` calls.
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, uid: &str) -> Result<Option<AccountRecord>, AppError> {
        Ok(self.record(uid))
    }

    async fn create(&self, uid: &str, record: &AccountRecord) -> Result<(), AppError> {
        match self.records.entry(uid.to_string()) {
            Entry::Occupied(_) => Err(AppError::Database(format!(
                "Account {} already exists",
                uid
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                self.creates.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn update(&self, uid: &str, update: &AccountUpdate) -> Result<(), AppError> {
        let mut record = self
            .records
            .get_mut(uid)
            .ok_or_else(|| AppError::Database(format!("Account {} not found", uid)))?;
        update.apply_to(&mut record);
        Ok(())
    }
}

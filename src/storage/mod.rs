//! Persistence adapter: string blobs under string keys.
//!
//! Callers treat every failure as "absent" and carry on with in-memory state,
//! so implementations report errors but never need to recover from them.

mod migrations;
pub mod sqlite;

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::error::PersistenceError;

pub use sqlite::SqliteStorage;

pub const SETTINGS_KEY: &str = "scannerSettings";
pub const HISTORY_KEY: &str = "scanHistory";

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Backend("memory storage poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Backend("memory storage poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_round_trips() {
        let storage = MemoryStorage::new();
        assert!(storage.get(HISTORY_KEY).await.unwrap().is_none());
        storage.set(HISTORY_KEY, "[]").await.unwrap();
        assert_eq!(storage.get(HISTORY_KEY).await.unwrap().as_deref(), Some("[]"));
    }
}

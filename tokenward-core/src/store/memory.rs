//! In-memory credential storage implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{CredentialStore, Secret, SetOptions, StoreError, StoredEntry};

/// In-memory credential store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
/// Entries still honor their expiration horizon.
pub struct MemoryStore {
    data: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a memory store seeded with values, each stamped with the
    /// default horizon.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let options = SetOptions::default();
        let data = values
            .into_iter()
            .map(|(k, v)| (k.into(), StoredEntry::new(Secret::new(v), &options)))
            .collect();
        Self {
            data: RwLock::new(data),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        let data = self.data.read();
        Ok(data
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError> {
        self.data
            .write()
            .insert(key.to_string(), StoredEntry::new(value.clone(), options));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }
}

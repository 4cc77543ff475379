//! OS keyring-backed credential storage implementation.

use async_trait::async_trait;
use chrono::Utc;
use keyring::Entry;

use super::{CredentialStore, Secret, SetOptions, StoreError, StoredEntry};

/// OS keyring-backed credential store.
///
/// This store uses the platform's native keyring service:
/// - macOS: Keychain
/// - Linux: Secret Service API (via libsecret)
/// - Windows: Credential Manager
///
/// The keyring has no notion of expiry, so each entry holds a JSON
/// [`StoredEntry`] and expired entries are deleted when read.
///
/// # Storage Key Format
///
/// Entries are stored under the service `{service_name}/{key}`.
pub struct KeyringStore {
    service_name: String,
}

impl KeyringStore {
    /// Try to create a new keyring store.
    ///
    /// Returns an error if the keyring backend is not available on this platform.
    pub fn try_new(service_name: &str) -> Result<Self, StoreError> {
        let probe = format!("{}/__probe__", service_name);
        match Entry::new(&probe, "availability_check") {
            Ok(_) => Ok(Self {
                service_name: service_name.to_string(),
            }),
            Err(e) => Err(StoreError::KeyringUnavailable {
                message: format!("keyring backend not available: {}", e),
            }),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        let service = format!("{}/{}", self.service_name, key);
        Entry::new(&service, "tokenward").map_err(|e| StoreError::BackendError {
            message: format!("failed to create keyring entry: {}", e),
        })
    }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        let entry = self.entry(key)?;

        let raw = match entry.get_password() {
            Ok(raw) => Secret::new(raw),
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(keyring::Error::Ambiguous(_)) => {
                return Err(StoreError::BackendError {
                    message: format!("ambiguous keyring entry for key: {}", key),
                });
            }
            Err(e) => {
                return Err(StoreError::BackendError {
                    message: format!("keyring error: {}", e),
                });
            }
        };

        let stored: StoredEntry = serde_json::from_str(raw.expose())?;
        if stored.is_live(Utc::now()) {
            return Ok(Some(stored.value.clone()));
        }

        tracing::debug!("Keyring entry {} expired, deleting", key);
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::BackendError {
                message: format!("failed to delete expired keyring entry: {}", e),
            }),
        }
    }

    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        let stored = Secret::new(serde_json::to_string(&StoredEntry::new(
            value.clone(),
            options,
        ))?);

        entry
            .set_password(stored.expose())
            .map_err(|e| StoreError::BackendError {
                message: format!("failed to set keyring password: {}", e),
            })
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::BackendError {
                message: format!("failed to delete keyring entry: {}", e),
            }),
        }
    }
}

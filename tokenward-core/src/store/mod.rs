//! Credential storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait for credential storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`FileJarStore`] - Persistent client-side jar backed by a JSON file
//! - [`RequestJarStore`] - Server-side jar scoped to a single in-flight request
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select backend based on availability
//!
//! # Expiration Horizon
//!
//! Every write stamps the entry with `now + ttl` (7 days unless overridden
//! through [`SetOptions`]). Reads treat entries past their horizon as absent.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokenward_core::store::{CredentialStore, MemoryStore, Secret, SetOptions};
//!
//! let store = MemoryStore::new();
//! store.set("accessToken", &Secret::new("abc"), &SetOptions::default()).await?;
//!
//! let token = store.get("accessToken").await?;
//! assert_eq!(token.unwrap().expose(), "abc");
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
mod memory;
mod request;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use file::FileJarStore;
pub use memory::MemoryStore;
pub use request::RequestJarStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// Number of days a credential survives after its most recent write.
pub const DEFAULT_CREDENTIAL_TTL_DAYS: i64 = 7;

/// Upper bound accepted by [`SetOptions::with_ttl_days`].
pub const MAX_CREDENTIAL_TTL_DAYS: i64 = 3650;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Options applied to a single [`CredentialStore::set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// How long the entry stays readable after this write.
    pub ttl: Duration,
}

impl SetOptions {
    /// Options with a custom time-to-live.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Options with a time-to-live expressed in whole days.
    ///
    /// `days` must lie in `1..=MAX_CREDENTIAL_TTL_DAYS`.
    pub fn with_ttl_days(days: i64) -> Result<Self, StoreError> {
        if !(1..=MAX_CREDENTIAL_TTL_DAYS).contains(&days) {
            return Err(StoreError::InvalidTtl { days });
        }
        Duration::try_days(days)
            .map(Self::with_ttl)
            .ok_or(StoreError::InvalidTtl { days })
    }

    /// The absolute expiry for an entry written now.
    ///
    /// Saturates at the bounds of `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match now.checked_add_signed(self.ttl) {
            Some(at) => at,
            None if self.ttl < Duration::zero() => DateTime::<Utc>::MIN_UTC,
            None => DateTime::<Utc>::MAX_UTC,
        }
    }
}

impl Default for SetOptions {
    fn default() -> Self {
        Self::with_ttl(Duration::days(DEFAULT_CREDENTIAL_TTL_DAYS))
    }
}

/// A stored value together with its expiration horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: Secret,
    pub expires_at: DateTime<Utc>,
}

impl StoredEntry {
    /// Stamp a value with the horizon described by `options`.
    pub fn new(value: Secret, options: &SetOptions) -> Self {
        Self {
            value,
            expires_at: options.expires_at(),
        }
    }

    /// Whether the entry is still inside its horizon at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Reading or writing the persistent jar failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A time-to-live outside the accepted range.
    #[error("credential TTL of {days} days is out of range (1..={max})", max = MAX_CREDENTIAL_TTL_DAYS)]
    InvalidTtl { days: i64 },

    /// A value that cannot be carried by the backend verbatim.
    #[error("value for {key:?} contains characters the backend cannot store")]
    InvalidValue { key: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over credential storage backends.
///
/// Writes overwrite unconditionally and refresh the entry's expiration
/// horizon. There is no transactional guarantee across keys: a caller that
/// writes two keys in sequence may be observed between the writes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a value at the given key, overwriting any existing value.
    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError>;

    /// Remove a value by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key holds a live value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[async_trait]
impl<S: CredentialStore + ?Sized> CredentialStore for Box<S> {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError> {
        (**self).set(key, value, options).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key).await
    }
}

#[async_trait]
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError> {
        (**self).set(key, value, options).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key).await
    }
}

/// Create a credential store with automatic backend selection.
///
/// # Backend Selection Logic
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   a [`KeyringStore`] is tried first.
/// - Otherwise, or when the keyring is unavailable, a [`FileJarStore`] at
///   `jar_path` is opened when a path is given.
/// - With no path, a [`MemoryStore`] is returned. Credentials then do not
///   persist across restarts.
pub fn create_store(
    prefer_keyring: bool,
    jar_path: Option<PathBuf>,
) -> Result<Box<dyn CredentialStore>, StoreError> {
    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        match KeyringStore::try_new("tokenward") {
            Ok(store) => {
                tracing::info!("Using OS keyring for credential storage");
                return Ok(Box::new(store));
            }
            Err(e) => {
                tracing::warn!("Keyring unavailable ({}), falling back to credential jar", e);
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            "Keyring storage requested but keyring-store feature not enabled. \
             Using credential jar instead."
        );
    }

    match jar_path {
        Some(path) => {
            tracing::debug!("Using credential jar at {:?}", path);
            Ok(Box::new(FileJarStore::open(path)?))
        }
        None => {
            tracing::debug!("Using in-memory credential storage");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

//! Credential teardown.

use tracing::{info, warn};

use crate::credentials::CredentialKeys;
use crate::store::{CredentialStore, StoreError};

/// Remove both credentials, then invoke `on_redirect`.
///
/// Both removals are attempted even if the first one fails. The redirect only
/// runs once the store is known to be clear; if a removal failed, the first
/// error is returned and `on_redirect` is not called. Calling this on an
/// already empty store is harmless.
pub async fn logout<S, F>(store: &S, keys: &CredentialKeys, on_redirect: F) -> Result<(), StoreError>
where
    S: CredentialStore + ?Sized,
    F: FnOnce(),
{
    let access = store.remove(&keys.access).await;
    let refresh = store.remove(&keys.refresh).await;

    if let Err(e) = access.and(refresh) {
        warn!("Failed to clear credentials: {}", e);
        return Err(e);
    }

    info!("Cleared stored credentials");
    on_redirect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::store::{MemoryStore, Secret, SetOptions};
    use async_trait::async_trait;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "A"), (REFRESH_TOKEN_KEY, "R")]);
        let keys = CredentialKeys::default();
        let redirects = Cell::new(0);

        for _ in 0..2 {
            logout(&store, &keys, || redirects.set(redirects.get() + 1))
                .await
                .unwrap();

            assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
            assert!(store.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
        }

        assert_eq!(redirects.get(), 2);
    }

    #[tokio::test]
    async fn test_logout_leaves_other_keys() {
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "A"), ("theme", "dark")]);

        logout(&store, &CredentialKeys::default(), || {}).await.unwrap();

        assert_eq!(store.get("theme").await.unwrap().unwrap().expose(), "dark");
    }

    /// Store whose removals always fail.
    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Secret>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &Secret, _options: &SetOptions) -> Result<(), StoreError> {
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::BackendError {
                message: format!("cannot remove {}", key),
            })
        }
    }

    #[tokio::test]
    async fn test_no_redirect_when_clearing_fails() {
        let redirected = Cell::new(false);

        let result = logout(&BrokenStore, &CredentialKeys::default(), || redirected.set(true)).await;

        assert!(matches!(result, Err(StoreError::BackendError { .. })));
        assert!(!redirected.get());
    }
}

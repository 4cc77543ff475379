//! Credential pair handling.
//!
//! This module provides:
//! - [`CredentialKeys`] - The pair of store keys holding the credentials
//! - [`CredentialPair`] - A snapshot of both credentials
//! - [`AccessGrant`] / [`TokenPair`] - Payloads minted by the remote service
//! - [`bearer_headers`] - The `Authorization` header for the stored access credential
//!
//! The two credentials are independent store entries with their own
//! lifecycles. Either one being present is enough to count as authenticated;
//! only the access credential is ever sent.

use serde::{Deserialize, Serialize};

use crate::store::{CredentialStore, Secret, SetOptions, StoreError};
use crate::transport::Headers;

/// Default store key of the access credential.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Default store key of the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Name of the header carrying the access credential.
pub const AUTHORIZATION: &str = "Authorization";

/// Store keys for the access and refresh credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialKeys {
    pub access: String,
    pub refresh: String,
}

impl CredentialKeys {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self::new(ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY)
    }
}

/// Snapshot of both credentials as currently stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: Option<Secret>,
    pub refresh: Option<Secret>,
}

impl CredentialPair {
    /// Read both credentials from `store`.
    pub async fn load<S>(store: &S, keys: &CredentialKeys) -> Result<Self, StoreError>
    where
        S: CredentialStore + ?Sized,
    {
        Ok(Self {
            access: store.get(&keys.access).await?,
            refresh: store.get(&keys.refresh).await?,
        })
    }

    /// Whether either credential is present.
    pub fn is_authenticated(&self) -> bool {
        self.access.is_some() || self.refresh.is_some()
    }
}

/// A newly minted access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub access_token: Secret,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

/// Both credentials, as returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: Secret,
    pub refresh_token: Secret,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Whether the store holds either credential.
pub async fn is_authenticated<S>(store: &S, keys: &CredentialKeys) -> Result<bool, StoreError>
where
    S: CredentialStore + ?Sized,
{
    Ok(CredentialPair::load(store, keys).await?.is_authenticated())
}

/// `Authorization: Bearer <access>` when an access credential is stored,
/// otherwise an empty header set.
pub async fn bearer_headers<S>(store: &S, keys: &CredentialKeys) -> Result<Headers, StoreError>
where
    S: CredentialStore + ?Sized,
{
    let mut headers = Headers::new();
    if let Some(access) = store.get(&keys.access).await? {
        headers.insert(
            AUTHORIZATION.to_string(),
            format!("Bearer {}", access.expose()),
        );
    }
    Ok(headers)
}

/// Write both credentials, access first.
pub async fn store_pair<S>(
    store: &S,
    keys: &CredentialKeys,
    pair: &TokenPair,
    options: &SetOptions,
) -> Result<(), StoreError>
where
    S: CredentialStore + ?Sized,
{
    store.set(&keys.access, &pair.access_token, options).await?;
    store.set(&keys.refresh, &pair.refresh_token, options).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_bearer_header_when_access_present() {
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "A")]);

        let headers = bearer_headers(&store, &CredentialKeys::default()).await.unwrap();

        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer A"));
    }

    #[tokio::test]
    async fn test_no_header_without_access() {
        let store = MemoryStore::with_values([(REFRESH_TOKEN_KEY, "R")]);

        let headers = bearer_headers(&store, &CredentialKeys::default()).await.unwrap();

        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_either_credential_authenticates() {
        let keys = CredentialKeys::default();

        let refresh_only = MemoryStore::with_values([(REFRESH_TOKEN_KEY, "R")]);
        assert!(is_authenticated(&refresh_only, &keys).await.unwrap());

        let access_only = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "A")]);
        assert!(is_authenticated(&access_only, &keys).await.unwrap());

        let empty = MemoryStore::new();
        assert!(!is_authenticated(&empty, &keys).await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_keys() {
        let keys = CredentialKeys::new("at", "rt");
        let store = MemoryStore::new();
        let pair = TokenPair {
            access_token: Secret::new("A"),
            refresh_token: Secret::new("R"),
            token_type: "Bearer".into(),
        };

        store_pair(&store, &keys, &pair, &SetOptions::default()).await.unwrap();

        let loaded = CredentialPair::load(&store, &keys).await.unwrap();
        assert_eq!(loaded.access, Some(Secret::new("A")));
        assert_eq!(loaded.refresh, Some(Secret::new("R")));
        assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
    }

    #[test]
    fn test_access_grant_wire_shape() {
        let grant: AccessGrant =
            serde_json::from_value(json!({"accessToken": "A", "tokenType": "Bearer"})).unwrap();
        assert_eq!(grant.access_token.expose(), "A");

        let defaulted: AccessGrant = serde_json::from_value(json!({"accessToken": "A"})).unwrap();
        assert_eq!(defaulted.token_type, "Bearer");
    }
}

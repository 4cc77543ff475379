//! Authenticated request layer.
//!
//! [`send`] wraps [`graphql::send`] with a single recovery cycle:
//!
//! 1. **Primary**: headers come from the auth-header hook; the request is sent.
//! 2. An error that is not authentication-class is returned as is.
//! 3. **Recovering**: the unauthorized hook runs (normally a credential
//!    refresh). If it fails, the invalid-tokens hook runs (normally a logout).
//! 4. **Retry**: headers are recomputed and the request is sent once more,
//!    whether or not recovery succeeded.
//! 5. The retry's outcome is final.
//!
//! A call therefore makes at most two network attempts and one recovery
//! attempt. Concurrent calls are independent of each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokenward_core::auth::{self, AuthHooks};
//! use tokenward_core::credentials::{bearer_headers, CredentialKeys};
//!
//! let keys = CredentialKeys::default();
//! let hooks = AuthHooks::new()
//!     .with_auth_header(|| async { bearer_headers(&store, &keys).await.unwrap_or_default() })
//!     .with_unauthorized(|| async { refresh_somehow().await });
//!
//! let data = auth::send(&transport, &destination, &request, &hooks).await?;
//! ```

use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::graphql::{self, GraphQLRequest, RequestError, merge_headers};
use crate::transport::{Headers, RequestTransport};

/// Computes the authentication headers for one attempt.
pub type HeaderHook<'a> = Box<dyn Fn() -> BoxFuture<'a, Headers> + Send + Sync + 'a>;

/// Tries to restore valid credentials after an authentication failure.
pub type RecoveryHook<'a> = Box<dyn Fn() -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'a>;

/// Reacts to a failed recovery.
pub type InvalidTokensHook<'a> = Box<dyn Fn() -> BoxFuture<'a, ()> + Send + Sync + 'a>;

/// Callbacks driving one authenticated call.
///
/// Every hook is optional:
/// - `on_get_auth_header` defaults to an empty header set;
/// - `on_unauthorized` defaults to a recovery that succeeds without doing anything;
/// - `on_invalid_tokens` defaults to doing nothing.
#[derive(Default)]
pub struct AuthHooks<'a> {
    pub on_get_auth_header: Option<HeaderHook<'a>>,
    pub on_unauthorized: Option<RecoveryHook<'a>>,
    pub on_invalid_tokens: Option<InvalidTokensHook<'a>>,
}

impl<'a> AuthHooks<'a> {
    /// Hooks with every default in place.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_header<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Headers> + Send + 'a,
    {
        self.on_get_auth_header = Some(Box::new(move || hook().boxed()));
        self
    }

    pub fn with_unauthorized<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'a,
    {
        self.on_unauthorized = Some(Box::new(move || hook().boxed()));
        self
    }

    pub fn with_invalid_tokens<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = ()> + Send + 'a,
    {
        self.on_invalid_tokens = Some(Box::new(move || hook().boxed()));
        self
    }

    async fn auth_header(&self) -> Headers {
        match &self.on_get_auth_header {
            Some(hook) => hook().await,
            None => Headers::new(),
        }
    }

    async fn unauthorized(&self) -> anyhow::Result<()> {
        match &self.on_unauthorized {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    async fn invalid_tokens(&self) {
        if let Some(hook) = &self.on_invalid_tokens {
            hook().await;
        }
    }
}

impl fmt::Debug for AuthHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHooks")
            .field("on_get_auth_header", &self.on_get_auth_header.is_some())
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .field("on_invalid_tokens", &self.on_invalid_tokens.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Primary,
    Retry,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Retry => f.write_str("retry"),
        }
    }
}

async fn attempt<T>(
    transport: &T,
    destination: &Url,
    request: &GraphQLRequest,
    hooks: &AuthHooks<'_>,
    kind: Attempt,
) -> Result<Option<Value>, RequestError>
where
    T: RequestTransport + ?Sized,
{
    let auth = hooks.auth_header().await;
    debug!(
        "Sending {} attempt to {} (authorized: {})",
        kind,
        destination,
        !auth.is_empty()
    );

    let outgoing = GraphQLRequest {
        headers: merge_headers(&request.headers, &auth),
        ..request.clone()
    };
    graphql::send(transport, destination, &outgoing).await
}

/// Send `request` with authentication headers, recovering once from an
/// authentication-class failure.
pub async fn send<T>(
    transport: &T,
    destination: &Url,
    request: &GraphQLRequest,
    hooks: &AuthHooks<'_>,
) -> Result<Option<Value>, RequestError>
where
    T: RequestTransport + ?Sized,
{
    let failure = match attempt(transport, destination, request, hooks, Attempt::Primary).await {
        Ok(data) => return Ok(data),
        Err(e) => e,
    };

    let Some(reason) = failure.auth_failure() else {
        return Err(failure);
    };

    warn!("Request to {} rejected ({}), recovering credentials", destination, reason);

    if let Err(e) = hooks.unauthorized().await {
        warn!("Credential recovery failed: {:#}", e);
        hooks.invalid_tokens().await;
    }

    attempt(transport, destination, request, hooks, Attempt::Retry).await
}

/// Like [`send`], decoding `data` into `R`.
pub async fn send_as<T, R>(
    transport: &T,
    destination: &Url,
    request: &GraphQLRequest,
    hooks: &AuthHooks<'_>,
) -> Result<R, RequestError>
where
    T: RequestTransport + ?Sized,
    R: DeserializeOwned,
{
    let data = send(transport, destination, request, hooks).await?;
    Ok(serde_json::from_value(data.unwrap_or(Value::Null))?)
}

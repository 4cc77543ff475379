//! Session facade over the request pipeline.
//!
//! A [`Session`] owns a transport, a destination, and a credential store, and
//! wires the authenticated layer to the standard hooks:
//! - auth header: `Authorization: Bearer <access>` from the store
//! - unauthorized: [`refresh`](crate::refresh::refresh) through a plain request
//! - invalid tokens: [`logout`](crate::logout::logout) and the redirect hook
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::time::Duration;
//! use tokenward_core::{GraphQLRequest, MemoryStore, ReqwestTransport, Secret, Session};
//!
//! let transport = ReqwestTransport::new(Duration::from_secs(30))?;
//! let destination = url::Url::parse("http://localhost:4000/graphql")?;
//! let session = Session::new(transport, destination, MemoryStore::new())
//!     .on_redirect(|| eprintln!("signed out"));
//!
//! session.login("ada@example.com", &Secret::new("hunter2")).await?;
//! let me = session.request(&GraphQLRequest::new("{ me { email } }")).await?;
//! println!("{:?}", me);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::auth::{self, AuthHooks};
use crate::credentials::{self, AccessGrant, CredentialKeys, TokenPair};
use crate::gate::RefreshGate;
use crate::graphql::{GraphQLRequest, RequestError};
use crate::login::{self, LoginError};
use crate::logout;
use crate::refresh::{self, RefreshError};
use crate::store::{CredentialStore, Secret, SetOptions, StoreError};
use crate::transport::{Headers, RequestTransport};

/// Navigation side effect run after credentials are cleared.
pub type RedirectHook = Arc<dyn Fn() + Send + Sync>;

/// Tunables for a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Store keys of the two credentials.
    pub keys: CredentialKeys,

    /// Options applied to every credential write.
    pub set_options: SetOptions,

    /// Collapse concurrent refreshes into one. Off by default: every request
    /// that hits an expired credential runs its own refresh.
    pub single_flight_refresh: bool,
}

/// Authenticated access to one GraphQL destination.
pub struct Session<T, S> {
    transport: T,
    destination: Url,
    store: S,
    keys: CredentialKeys,
    set_options: SetOptions,
    gate: Option<RefreshGate>,
    on_redirect: RedirectHook,
}

impl<T, S> Session<T, S>
where
    T: RequestTransport,
    S: CredentialStore,
{
    /// Create a session with default options and a no-op redirect.
    pub fn new(transport: T, destination: Url, store: S) -> Self {
        Self::with_options(transport, destination, store, SessionOptions::default())
    }

    /// Create a session with explicit options.
    pub fn with_options(transport: T, destination: Url, store: S, options: SessionOptions) -> Self {
        Self {
            transport,
            destination,
            store,
            keys: options.keys,
            set_options: options.set_options,
            gate: options.single_flight_refresh.then(RefreshGate::new),
            on_redirect: Arc::new(|| {}),
        }
    }

    /// Set the redirect run after a logout.
    pub fn on_redirect<F>(mut self, on_redirect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_redirect = Arc::new(on_redirect);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn destination(&self) -> &Url {
        &self.destination
    }

    pub fn keys(&self) -> &CredentialKeys {
        &self.keys
    }

    /// Whether either credential is stored.
    pub async fn is_authenticated(&self) -> Result<bool, StoreError> {
        credentials::is_authenticated(&self.store, &self.keys).await
    }

    /// Log in and store both credentials.
    pub async fn login(&self, email: &str, password: &Secret) -> Result<TokenPair, LoginError> {
        login::login(
            &self.transport,
            &self.destination,
            &self.store,
            &self.keys,
            &self.set_options,
            email,
            password,
        )
        .await
    }

    /// Exchange the stored refresh credential for a new access credential.
    pub async fn refresh(&self) -> Result<AccessGrant, RefreshError> {
        refresh::refresh(
            |variables| refresh::request_access_grant(&self.transport, &self.destination, variables),
            &self.store,
            &self.keys,
            &self.set_options,
        )
        .await
    }

    /// Clear both credentials and run the redirect hook.
    pub async fn logout(&self) -> Result<(), StoreError> {
        logout::logout(&self.store, &self.keys, || (self.on_redirect)()).await
    }

    /// Send an authenticated request, refreshing once on an authentication failure.
    pub async fn request(&self, request: &GraphQLRequest) -> Result<Option<Value>, RequestError> {
        auth::send(&self.transport, &self.destination, request, &self.hooks()).await
    }

    /// Like [`request`](Self::request), decoding `data` into `R`.
    pub async fn request_as<R>(&self, request: &GraphQLRequest) -> Result<R, RequestError>
    where
        R: DeserializeOwned,
    {
        auth::send_as(&self.transport, &self.destination, request, &self.hooks()).await
    }

    fn hooks(&self) -> AuthHooks<'_> {
        let this = self;
        AuthHooks::new()
            .with_auth_header(move || this.auth_headers())
            .with_unauthorized(move || this.recover())
            .with_invalid_tokens(move || this.invalidate())
    }

    async fn auth_headers(&self) -> Headers {
        match credentials::bearer_headers(&self.store, &self.keys).await {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Could not read access token, sending unauthenticated: {}", e);
                Headers::new()
            }
        }
    }

    async fn recover(&self) -> anyhow::Result<()> {
        match &self.gate {
            Some(gate) => gate
                .run(|| async { self.refresh().await.map(|_| ()) })
                .await
                .map_err(anyhow::Error::from),
            None => {
                self.refresh().await?;
                Ok(())
            }
        }
    }

    async fn invalidate(&self) {
        if let Err(e) = self.logout().await {
            warn!("Logout after failed refresh did not complete: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::envelope::{Envelope, GraphQLError};
    use crate::store::MemoryStore;
    use crate::transport::{TransportError, TransportRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers refresh mutations from `refresh_reply` and every other request
    /// according to the bearer token it carries.
    struct FakeApi {
        valid_access: &'static str,
        refresh_reply: Value,
        refresh_calls: AtomicUsize,
        log: Mutex<Vec<Option<String>>>,
    }

    impl FakeApi {
        fn new(valid_access: &'static str, refresh_reply: Value) -> Self {
            Self {
                valid_access,
                refresh_reply,
                refresh_calls: AtomicUsize::new(0),
                log: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RequestTransport for FakeApi {
        async fn send(
            &self,
            _destination: &Url,
            request: TransportRequest,
        ) -> Result<Envelope, TransportError> {
            if request.body.contains("RefreshToken") {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                return Ok(serde_json::from_value(self.refresh_reply.clone()).unwrap());
            }

            let auth = request.headers.get("Authorization").cloned();
            self.log.lock().push(auth.clone());
            match auth {
                Some(value) if value == format!("Bearer {}", self.valid_access) => {
                    Ok(Envelope::data(json!({"me": {"id": "1"}})))
                }
                Some(_) => Ok(Envelope::errors(vec![GraphQLError::new("Invalid token")])),
                None => Ok(Envelope::errors(vec![GraphQLError::new(
                    "Authentication token required",
                )])),
            }
        }
    }

    fn granting(access: &str) -> Value {
        json!({"data": {"refreshToken": {"__typename": "AccessToken", "accessToken": access, "tokenType": "Bearer"}}})
    }

    fn destination() -> Url {
        Url::parse("http://localhost:4000/graphql").unwrap()
    }

    #[tokio::test]
    async fn test_expired_access_is_refreshed_transparently() {
        let api = FakeApi::new("fresh", granting("fresh"));
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "R")]);
        let session = Session::new(api, destination(), store);

        let data = session
            .request(&GraphQLRequest::new("{ me { id } }"))
            .await
            .unwrap();

        assert_eq!(data, Some(json!({"me": {"id": "1"}})));
        assert_eq!(
            session.store().get(ACCESS_TOKEN_KEY).await.unwrap().unwrap().expose(),
            "fresh"
        );
        assert_eq!(
            *session.transport.log.lock(),
            vec![Some("Bearer stale".to_string()), Some("Bearer fresh".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_refresh_token_logs_out_and_redirects() {
        let api = FakeApi::new("fresh", granting("fresh"));
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "stale")]);
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = redirects.clone();
        let session = Session::new(api, destination(), store).on_redirect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = session
            .request(&GraphQLRequest::new("{ me { id } }"))
            .await
            .unwrap_err();

        // The retry ran without credentials after the logout.
        assert_eq!(err.auth_failure(), Some(crate::graphql::AuthFailure::TokenRequired));
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated().await.unwrap());
        assert_eq!(session.transport.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uncoordinated_sessions_refresh_per_request() {
        let api = FakeApi::new("fresh", granting("fresh"));
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "R")]);
        let session = Session::new(api, destination(), store);
        let request = GraphQLRequest::new("{ me { id } }");

        let (a, b) = tokio::join!(session.request(&request), session.request(&request));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(session.transport.refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_flight_sessions_share_refresh() {
        let api = FakeApi::new("fresh", granting("fresh"));
        let store = MemoryStore::with_values([(ACCESS_TOKEN_KEY, "stale"), (REFRESH_TOKEN_KEY, "R")]);
        let options = SessionOptions {
            single_flight_refresh: true,
            ..SessionOptions::default()
        };
        let session = Session::with_options(api, destination(), store, options);
        let request = GraphQLRequest::new("{ me { id } }");

        let (a, b) = tokio::join!(session.request(&request), session.request(&request));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(session.transport.refresh_calls.load(Ordering::SeqCst), 1);
    }
}

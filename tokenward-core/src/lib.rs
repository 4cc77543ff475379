//! # Tokenward Core
//!
//! Authenticated GraphQL request pipeline.
//!
//! This crate provides:
//! - A credential store abstraction with in-memory, file jar, per-request
//!   cookie jar and (optionally) OS keyring backends
//! - A GraphQL request layer that classifies `errors` payloads
//! - An authenticated layer that recovers once from an expired credential
//! - Refresh, login and logout procedures
//! - A [`Session`] facade wiring all of the above together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokenward_core::{GraphQLRequest, MemoryStore, ReqwestTransport, Session};
//!
//! async fn me(session: &Session<ReqwestTransport, MemoryStore>) -> Result<(), tokenward_core::TokenwardError> {
//!     let data = session.request(&GraphQLRequest::new("{ me { email } }")).await?;
//!     println!("{:?}", data);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod graphql;
pub mod login;
pub mod logout;
pub mod mutation;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transport;

// Re-export commonly used types at crate root
pub use auth::AuthHooks;

pub use credentials::{
    AccessGrant,
    CredentialKeys,
    CredentialPair,
    TokenPair,
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};

pub use envelope::{Envelope, GraphQLError, PathSegment};

pub use error::TokenwardError;

pub use gate::RefreshGate;

pub use graphql::{
    AuthFailure,
    ClassifiedError,
    GraphQLRequest,
    RequestError,
};

pub use login::LoginError;

pub use mutation::{MutationResult, Problem};

pub use refresh::{RefreshError, RefreshVariables};

pub use session::{Session, SessionOptions};

pub use store::{
    CredentialStore,
    FileJarStore,
    MemoryStore,
    RequestJarStore,
    Secret,
    SetOptions,
    StoreError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use transport::{
    Headers,
    ReqwestTransport,
    RequestTransport,
    TransportError,
};

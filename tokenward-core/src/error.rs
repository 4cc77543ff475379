//! Top-level error types for Tokenward.

use thiserror::Error;

use crate::graphql::RequestError;
use crate::login::LoginError;
use crate::refresh::RefreshError;
use crate::store::StoreError;
use crate::transport::TransportError;

/// Top-level error type encompassing all Tokenward errors.
#[derive(Debug, Error)]
pub enum TokenwardError {
    /// Error from credential storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the HTTP transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error from a GraphQL request.
    #[error("request error: {0}")]
    Request(#[from] RequestError),

    /// Error from a credential refresh.
    #[error("refresh error: {0}")]
    Refresh(#[from] RefreshError),

    /// Error from a login.
    #[error("login error: {0}")]
    Login(#[from] LoginError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

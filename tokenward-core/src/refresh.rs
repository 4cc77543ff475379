//! Access credential refresh.
//!
//! [`refresh`] reads the refresh credential, asks the remote service for a
//! new access credential through a caller-supplied request function, and
//! writes the result back. [`request_access_grant`] is the standard request
//! function: a plain GraphQL `refreshToken` mutation sent without
//! authentication headers, so a refresh can never recurse into the
//! authenticated layer.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::credentials::{AccessGrant, CredentialKeys};
use crate::graphql::{self, GraphQLRequest, RequestError};
use crate::mutation::{self, MutationResult, Problem};
use crate::store::{CredentialStore, SetOptions, StoreError};
use crate::transport::RequestTransport;

/// Mutation exchanging a refresh credential for a new access credential.
pub const REFRESH_TOKEN_MUTATION: &str = r#"mutation RefreshToken($token: String!) {
  refreshToken(token: $token) {
    __typename
    ... on AccessToken {
      accessToken
      tokenType
    }
    ... on RefreshTokenFailure {
      problems {
        __typename
        ... on InvalidRefreshTokenProblem {
          message
        }
      }
    }
  }
}"#;

/// Error type for refresh operations.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No refresh credential is stored; the caller was never authenticated.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The refresh request itself failed.
    #[error("refresh request failed: {0}")]
    Request(#[from] RequestError),

    /// The service declined to mint a new access credential.
    #[error("refresh rejected: {}", mutation::describe(.0))]
    Rejected(Vec<Problem>),

    /// Reading or writing the store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Variables of [`REFRESH_TOKEN_MUTATION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshVariables {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenData {
    refresh_token: MutationResult<AccessGrant>,
}

/// Exchange the stored refresh credential for a new access credential.
///
/// Fails with [`RefreshError::MissingRefreshToken`] before calling
/// `on_request` when no refresh credential is stored. On success the new
/// access credential is written, then the unchanged refresh credential is
/// written again to extend its expiration horizon.
pub async fn refresh<S, F, Fut>(
    on_request: F,
    store: &S,
    keys: &CredentialKeys,
    options: &SetOptions,
) -> Result<AccessGrant, RefreshError>
where
    S: CredentialStore + ?Sized,
    F: FnOnce(RefreshVariables) -> Fut,
    Fut: Future<Output = Result<AccessGrant, RefreshError>>,
{
    let refresh_token = store
        .get(&keys.refresh)
        .await?
        .ok_or(RefreshError::MissingRefreshToken)?;

    debug!("Exchanging refresh token for a new access token");
    let grant = on_request(RefreshVariables {
        token: refresh_token.expose().to_string(),
    })
    .await?;

    store.set(&keys.access, &grant.access_token, options).await?;
    store.set(&keys.refresh, &refresh_token, options).await?;

    info!("Refreshed access token");
    Ok(grant)
}

/// Send the `refreshToken` mutation without authentication headers.
pub async fn request_access_grant<T>(
    transport: &T,
    destination: &Url,
    variables: RefreshVariables,
) -> Result<AccessGrant, RefreshError>
where
    T: RequestTransport + ?Sized,
{
    let request = GraphQLRequest::new(REFRESH_TOKEN_MUTATION).with_variables(&variables)?;
    let data: RefreshTokenData = graphql::send_as(transport, destination, &request).await?;

    data.refresh_token.into_result().map_err(RefreshError::Rejected)
}

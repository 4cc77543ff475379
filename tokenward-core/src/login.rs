//! Credential creation through the `login` mutation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::credentials::{self, CredentialKeys, TokenPair};
use crate::graphql::{self, GraphQLRequest, RequestError};
use crate::mutation::{self, MutationResult, Problem};
use crate::store::{CredentialStore, Secret, SetOptions, StoreError};
use crate::transport::RequestTransport;

/// Mutation exchanging an email and password for both credentials.
pub const LOGIN_MUTATION: &str = r#"mutation Login($email: String!, $password: String!) {
  login(email: $email, password: $password) {
    __typename
    ... on TokenPair {
      accessToken
      refreshToken
      tokenType
    }
    ... on LoginFailure {
      problems {
        __typename
        ... on WrongCredentialsProblem {
          message
        }
        ... on InvalidInputProblem {
          message
          path
        }
      }
    }
  }
}"#;

/// Error type for login.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The login request failed.
    #[error("login request failed: {0}")]
    Request(#[from] RequestError),

    /// The service refused the credentials.
    #[error("login rejected: {}", mutation::describe(.0))]
    Rejected(Vec<Problem>),

    /// Writing the new credentials failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct LoginVariables<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginData {
    login: MutationResult<TokenPair>,
}

/// Log in with `email` and `password` and store both returned credentials.
///
/// The request is sent without authentication headers.
pub async fn login<T, S>(
    transport: &T,
    destination: &Url,
    store: &S,
    keys: &CredentialKeys,
    options: &SetOptions,
    email: &str,
    password: &Secret,
) -> Result<TokenPair, LoginError>
where
    T: RequestTransport + ?Sized,
    S: CredentialStore + ?Sized,
{
    let request = GraphQLRequest::new(LOGIN_MUTATION).with_variables(&LoginVariables {
        email,
        password: password.expose(),
    })?;
    let data: LoginData = graphql::send_as(transport, destination, &request).await?;
    let pair = data.login.into_result().map_err(LoginError::Rejected)?;

    credentials::store_pair(store, keys, &pair, options).await?;

    info!("Logged in as {}", email);
    Ok(pair)
}

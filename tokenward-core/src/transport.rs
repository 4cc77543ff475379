//! Single-call request transport.
//!
//! A [`RequestTransport`] sends one request and parses the response body as
//! an [`Envelope`]. It performs no retries and does not look inside the
//! envelope; every failure it reports is a [`TransportError`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::envelope::Envelope;

pub use reqwest::Method;

/// Flat header mapping sent with a request.
pub type Headers = BTreeMap<String, String>;

/// Default transport timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error type for transport-level failures.
///
/// These never trigger credential recovery.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be built or the endpoint could not be reached.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not a JSON envelope.
    #[error("invalid response body (HTTP {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

/// A request ready to be put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub body: String,
    pub headers: Headers,
}

/// Abstraction over the network call beneath the GraphQL layer.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    /// Send `request` to `destination` and parse the response envelope.
    async fn send(
        &self,
        destination: &Url,
        request: TransportRequest,
    ) -> Result<Envelope, TransportError>;
}

/// [`RequestTransport`] over a pooled `reqwest` client.
///
/// Clone is cheap; the underlying client shares its connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestTransport for ReqwestTransport {
    async fn send(
        &self,
        destination: &Url,
        request: TransportRequest,
    ) -> Result<Envelope, TransportError> {
        let mut builder = self.client.request(request.method, destination.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        tracing::trace!("{} responded with HTTP {}", destination, status);

        // GraphQL servers may report errors with a non-2xx status, so the
        // body is parsed regardless of status.
        serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
            status: status.as_u16(),
            source,
        })
    }
}

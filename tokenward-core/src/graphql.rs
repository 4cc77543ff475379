//! GraphQL request layer.
//!
//! [`send`] serializes a query document and its variables, merges the
//! default `Content-Type` with the caller's headers, hands the request to a
//! [`RequestTransport`], and turns an envelope carrying `errors` into a
//! [`ClassifiedError`].

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::envelope::GraphQLError;
use crate::transport::{Headers, Method, RequestTransport, TransportError, TransportRequest};

/// Header name of the default content type.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Default content type for GraphQL requests.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Remote message meaning no credential was attached.
pub const TOKEN_REQUIRED_MESSAGE: &str = "Authentication token required";

/// Remote message meaning the attached credential was rejected.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

/// The kind of authentication failure reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailure {
    TokenRequired,
    InvalidToken,
}

impl AuthFailure {
    /// Match a remote error message against the known sentinels.
    ///
    /// Matching is exact and case-sensitive.
    pub fn from_message(message: &str) -> Option<Self> {
        match message {
            TOKEN_REQUIRED_MESSAGE => Some(Self::TokenRequired),
            INVALID_TOKEN_MESSAGE => Some(Self::InvalidToken),
            _ => None,
        }
    }

    /// The sentinel message for this failure.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenRequired => TOKEN_REQUIRED_MESSAGE,
            Self::InvalidToken => INVALID_TOKEN_MESSAGE,
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured reason code of a [`ClassifiedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// At least one entry matched an authentication sentinel.
    Authentication(AuthFailure),
    /// None of the entries are authentication-class.
    Other,
}

/// An envelope that came back with a non-empty `errors` array.
///
/// The full array is kept so callers can inspect every reported problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    errors: Vec<GraphQLError>,
}

impl ClassifiedError {
    pub fn new(errors: Vec<GraphQLError>) -> Self {
        Self { errors }
    }

    /// The remote-reported errors, in order.
    pub fn errors(&self) -> &[GraphQLError] {
        &self.errors
    }

    /// Consume the error and return the remote-reported errors.
    pub fn into_errors(self) -> Vec<GraphQLError> {
        self.errors
    }

    /// Iterate over the error messages.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.message.as_str())
    }

    /// Classify the error: authentication-class if any message is a sentinel.
    pub fn reason(&self) -> ErrorReason {
        self.messages()
            .find_map(AuthFailure::from_message)
            .map(ErrorReason::Authentication)
            .unwrap_or(ErrorReason::Other)
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed: ")?;
        for (i, message) in self.messages().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

/// Error type for GraphQL requests.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The transport failed below the GraphQL layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint answered with an `errors` array.
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// Variables could not be encoded or `data` did not match the expected shape.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl RequestError {
    /// The authentication failure carried by this error, if any.
    ///
    /// Transport and payload errors are never authentication-class.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Classified(e) => match e.reason() {
                ErrorReason::Authentication(failure) => Some(failure),
                ErrorReason::Other => None,
            },
            _ => None,
        }
    }

    /// The classified payload, if the endpoint reported errors.
    pub fn as_classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Classified(e) => Some(e),
            _ => None,
        }
    }
}

/// A query or mutation document with its variables and extra headers.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLRequest {
    pub query: String,
    pub variables: Option<Value>,
    pub headers: Headers,
}

impl GraphQLRequest {
    /// A request for `query` with no variables and no extra headers.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            headers: Headers::new(),
        }
    }

    /// Attach variables, encoding them to JSON.
    pub fn with_variables<V: Serialize>(mut self, variables: &V) -> Result<Self, RequestError> {
        self.variables = Some(serde_json::to_value(variables)?);
        Ok(self)
    }

    /// Attach already encoded variables.
    pub fn with_variables_value(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Add a header sent with this request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

/// Overlay `overrides` on `base`. Header names collide case-insensitively;
/// the override's name and value replace the base entry.
pub fn merge_headers(base: &Headers, overrides: &Headers) -> Headers {
    let mut merged: Headers = base
        .iter()
        .filter(|(name, _)| !overrides.keys().any(|o| o.eq_ignore_ascii_case(name)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

fn default_headers() -> Headers {
    Headers::from([(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string())])
}

/// Send `request` and return the envelope's `data`.
///
/// An envelope with neither `data` nor `errors` yields `Ok(None)`.
pub async fn send<T>(
    transport: &T,
    destination: &Url,
    request: &GraphQLRequest,
) -> Result<Option<Value>, RequestError>
where
    T: RequestTransport + ?Sized,
{
    let body = serde_json::to_string(&RequestBody {
        query: &request.query,
        variables: request.variables.as_ref(),
    })?;

    let outgoing = TransportRequest {
        method: Method::POST,
        body,
        headers: merge_headers(&default_headers(), &request.headers),
    };

    let envelope = transport.send(destination, outgoing).await?;
    envelope
        .into_result()
        .map_err(|errors| ClassifiedError::new(errors).into())
}

/// Like [`send`], decoding `data` into `R`.
///
/// Absent `data` decodes from JSON `null`, so `R` should be an `Option` when
/// an empty result is acceptable.
pub async fn send_as<T, R>(
    transport: &T,
    destination: &Url,
    request: &GraphQLRequest,
) -> Result<R, RequestError>
where
    T: RequestTransport + ?Sized,
    R: DeserializeOwned,
{
    let data = send(transport, destination, request).await?;
    Ok(serde_json::from_value(data.unwrap_or(Value::Null))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    /// Records every outgoing request and replies with a fixed envelope.
    struct RecordingTransport {
        reply: Envelope,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl RecordingTransport {
        fn replying(reply: Envelope) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> TransportRequest {
            self.seen.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RequestTransport for RecordingTransport {
        async fn send(
            &self,
            _destination: &Url,
            request: TransportRequest,
        ) -> Result<Envelope, TransportError> {
            self.seen.lock().push(request);
            Ok(self.reply.clone())
        }
    }

    fn destination() -> Url {
        Url::parse("http://localhost:4000/graphql").unwrap()
    }

    #[tokio::test]
    async fn test_default_content_type_merged_with_caller_headers() {
        let transport = RecordingTransport::replying(Envelope::data(json!({})));
        let request = GraphQLRequest::new("{ me { id } }").with_header("Test", "Header");

        send(&transport, &destination(), &request).await.unwrap();

        let expected = Headers::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Test".to_string(), "Header".to_string()),
        ]);
        assert_eq!(transport.last().headers, expected);
        assert_eq!(transport.last().method, Method::POST);
    }

    #[tokio::test]
    async fn test_caller_content_type_wins() {
        let transport = RecordingTransport::replying(Envelope::data(json!({})));
        let request = GraphQLRequest::new("{ me { id } }")
            .with_header("content-type", "application/graphql+json");

        send(&transport, &destination(), &request).await.unwrap();

        let expected = Headers::from([(
            "content-type".to_string(),
            "application/graphql+json".to_string(),
        )]);
        assert_eq!(transport.last().headers, expected);
    }

    #[tokio::test]
    async fn test_body_carries_query_and_variables() {
        let transport = RecordingTransport::replying(Envelope::data(json!({})));
        let request = GraphQLRequest::new("query Me($id: ID!) { user(id: $id) { email } }")
            .with_variables(&json!({"id": "42"}))
            .unwrap();

        send(&transport, &destination(), &request).await.unwrap();

        let body: Value = serde_json::from_str(&transport.last().body).unwrap();
        assert_eq!(
            body,
            json!({
                "query": "query Me($id: ID!) { user(id: $id) { email } }",
                "variables": {"id": "42"}
            })
        );
    }

    #[tokio::test]
    async fn test_returns_data() {
        let transport = RecordingTransport::replying(Envelope::data(json!({"me": {"id": "1"}})));

        let data = send(&transport, &destination(), &GraphQLRequest::new("{ me { id } }"))
            .await
            .unwrap();

        assert_eq!(data, Some(json!({"me": {"id": "1"}})));
    }

    #[tokio::test]
    async fn test_empty_envelope_yields_none() {
        let transport = RecordingTransport::replying(Envelope::default());

        let data = send(&transport, &destination(), &GraphQLRequest::new("{ me { id } }"))
            .await
            .unwrap();

        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_errors_raise_classified_error_with_payload() {
        let errors = vec![
            GraphQLError::new("Error").at_path(["createUser"]),
            GraphQLError::new("Another"),
        ];
        let transport = RecordingTransport::replying(Envelope::errors(errors.clone()));

        let err = send(&transport, &destination(), &GraphQLRequest::new("mutation { x }"))
            .await
            .unwrap_err();

        let classified = err.as_classified().unwrap();
        assert_eq!(classified.errors(), errors.as_slice());
        assert_eq!(classified.reason(), ErrorReason::Other);
        assert_eq!(err.to_string(), "request failed: Error; Another");
    }

    #[tokio::test]
    async fn test_send_as_decodes_data() {
        #[derive(Deserialize)]
        struct Me {
            me: User,
        }
        #[derive(Deserialize)]
        struct User {
            email: String,
        }

        let transport =
            RecordingTransport::replying(Envelope::data(json!({"me": {"email": "a@b.c"}})));

        let me: Me = send_as(&transport, &destination(), &GraphQLRequest::new("{ me { email } }"))
            .await
            .unwrap();

        assert_eq!(me.me.email, "a@b.c");
    }

    #[test]
    fn test_reason_detects_any_sentinel() {
        let error = ClassifiedError::new(vec![
            GraphQLError::new("Something else"),
            GraphQLError::new("Invalid token"),
        ]);
        assert_eq!(
            error.reason(),
            ErrorReason::Authentication(AuthFailure::InvalidToken)
        );

        let required = ClassifiedError::new(vec![GraphQLError::new("Authentication token required")]);
        assert_eq!(
            required.reason(),
            ErrorReason::Authentication(AuthFailure::TokenRequired)
        );
    }

    #[test]
    fn test_sentinels_are_case_sensitive() {
        assert_eq!(AuthFailure::from_message("invalid token"), None);
        assert_eq!(AuthFailure::from_message("Invalid token "), None);
    }

    #[test]
    fn test_transport_errors_are_never_auth_class() {
        let decode = serde_json::from_str::<Value>("<html>").unwrap_err();
        let err = RequestError::from(TransportError::Decode {
            status: 502,
            source: decode,
        });
        assert_eq!(err.auth_failure(), None);
    }
}

//! GraphQL transport
//!
//! Issues a single authenticated POST to the Cycle GraphQL endpoint and hands
//! back the parsed JSON body. Retrying is layered on top by
//! [`super::retry::with_retry`]; this module never retries on its own.

use crate::config::AutotagConfig;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A failed request: non-200 status, network failure, or an unreadable body
#[derive(Debug, Clone, Error)]
#[error("{}", describe(.status, .cause))]
pub struct TransportError {
    /// HTTP status, when the server answered at all
    pub status: Option<u16>,
    pub cause: String,
}

fn describe(status: &Option<u16>, cause: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, cause),
        None => cause.to_string(),
    }
}

impl TransportError {
    /// Error for a response with a non-200 status
    pub fn status(code: u16, cause: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            cause: cause.into(),
        }
    }

    /// Error for a failure below HTTP (connect, timeout, decode)
    pub fn network(cause: impl Into<String>) -> Self {
        Self {
            status: None,
            cause: cause.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            cause: err.to_string(),
        }
    }
}

/// Something that can execute a GraphQL document and return the raw JSON body
#[async_trait]
pub trait GraphQLTransport: Send + Sync {
    /// Endpoint URL, used in retry diagnostics
    fn endpoint(&self) -> &str;

    /// Execute one request. No retries.
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError>;
}

/// What to send as `Authorization` when no token is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingTokenAuth {
    /// Send `Authorization:` with an empty value
    EmptyHeader,
    /// Leave the header off
    Omit,
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
    missing_token: MissingTokenAuth,
}

impl HttpTransport {
    /// Create a transport for `endpoint`
    ///
    /// `timeout` bounds each request; `None` leaves requests unbounded.
    /// Without a token the request carries an empty `Authorization` header.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> crate::Result<Self> {
        let mut builder = Client::builder().default_headers({
            let mut headers = header::HeaderMap::new();
            headers.insert(
                header::USER_AGENT,
                header::HeaderValue::from_static("cycle-autotag/0.1"),
            );
            headers
        });
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            auth_token: None,
            missing_token: MissingTokenAuth::EmptyHeader,
        })
    }

    /// Build from configuration, picking up the token from the environment
    pub fn from_config(config: &AutotagConfig) -> crate::Result<Self> {
        let mut transport = Self::new(config.endpoint.clone(), config.request_timeout())?;
        transport.auth_token = config.api_token();
        transport.missing_token = if config.send_empty_authorization {
            MissingTokenAuth::EmptyHeader
        } else {
            MissingTokenAuth::Omit
        };
        Ok(transport)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn with_missing_token_auth(mut self, mode: MissingTokenAuth) -> Self {
        self.missing_token = mode;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }
}

#[async_trait]
impl GraphQLTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        match (&self.auth_token, self.missing_token) {
            (Some(token), _) => request = request.bearer_auth(token),
            (None, MissingTokenAuth::EmptyHeader) => {
                request = request.header(header::AUTHORIZATION, "")
            }
            (None, MissingTokenAuth::Omit) => {}
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let json: Value = response
                    .json()
                    .await
                    .map_err(|e| TransportError::network(format!("invalid JSON body: {}", e)))?;
                debug!(endpoint = %self.endpoint, "GraphQL request succeeded");
                Ok(json)
            }
            status => {
                let error_body = response.text().await.unwrap_or_default();
                Err(TransportError::status(status.as_u16(), error_body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::status(502, "bad gateway").to_string(),
            "HTTP 502: bad gateway"
        );
        assert_eq!(
            TransportError::network("connection refused").to_string(),
            "connection refused"
        );
    }

    #[test]
    fn test_empty_token_is_unauthenticated() {
        let transport = HttpTransport::new("http://localhost/graphql", None)
            .expect("Failed to create transport")
            .with_token("");
        assert!(!transport.is_authenticated());

        let transport = transport.with_token("secret");
        assert!(transport.is_authenticated());
        assert_eq!(transport.endpoint(), "http://localhost/graphql");
    }
}

//! HTTP transport seam.
//!
//! [`DirectoryClient`](crate::DirectoryClient) decides what to request and how
//! to interpret the answer; a [`Transport`] only moves bytes. Transport
//! failures that happen before a response exists are classified here because
//! only the transport can tell a refused connection from a timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER, USER_AGENT};

use crate::DirectoryError;

/// A GET request to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Client identification string.
    pub user_agent: String,
}

impl HttpRequest {
    /// Value of the first query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

/// A response with any status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Retry-After` header, if present.
    pub retry_after: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 200 response with `body`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, retry_after: None, body: body.into() }
    }

    /// Response with an arbitrary status and body.
    pub fn with_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, retry_after: None, body: body.into() }
    }

    /// Same response carrying a `Retry-After` header.
    #[must_use]
    pub fn retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes directory requests.
///
/// Implementations must be safe to call concurrently. Any status code is a
/// successful exchange; `Err` is reserved for failures before a complete
/// response was read.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform one GET.
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, DirectoryError>;
}

/// Production transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            DirectoryError::network(format!("failed to build HTTP client: {e}")).with_source(e)
        })?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, DirectoryError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .header(USER_AGENT, &request.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DirectoryError::deadline_exceeded(format!("timed out reading response body: {e}"))
                    .with_status(status)
                    .with_source(e)
            } else {
                DirectoryError::invalid_response(format!("failed to read response body: {e}"))
                    .with_status(status)
                    .with_source(e)
            }
        })?;

        Ok(HttpResponse { status, retry_after, body: body.to_vec() })
    }
}

fn classify_send_error(err: reqwest::Error) -> DirectoryError {
    if err.is_timeout() {
        DirectoryError::deadline_exceeded(format!("request timed out: {err}")).with_source(err)
    } else if err.is_connect() {
        DirectoryError::network(format!("connection failed: {err}")).with_source(err)
    } else if err.is_builder() {
        DirectoryError::invalid_input(format!("invalid request: {err}")).with_source(err)
    } else {
        DirectoryError::network(format!("transport error: {err}")).with_source(err)
    }
}

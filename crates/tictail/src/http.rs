//! HTTP transport seam
//!
//! [`TictailClient`](crate::TictailClient) never talks to reqwest directly.
//! It hands an [`HttpRequest`] to an [`HttpTransport`] and interprets the
//! [`HttpResponse`] itself, so tests can substitute an in-memory transport.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::{ApiClientError, Result, TransportErrorKind};

/// Content type of form-encoded request bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Form-encoded body, if any
    pub body: Option<String>,
}

impl HttpRequest {
    /// Create a request without headers or body
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: HeaderMap::new(), body: None }
    }

    /// Attach a header
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a form-encoded body and matching content type
    #[must_use]
    pub fn form_body(mut self, body: String) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        self.body = Some(body);
        self
    }
}

/// Response as received from the transport
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with no headers
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }
}

/// Trait for issuing HTTP requests
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status, and `ApiClientError::Transport` when no response was received.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and collect the full response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Default transport backed by reqwest with rustls
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Build a transport with the timeouts, redirect limit, user agent and
    /// TLS settings from `config`
    ///
    /// # Errors
    /// Returns `ApiClientError::Configuration` if the reqwest client cannot be
    /// built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone());

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the Tictail client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            ApiClientError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest { method, url, headers, body } = request;
        debug!(%method, %url, "sending HTTP request");

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            transport_error(&err)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|err| transport_error(&err))?;

        debug!(%method, %url, %status, bytes = body.len(), "received HTTP response");
        Ok(HttpResponse { status, headers, body: body.to_vec() })
    }
}

fn transport_error(err: &reqwest::Error) -> ApiClientError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_redirect() {
        TransportErrorKind::Redirect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else if err.is_request() || err.is_builder() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };

    ApiClientError::Transport { kind, message: err.to_string() }
}

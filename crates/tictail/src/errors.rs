//! Client error types
//!
//! Every fallible operation returns [`ApiClientError`]. The variants separate
//! caller mistakes (configuration), failures to complete the HTTP exchange
//! (transport) and responses the platform rejected (API).

use std::fmt;

use thiserror::Error;

/// Message used when a rejected response carries no usable error text.
pub const REAUTHORIZE_MESSAGE: &str = "Reauthorize the user!";

/// Categories of client errors for caller-side retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Missing credentials or invalid settings - non-retryable
    Config,
    /// Connection, TLS or timeout failures - retryable with backoff
    Network,
    /// Token rejected - restart the OAuth flow
    Authentication,
    /// Request rejected by the platform - non-retryable as is
    Request,
    /// Unexpected response payload - non-retryable
    Decode,
}

/// Why a rejected response failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No structured error body; the access token is stale or missing
    OutdatedCredentials,
    /// The body carried a `message` or `error` field
    RequestError,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutdatedCredentials => write!(f, "outdated credentials"),
            Self::RequestError => write!(f, "request error"),
        }
    }
}

/// Transport failure classification, derived from the underlying HTTP error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established (DNS, refused, TLS handshake)
    Connect,
    /// Connect or total timeout elapsed
    Timeout,
    /// Redirect limit exceeded or redirect loop
    Redirect,
    /// Failed while reading the response body
    Body,
    /// Request could not be built or sent
    Request,
    /// Anything the transport could not classify
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Redirect => "redirect",
            Self::Body => "body",
            Self::Request => "request",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Client operation errors
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {message} (Code: {kind})")]
    Transport { kind: TransportErrorKind, message: String },

    #[error("{message}")]
    Api { kind: ApiErrorKind, status: Option<u16>, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiClientError {
    /// Error returned when no usable access token is available.
    pub(crate) fn reauthorize(status: Option<u16>) -> Self {
        Self::Api {
            kind: ApiErrorKind::OutdatedCredentials,
            status,
            message: REAUTHORIZE_MESSAGE.to_string(),
        }
    }

    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Configuration(_) => ApiErrorCategory::Config,
            Self::Transport { .. } => ApiErrorCategory::Network,
            Self::Api { kind: ApiErrorKind::OutdatedCredentials, .. } => {
                ApiErrorCategory::Authentication
            }
            Self::Api { kind: ApiErrorKind::RequestError, .. } => ApiErrorCategory::Request,
            Self::Decode(_) => ApiErrorCategory::Decode,
        }
    }

    /// Check if the caller may retry the same operation unchanged
    #[must_use]
    pub fn should_retry(&self) -> bool {
        self.category() == ApiErrorCategory::Network
    }

    /// Check if the caller should send the user through the OAuth flow again
    #[must_use]
    pub fn requires_reauthorization(&self) -> bool {
        self.category() == ApiErrorCategory::Authentication
    }

    /// HTTP status of a rejected response, if one was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiClientError>;

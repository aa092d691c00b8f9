//! Credential, token and store types
//!
//! Data exchanged with the Tictail OAuth endpoints and held by
//! [`TictailClient`](crate::TictailClient) between calls.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ApiClientError, Result};

/// Decoded JSON object returned by a successful API call
pub type ApiResponse = Map<String, Value>;

/// Ordered key/value pairs sent as a query string or form body
pub type Params<'a> = &'a [(&'a str, &'a str)];

/// OAuth application credentials issued by Tictail
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application client id
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
}

impl Credentials {
    /// Create a new credential pair
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), client_secret: client_secret.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Cached access token and the authorization code it was obtained with
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
    /// Bearer token attached to API calls
    pub access_token: String,

    /// Absolute expiration timestamp (UTC); `None` never expires
    pub expires_at: Option<DateTime<Utc>>,

    /// Authorization code used for the exchange, if the token came from one
    pub code: Option<String>,
}

impl TokenState {
    /// Build the state from a token exchange response
    ///
    /// Zero or negative lifetimes yield an already expired token.
    ///
    /// # Errors
    /// Returns `ApiClientError::Decode` if `expires_in` does not fit in a
    /// timestamp.
    pub fn from_exchange(access_token: String, expires_in: i64, code: &str) -> Result<Self> {
        let expires_at = TimeDelta::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                ApiClientError::Decode(format!("expires_in out of range: {expires_in}"))
            })?;

        Ok(Self { access_token, expires_at: Some(expires_at), code: Some(code.to_string()) })
    }

    /// Check if the expiry has been reached
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
    }

    /// Check whether this token can be reused for `code`
    #[must_use]
    pub fn is_valid_for(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code) && !self.is_expired()
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("code", &self.code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Store returned alongside the access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Store identifier
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Remaining platform-defined fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoreInfo {
    /// Look up a platform-defined field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for API calls
    pub access_token: String,
    /// Token lifetime in seconds, sent as a number or a numeric string
    #[serde(deserialize_with = "integer_or_numeric_string")]
    pub expires_in: i64,
    /// Store the token grants access to
    pub store: StoreInfo,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

fn integer_or_numeric_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(seconds) => Ok(seconds),
        Seconds::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid expires_in value: {text:?}"))),
    }
}

//! Client configuration
//!
//! [`ClientConfig`] holds the endpoints and transport settings. It can be
//! built in code (every field has a default) or loaded from a TOML or JSON
//! file, with the format detected by file extension:
//!
//! ```toml
//! api_base_url = "https://api.tictail.com"
//! timeout_secs = 10
//! missing_expiry = "never_expires"
//! ```
//!
//! Credentials are never read from configuration; the embedding application
//! passes them to [`TictailClient`](crate::TictailClient) directly.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ApiClientError, Result};

/// Default OAuth base (authorize and token endpoints live below it)
pub const DEFAULT_AUTH_BASE_URL: &str = "https://tictail.com/oauth";
/// Default REST API base
pub const DEFAULT_API_BASE_URL: &str = "https://api.tictail.com";

/// How to treat a token supplied without an expiry timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingExpiryPolicy {
    /// Expire immediately, so the next `authenticate` exchanges a new token
    #[default]
    AlreadyExpired,
    /// Keep the token until it is replaced
    NeverExpires,
}

impl MissingExpiryPolicy {
    /// Resolve the expiry for a token set without one
    #[must_use]
    pub fn expiry(self) -> Option<DateTime<Utc>> {
        match self {
            Self::AlreadyExpired => Some(Utc::now()),
            Self::NeverExpires => None,
        }
    }
}

/// Endpoints and transport settings for [`TictailClient`](crate::TictailClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// OAuth base URL, e.g. `https://tictail.com/oauth`
    pub auth_base_url: String,
    /// REST API base URL, e.g. `https://api.tictail.com`
    pub api_base_url: String,
    /// Connection establishment timeout
    #[serde(rename = "connect_timeout_secs", with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Total request timeout
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    /// Maximum redirects followed per request
    pub max_redirects: usize,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
    /// Skip TLS certificate and host verification. Never enable in production.
    pub accept_invalid_certs: bool,
    /// Expiry used when a token is supplied without one
    pub missing_expiry: MissingExpiryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            max_redirects: 3,
            user_agent: concat!("tictail-client/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
            missing_expiry: MissingExpiryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing both bases at one server, as used with mock
    /// servers in tests
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            auth_base_url: format!("{base}/oauth"),
            api_base_url: base.to_string(),
            ..Self::default()
        }
    }

    /// URL of the browser authorization page
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.auth_base_url.trim_end_matches('/'))
    }

    /// URL of the code-for-token exchange
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.auth_base_url.trim_end_matches('/'))
    }

    /// Check that both base URLs parse and timeouts are non-zero
    ///
    /// # Errors
    /// Returns `ApiClientError::Configuration` describing the first problem.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("auth_base_url", &self.auth_base_url), ("api_base_url", &self.api_base_url)]
        {
            Url::parse(value).map_err(|e| {
                ApiClientError::Configuration(format!("Invalid {name} '{value}': {e}"))
            })?;
        }

        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ApiClientError::Configuration("Timeouts must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Load configuration from a TOML or JSON file
    ///
    /// # Errors
    /// Returns `ApiClientError::Configuration` if the file is missing,
    /// unreadable, in an unsupported format, or fails validation.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ApiClientError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading client configuration from file");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApiClientError::Configuration(format!("Failed to read config file: {e}"))
        })?;

        let config = parse_config(&contents, path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Parse configuration from string content, format chosen by extension
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ApiClientError::Configuration(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ApiClientError::Configuration(format!("Invalid JSON format: {e}"))),
        _ => Err(ApiClientError::Configuration(format!(
            "Unsupported config format: {extension}"
        ))),
    }
}

/// Serialize a `Duration` as whole seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

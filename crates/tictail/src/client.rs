//! Tictail API client
//!
//! Exchanges authorization codes for access tokens, caches the token and the
//! store it belongs to, and performs authenticated calls against the REST API.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::form_urlencoded;
use url::Url;

use crate::config::ClientConfig;
use crate::errors::{ApiClientError, ApiErrorKind, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::types::{ApiResponse, Credentials, Params, StoreInfo, TokenResponse, TokenState};

/// OAuth client for the Tictail REST API
///
/// Holds the application credentials, the cached access token and the store
/// data returned by the last exchange. Methods that change that state take
/// `&mut self`; share a client between tasks behind a lock.
pub struct TictailClient {
    credentials: Credentials,
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    token: Option<TokenState>,
    store: Option<StoreInfo>,
}

impl TictailClient {
    /// Create a client with the default configuration
    ///
    /// A supplied `token` gets its expiry from
    /// [`ClientConfig::missing_expiry`]; use
    /// [`set_access_token`](Self::set_access_token) for precise control.
    ///
    /// # Errors
    /// Returns `ApiClientError::Configuration` if the HTTP transport cannot be
    /// built.
    ///
    /// # Examples
    /// ```
    /// use tictail_client::TictailClient;
    ///
    /// let client = TictailClient::new("client_id", "client_secret", None).unwrap();
    /// assert!(client.access_token().is_none());
    /// ```
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let mut builder = Self::builder().credentials(Credentials::new(client_id, client_secret));
        if let Some(token) = token {
            builder = builder.access_token(token, None);
        }
        builder.build()
    }

    /// Create a client with an explicit configuration and the reqwest
    /// transport
    ///
    /// # Errors
    /// Returns `ApiClientError::Configuration` if the configuration is invalid
    /// or the transport cannot be built.
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        Self::builder().credentials(credentials).config(config).build()
    }

    /// Create a builder for fluent configuration
    #[must_use]
    pub fn builder() -> TictailClientBuilder {
        TictailClientBuilder::default()
    }

    /// Exchange an authorization code for an access token
    ///
    /// The cached token is returned without a network call when it was
    /// obtained with the same `code` and has not expired. Otherwise the code
    /// is posted to the token endpoint and the token, its expiry and the
    /// store data are replaced.
    ///
    /// # Errors
    /// - `ApiClientError::Configuration` if the client id or secret is empty
    /// - `ApiClientError::Transport` if the token request could not complete
    /// - `ApiClientError::Api` if the token endpoint rejected the code
    /// - `ApiClientError::Decode` if the token response is malformed or its
    ///   `expires_in` does not fit in a timestamp
    #[instrument(skip(self, code))]
    pub async fn authenticate(&mut self, code: &str) -> Result<String> {
        self.ensure_credentials()?;

        if let Some(token) = self.token.as_ref().filter(|token| token.is_valid_for(code)) {
            debug!("Reusing cached access token");
            return Ok(token.access_token.clone());
        }

        let response = self.exchange_code(code).await?;
        let token = TokenState::from_exchange(response.access_token, response.expires_in, code)?;
        let access_token = token.access_token.clone();

        info!(store_id = %response.store.id, expires_in = response.expires_in, "Access token obtained");

        self.token = Some(token);
        self.store = Some(response.store);

        Ok(access_token)
    }

    /// Build the browser authorization URL
    ///
    /// Query values are percent-encoded; `:`, `/` and `@` stay readable so a
    /// plain redirect URL appears verbatim.
    #[must_use]
    pub fn authorize_url(&self, response_type: &str, redirect_url: &str) -> String {
        format!(
            "{}?response_type={}&client_id={}&redirect_uri={}",
            self.config.authorize_endpoint(),
            encode_query_value(response_type),
            encode_query_value(&self.credentials.client_id),
            encode_query_value(redirect_url),
        )
    }

    /// Current access token, if any
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_ref().map(|token| token.access_token.as_str())
    }

    /// Replace the cached access token
    ///
    /// Without `expires_at` the expiry follows
    /// [`ClientConfig::missing_expiry`]. The authorization code of the last
    /// exchange is kept, so the expiry decides whether `authenticate` with
    /// that code reuses this token.
    pub fn set_access_token(&mut self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        let code = self.token.take().and_then(|state| state.code);
        self.token = Some(TokenState {
            access_token: token.into(),
            expires_at: expires_at.or_else(|| self.config.missing_expiry.expiry()),
            code,
        });
    }

    /// Expiry of the cached token; `None` if there is no token or it never
    /// expires
    #[must_use]
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.as_ref().and_then(|token| token.expires_at)
    }

    /// Check if there is no usable token
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.token.as_ref().map_or(true, TokenState::is_expired)
    }

    /// Store data from the last successful exchange
    #[must_use]
    pub fn store_data(&self) -> Option<&StoreInfo> {
        self.store.as_ref()
    }

    /// Store id from the last successful exchange
    #[must_use]
    pub fn store_id(&self) -> Option<&str> {
        self.store.as_ref().map(|store| store.id.as_str())
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform an authenticated API call
    ///
    /// GET params become the query string; for other methods non-empty
    /// params are sent as a form-encoded body. Only status 200 counts as
    /// success.
    ///
    /// # Errors
    /// - `ApiClientError::Api` with `OutdatedCredentials` if no token is set
    ///   or the response carries no error text, `RequestError` otherwise
    /// - `ApiClientError::Transport` if the request could not complete
    /// - `ApiClientError::Decode` if a 200 body is not a JSON object
    pub async fn call(&self, method: Method, path: &str, params: Params<'_>) -> Result<ApiResponse> {
        match self.call_as::<Value>(method, path, params).await? {
            Value::Object(map) => Ok(map),
            other => Err(ApiClientError::Decode(format!(
                "Expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Perform an authenticated API call and deserialize the body into `T`
    ///
    /// # Errors
    /// Same as [`call`](Self::call); `Decode` if the body does not match `T`.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Params<'_>,
    ) -> Result<T> {
        let Some(token) = self.token.as_ref() else {
            warn!("API call attempted without an access token");
            return Err(ApiClientError::reauthorize(None));
        };

        let mut url = self.api_url(path)?;
        let is_get = method == Method::GET;
        if is_get && !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token)).map_err(|_| {
            ApiClientError::Configuration("Access token contains invalid header characters".into())
        })?;

        let mut request = HttpRequest::new(method, url).header(AUTHORIZATION, bearer);
        if !is_get && !params.is_empty() {
            request = request.form_body(encode_form(params));
        }

        let value = self.dispatch(request).await?;
        let result = serde_json::from_value(value)
            .map_err(|e| ApiClientError::Decode(format!("Unexpected response shape: {e}")))?;

        debug!("API call successful");
        Ok(result)
    }

    /// Authenticated GET
    ///
    /// # Errors
    /// See [`call`](Self::call).
    pub async fn get(&self, path: &str, params: Params<'_>) -> Result<ApiResponse> {
        self.call(Method::GET, path, params).await
    }

    /// Authenticated POST with a form body
    ///
    /// # Errors
    /// See [`call`](Self::call).
    pub async fn post(&self, path: &str, params: Params<'_>) -> Result<ApiResponse> {
        self.call(Method::POST, path, params).await
    }

    fn ensure_credentials(&self) -> Result<()> {
        if self.credentials.client_id.is_empty() {
            return Err(ApiClientError::Configuration("Missing client_id".to_string()));
        }
        if self.credentials.client_secret.is_empty() {
            return Err(ApiClientError::Configuration("Missing client_secret".to_string()));
        }
        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let body = encode_form(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ]);

        debug!(url = %self.config.token_endpoint(), "Exchanging authorization code");

        let request =
            HttpRequest::new(Method::POST, self.config.token_endpoint()).form_body(body);
        let value = self.dispatch(request).await?;

        serde_json::from_value(value)
            .map_err(|e| ApiClientError::Decode(format!("Invalid token response: {e}")))
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.config.api_base_url, path);
        Url::parse(&raw)
            .map_err(|e| ApiClientError::Configuration(format!("Invalid API URL '{raw}': {e}")))
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<Value> {
        let response = self.transport.send(request).await?;
        let HttpResponse { status, body, .. } = response;
        let data: Option<Value> = serde_json::from_slice(&body).ok();

        if status != StatusCode::OK {
            let error = rejection(status, data.as_ref());
            warn!(status = status.as_u16(), error = %error, "Request rejected");
            return Err(error);
        }

        data.ok_or_else(|| ApiClientError::Decode("Response body is not valid JSON".to_string()))
    }
}

impl fmt::Debug for TictailClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TictailClient")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .field("token", &self.token)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TictailClient`]
#[derive(Default)]
pub struct TictailClientBuilder {
    credentials: Option<Credentials>,
    config: Option<ClientConfig>,
    token: Option<(String, Option<DateTime<Utc>>)>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl TictailClientBuilder {
    /// Set the application credentials
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Start with an existing access token
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        self.token = Some((token.into(), expires_at));
        self
    }

    /// Use a custom HTTP transport instead of reqwest
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns `ApiClientError::Configuration` if credentials are not set, the
    /// configuration is invalid, or the default transport cannot be built.
    pub fn build(self) -> Result<TictailClient> {
        let credentials = self
            .credentials
            .ok_or_else(|| ApiClientError::Configuration("Credentials not set".to_string()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };

        let token = self.token.map(|(access_token, expires_at)| TokenState {
            access_token,
            expires_at: expires_at.or_else(|| config.missing_expiry.expiry()),
            code: None,
        });

        Ok(TictailClient { credentials, config, transport, token, store: None })
    }
}

/// Map a non-200 response to an API error
///
/// `error` takes precedence over `message`; without either the token is
/// considered outdated.
fn rejection(status: StatusCode, data: Option<&Value>) -> ApiClientError {
    let field = |key: &str| data.and_then(|value| value.get(key)).and_then(value_text);

    match field("error").or_else(|| field("message")) {
        Some(message) => ApiClientError::Api {
            kind: ApiErrorKind::RequestError,
            status: Some(status.as_u16()),
            message,
        },
        None => ApiClientError::reauthorize(Some(status.as_u16())),
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn encode_form(params: Params<'_>) -> String {
    form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish()
}

/// Query-value escape set: unreserved characters and `:/@` stay readable
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b':')
    .remove(b'/')
    .remove(b'@');

fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

//! OAuth 2.0 client for the Tictail REST API
//!
//! Handles the authorization-code flow for a Tictail application and performs
//! authenticated calls against the store API.
//!
//! # Features
//!
//! - **Authorization URL**: browser redirect target for the consent screen
//! - **Code Exchange**: trades the callback code for an access token and the
//!   store it grants access to, reusing the cached token for the same code
//! - **Authenticated Calls**: bearer-token requests with query-string or
//!   form-encoded parameters
//! - **Typed Errors**: configuration, transport and API failures are
//!   distinguished so callers can decide whether to retry or re-authorize
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TictailClient  │  Token cache + request dispatch
//! └────────┬────────┘
//!          │
//!          └──► HttpTransport      (ReqwestTransport by default)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use tictail_client::TictailClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = TictailClient::new("your_client_id", "your_client_secret", None)?;
//!
//!     // Send the user here, Tictail redirects back with `?code=...`
//!     let url = client.authorize_url("code", "https://app.example/callback");
//!     println!("Authorize at: {url}");
//!
//!     // ... app receives the callback ...
//!     client.authenticate("code_from_callback").await?;
//!     println!("Store: {:?}", client.store_id());
//!
//!     let me = client.get("/v1/me", &[]).await?;
//!     println!("{me:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Security
//!
//! - TLS certificates are verified unless
//!   [`ClientConfig::accept_invalid_certs`] is set
//! - Client secrets and tokens are redacted from `Debug` output and logs
//! - Token persistence is left to the embedding application

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{TictailClient, TictailClientBuilder};
pub use config::{ClientConfig, MissingExpiryPolicy};
pub use errors::{ApiClientError, ApiErrorCategory, ApiErrorKind, Result, TransportErrorKind};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{ApiResponse, Credentials, Params, StoreInfo, TokenResponse, TokenState};

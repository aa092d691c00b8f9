//! Integration tests for the Tictail client
//!
//! Drives the full flow (code exchange, cached token, authenticated calls)
//! through the reqwest transport against a wiremock server.

use std::net::TcpListener;
use std::sync::Once;

use serde_json::json;
use tictail_client::{
    ApiClientError, ApiErrorKind, ClientConfig, Credentials, TictailClient, TransportErrorKind,
};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn client_for(server: &MockServer) -> TictailClient {
    init_tracing();
    TictailClient::with_config(
        Credentials::new("client-id", "client-secret"),
        ClientConfig::with_base_url(&server.uri()),
    )
    .expect("client should build")
}

async fn mount_token_endpoint(server: &MockServer, code: &str, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string(format!(
            "client_id=client-id&client_secret=client-secret&code={code}&grant_type=authorization_code"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 3600,
            "store": {"id": "x3k", "name": "Acme Goods", "language": "en"}
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Validates the first exchange populates token, expiry and store.
///
/// # Test Steps
/// 1. Mount a token endpoint expecting exactly one exchange
/// 2. Authenticate with a fresh code
/// 3. Verify token, expiry and store data are set
#[tokio::test]
async fn test_fresh_code_performs_one_exchange() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "code-1", "token-1", 1).await;
    let mut client = client_for(&server);

    let token = client.authenticate("code-1").await.expect("exchange should succeed");

    assert_eq!(token, "token-1");
    assert_eq!(client.access_token(), Some("token-1"));
    assert_eq!(client.store_id(), Some("x3k"));
    assert_eq!(client.store_data().and_then(|s| s.get("name")), Some(&json!("Acme Goods")));
    assert!(client.token_expires_at().is_some());
}

#[tokio::test]
async fn test_same_code_reuses_cached_token() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "code-1", "token-1", 1).await;
    let mut client = client_for(&server);

    let first = client.authenticate("code-1").await.unwrap();
    let second = client.authenticate("code-1").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_different_code_triggers_new_exchange() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "code-1", "token-1", 1).await;
    mount_token_endpoint(&server, "code-2", "token-2", 1).await;
    let mut client = client_for(&server);

    client.authenticate("code-1").await.unwrap();
    let token = client.authenticate("code-2").await.unwrap();

    assert_eq!(token, "token-2");
    assert_eq!(client.access_token(), Some("token-2"));
}

#[tokio::test]
async fn test_missing_credentials_make_no_request() {
    let server = MockServer::start().await;
    init_tracing();

    let mut client = TictailClient::with_config(
        Credentials::new("", "client-secret"),
        ClientConfig::with_base_url(&server.uri()),
    )
    .unwrap();

    let err = client.authenticate("code-1").await.unwrap_err();

    assert!(matches!(err, ApiClientError::Configuration(ref msg) if msg.contains("client_id")));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_success_returns_decoded_mapping() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"foo": "bar"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.set_access_token("token-1", None);

    let response = client.get("/v1/me", &[]).await?;

    assert_eq!(response.len(), 1);
    assert_eq!(response.get("foo"), Some(&json!("bar")));
    Ok(())
}

#[tokio::test]
async fn test_error_body_is_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/stores/x3k/products"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_request"})))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.set_access_token("token-1", None);

    let err = client.get("/v1/stores/x3k/products", &[]).await.unwrap_err();

    match err {
        ApiClientError::Api { kind, status, message } => {
            assert_eq!(kind, ApiErrorKind::RequestError);
            assert_eq!(status, Some(400));
            assert_eq!(message, "invalid_request");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_without_body_is_outdated_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.set_access_token("stale-token", None);

    let err = client.get("/v1/me", &[]).await.unwrap_err();

    assert!(matches!(
        err,
        ApiClientError::Api { kind: ApiErrorKind::OutdatedCredentials, status: Some(401), .. }
    ));
    assert_eq!(err.to_string(), "Reauthorize the user!");
    assert!(err.requires_reauthorization());
}

#[tokio::test]
async fn test_rejected_token_exchange_propagates_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "Authorization code has expired"})),
        )
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.authenticate("old-code").await.unwrap_err();

    assert_eq!(err.to_string(), "Authorization code has expired");
    assert!(client.access_token().is_none());
    assert!(client.store_id().is_none());
}

#[test]
fn test_authorize_url_matches_platform_format() {
    let client = TictailClient::new("abc", "secret", None).unwrap();

    assert_eq!(
        client.authorize_url("code", "https://app.example/cb"),
        "https://tictail.com/oauth/authorize?response_type=code&client_id=abc&redirect_uri=https://app.example/cb"
    );
}

#[tokio::test]
async fn test_get_params_are_sent_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("a", "1"))
        .and(query_param("b", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.set_access_token("token-1", None);
    client.get("/v1/search", &[("a", "1"), ("b", "2")]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("a=1&b=2"));
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn test_post_params_are_sent_as_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .and(body_string("a=1&b=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"created": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.set_access_token("token-1", None);
    let response = client.post("/v1/search", &[("a", "1"), ("b", "2")]).await.unwrap();

    assert_eq!(response.get("created"), Some(&json!(true)));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_exchanged_token_is_used_for_calls() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "code-1", "token-1", 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/stores/x3k"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x3k"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.authenticate("code-1").await.unwrap();
    let store_path = format!("/v1/stores/{}", client.store_id().unwrap());

    let store = client.get(&store_path, &[]).await.unwrap();
    assert_eq!(store.get("id"), Some(&json!("x3k")));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // release the port so that requests fail with ECONNREFUSED

    init_tracing();
    let mut client = TictailClient::with_config(
        Credentials::new("client-id", "client-secret"),
        ClientConfig::with_base_url(&format!("http://{addr}")),
    )
    .unwrap();

    let err = client.authenticate("code-1").await.unwrap_err();

    assert!(matches!(err, ApiClientError::Transport { kind: TransportErrorKind::Connect, .. }));
    assert!(err.should_retry());
}

#[test]
fn test_tls_verification_enabled_by_default() {
    let client = TictailClient::new("id", "secret", None).unwrap();
    assert!(!client.config().accept_invalid_certs);
}

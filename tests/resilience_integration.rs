//! Integration tests for the resilience stack over real HTTP
//!
//! Runs the executor, retry policy, token manager and metrics against a
//! wiremock server through the reqwest transport.

use opsync::api::resilience::RetryReason;
use opsync::api::{ApiError, Backoff, RequestDescriptor, RequestExecutor, ReqwestTransport, ResilienceConfig};
use opsync::auth::{PasswordGrant, TokenManager};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quick_config(max_attempts: u32) -> ResilienceConfig {
    let short = Backoff::fixed(Duration::from_millis(10));
    ResilienceConfig::builder()
        .max_attempts(max_attempts)
        .rate_limit_backoff(short)
        .server_error_backoff(short)
        .transport_backoff(short)
        .auth_backoff(Backoff::immediate())
        .jitter(false)
        .timeout(Duration::from_secs(5))
        .build()
}

fn executor(config: ResilienceConfig) -> RequestExecutor {
    let transport = Arc::new(ReqwestTransport::new().unwrap());
    RequestExecutor::new("test", transport, config)
}

/// 429 with `Retry-After` waits the server-given time, then succeeds
#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [1, 2]})))
        .mount(&server)
        .await;

    let executor = executor(quick_config(3));
    let started = Instant::now();
    let body = executor
        .execute(RequestDescriptor::get(format!("{}/stats", server.uri())))
        .await
        .unwrap();

    assert_eq!(body["result"], json!([1, 2]));
    assert!(started.elapsed() >= Duration::from_secs(1));

    let metrics = executor.metrics().upstream("test").unwrap();
    assert_eq!(metrics.attempts, 2);
    assert_eq!(metrics.retries_for(RetryReason::RateLimited), 1);
}

/// Persistent 5xx uses every attempt and reports the last error
#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&server)
        .await;

    let err = executor(quick_config(3))
        .execute(RequestDescriptor::get(format!("{}/flaky", server.uri())))
        .await
        .unwrap_err();

    match err {
        ApiError::ExhaustedRetries { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last_error.as_deref(), Some(ApiError::Server { status: 503, .. })));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

/// Plain 4xx is never retried
#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such unit"))
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(quick_config(3))
        .execute(RequestDescriptor::get(format!("{}/units/x", server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Client { status: 404, .. }));
}

/// 401 invalidates the token; the retry logs in again and uses the new one
#[tokio::test]
async fn test_unauthorized_triggers_single_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t1", "expires_in": 3600})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t2", "expires_in": 3600})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": ["o1"]})))
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new().unwrap());
    let grant = PasswordGrant::new(format!("{}/login", server.uri()), "user", "pass");
    let tokens = Arc::new(TokenManager::new("test", Arc::new(grant), transport.clone()));
    let executor = RequestExecutor::new("test", transport, quick_config(3)).with_credentials(tokens.clone());

    let body = executor
        .execute(RequestDescriptor::get(format!("{}/orders", server.uri())))
        .await
        .unwrap();

    assert_eq!(body["orders"], json!(["o1"]));
    assert_eq!(tokens.refresh_count(), 2);
    assert_eq!(executor.metrics().upstream("test").unwrap().reauthentications, 1);
}

/// Nothing listening: transport failures are retried, then reported
#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let executor = executor(quick_config(2));
    let err = executor
        .execute(RequestDescriptor::get(format!("http://{address}/stats")))
        .await
        .unwrap_err();

    match err {
        ApiError::ExhaustedRetries { attempts, last_error } => {
            assert_eq!(attempts, 2);
            assert!(matches!(last_error.as_deref(), Some(ApiError::Transport(_))));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    let metrics = executor.metrics().upstream("test").unwrap();
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.retries_for(RetryReason::Transport), 1);
}

/// Presets carry the per-upstream behaviour the clients depend on
#[test]
fn test_upstream_presets() {
    let trendyol = ResilienceConfig::trendyol();
    assert_eq!(trendyol.retry.max_attempts, 4);
    assert_eq!(trendyol.timeout, Duration::from_secs(10));

    let yemeksepeti = ResilienceConfig::yemeksepeti();
    assert_eq!(yemeksepeti.retry.max_attempts, 3);
    assert_eq!(yemeksepeti.retry.server_error, Backoff::fixed(Duration::from_secs(1800)));
    assert_eq!(yemeksepeti.retry.processing, Some(Backoff::fixed(Duration::from_secs(5))));

    let dodois = ResilienceConfig::dodois();
    assert_eq!(dodois.timeout, Duration::from_secs(15));
    assert_eq!(ResilienceConfig::disabled().retry.max_attempts, 1);
}

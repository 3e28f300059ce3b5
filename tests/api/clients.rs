use opsync::api::{Backoff, ReqwestTransport, ResilienceConfig};
use opsync::auth::{PasswordGrant, TokenManager};
use opsync::clients::{TrendyolClient, TrendyolCredentials, YemeksepetiClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_trendyol_reviews_use_basic_auth_and_agent_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/integrator/review/meal/suppliers/1001/stores/55/reviews/filter"))
        .and(basic_auth("api-key", "api-secret"))
        .and(header("x-agentname", "opsync-agent"))
        .and(header("x-executor-user", "ops@example.test"))
        .and(query_param("startDate", "1000"))
        .and(query_param("endDate", "2000"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"id": 1, "rate": 5}],
            "totalPages": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = TrendyolCredentials {
        api_key: "api-key".into(),
        api_secret: "api-secret".into(),
        agent_name: "opsync-agent".into(),
        agent_mail: "ops@example.test".into(),
        supplier_id: "1001".into(),
    };
    let client = TrendyolClient::new(
        format!("{}/integrator/", server.uri()),
        credentials,
        Arc::new(ReqwestTransport::new().unwrap()),
        ResilienceConfig::disabled(),
    );

    let reviews = client.reviews("55", 1000, 2000).await.unwrap();

    assert_eq!(reviews, vec![json!({"id": 1, "rate": 5})]);
}

#[tokio::test]
async fn test_yemeksepeti_order_retries_while_processing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "yt", "expiresIn": 3600})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/chains/c1/orders/o1"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/chains/c1/orders/o1"))
        .and(header("authorization", "Bearer yt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order": {"code": "o1", "status": "accepted"}})))
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new().unwrap());
    let grant = PasswordGrant::new(format!("{}/v2/login", server.uri()), "user", "pass");
    let tokens = Arc::new(TokenManager::new("yemeksepeti", Arc::new(grant), transport.clone()));
    let config = ResilienceConfig::builder()
        .max_attempts(3)
        .processing_retry(Some(Backoff::fixed(Duration::from_millis(10))))
        .build();
    let client = YemeksepetiClient::new(format!("{}/v2/chains/c1/", server.uri()), tokens, transport, config);

    let order = client.order("o1").await.unwrap();

    assert_eq!(order["code"], "o1");
    let metrics = client.executor().metrics().upstream("yemeksepeti").unwrap();
    assert_eq!(metrics.attempts, 2);
}

use opsync::api::{ApiError, CursorStrategy, ItemExtractor, RequestDescriptor, RequestExecutor, ReqwestTransport, ResilienceConfig};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor() -> RequestExecutor {
    RequestExecutor::new("paging", Arc::new(ReqwestTransport::new().unwrap()), ResilienceConfig::disabled())
}

#[tokio::test]
async fn test_page_size_collects_every_page_in_order() {
    let server = MockServer::start().await;
    for (page, items) in [("0", json!([1, 2])), ("1", json!([3, 4])), ("2", json!([5]))] {
        Mock::given(method("GET"))
            .and(path("/packages"))
            .and(query_param("page", page))
            .and(query_param("size", "2"))
            .and(query_param("storeId", "55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": items, "totalPages": 3})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let items = executor()
        .fetch_all(
            RequestDescriptor::get(format!("{}/packages", server.uri())).with_query("storeId", "55"),
            2,
            &CursorStrategy::page_size(),
            &ItemExtractor::key("content"),
        )
        .await
        .unwrap();

    assert_eq!(items, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
}

#[tokio::test]
async fn test_skip_take_stops_at_end_of_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": ["a", "b"], "isEndOfListReached": false})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": ["c"], "isEndOfListReached": true})))
        .mount(&server)
        .await;

    let items = executor()
        .fetch_all(
            RequestDescriptor::get(format!("{}/accounting/sales", server.uri())),
            2,
            &CursorStrategy::skip_take(),
            &ItemExtractor::key("items"),
        )
        .await
        .unwrap();

    assert_eq!(items, vec![json!("a"), json!("b"), json!("c")]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failing_page_fails_the_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": [1], "totalPages": 2})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = executor()
        .fetch_all(
            RequestDescriptor::get(format!("{}/claims", server.uri())),
            1,
            &CursorStrategy::page_size(),
            &ItemExtractor::key("content"),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Server { status: 500, .. } | ApiError::ExhaustedRetries { .. }
    ));
}

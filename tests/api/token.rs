use opsync::api::ReqwestTransport;
use opsync::auth::{
    AuthError, EnvFileStore, RefreshOutcome, RefreshTokenGrant, SecretStore, TokenManager, TokenState,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn env_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_refresh_rotation_is_written_to_env_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "expires_in": 3600,
            "refresh_token": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = env_file("# dodo\nCLIENT_ID=client\nCLIENT_SECRET='s3cret'\nREFRESH_TOKEN=old-refresh\nREGIONS=IST\n");
    let store = Arc::new(EnvFileStore::open(file.path()).unwrap());
    let grant = RefreshTokenGrant::from_store(
        format!("{}/connect/token", server.uri()),
        store.clone(),
        "CLIENT_ID",
        "CLIENT_SECRET",
        "REFRESH_TOKEN",
    )
    .unwrap();
    let tokens = TokenManager::new("dodois", Arc::new(grant), Arc::new(ReqwestTransport::new().unwrap()));

    assert_eq!(tokens.state().await, TokenState::Uninitialized);
    assert_eq!(tokens.refresh().await.unwrap(), RefreshOutcome::Refreshed);
    assert_eq!(tokens.ensure_valid().await.unwrap(), "access-1");
    assert_eq!(tokens.state().await, TokenState::Valid);

    let written = std::fs::read_to_string(file.path()).unwrap();
    assert!(written.contains("REFRESH_TOKEN=new-refresh"));
    assert!(written.contains("# dodo"));
    assert!(written.contains("REGIONS=IST"));
    assert_eq!(EnvFileStore::open(file.path()).unwrap().read("REFRESH_TOKEN").as_deref(), Some("new-refresh"));
}

#[tokio::test]
async fn test_rejected_refresh_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#))
        .mount(&server)
        .await;

    let file = env_file("CLIENT_ID=client\nCLIENT_SECRET=secret\nREFRESH_TOKEN=stale\n");
    let store = Arc::new(EnvFileStore::open(file.path()).unwrap());
    let grant = RefreshTokenGrant::from_store(
        format!("{}/connect/token", server.uri()),
        store.clone(),
        "CLIENT_ID",
        "CLIENT_SECRET",
        "REFRESH_TOKEN",
    )
    .unwrap();
    let tokens = TokenManager::new("dodois", Arc::new(grant), Arc::new(ReqwestTransport::new().unwrap()));

    let err = tokens.ensure_valid().await.unwrap_err();

    assert!(matches!(err, AuthError::Rejected { status: 400, .. }));
    assert_eq!(tokens.state().await, TokenState::Invalid);
    assert_eq!(store.read("REFRESH_TOKEN").as_deref(), Some("stale"));
}

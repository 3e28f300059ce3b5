//! Token grant exchanges
//!
//! A grant performs exactly one request against a token endpoint. Retrying a
//! failed exchange is left to whoever called the token manager.

use super::error::{AuthError, StoreError};
use super::store::SecretStore;
use crate::api::request::{Body, Method};
use crate::api::transport::{HttpRequest, Transport};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const GRANT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parsed token endpoint response
#[derive(Clone, PartialEq, Eq)]
pub struct GrantResponse {
    pub access_token: String,
    /// Seconds until expiry, when the endpoint says
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for GrantResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantResponse")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

#[async_trait]
pub trait TokenGrant: Send + Sync {
    async fn exchange(&self, transport: &dyn Transport) -> Result<GrantResponse, AuthError>;

    /// Store a rotated refresh token. Grants without one do nothing.
    async fn persist_rotation(&self, _refresh_token: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Username/password login posted as a form (Yemeksepeti middleware)
#[derive(Clone)]
pub struct PasswordGrant {
    url: String,
    username: String,
    password: String,
    grant_type: String,
}

impl PasswordGrant {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            grant_type: "client_credentials".to_string(),
        }
    }

    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = grant_type.into();
        self
    }
}

#[async_trait]
impl TokenGrant for PasswordGrant {
    async fn exchange(&self, transport: &dyn Transport) -> Result<GrantResponse, AuthError> {
        info!("Logging in at {}", self.url);
        let form = BTreeMap::from([
            ("username".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
            ("grant_type".to_string(), self.grant_type.clone()),
        ]);
        let body = post_form(transport, &self.url, form).await?;
        parse_grant_response(&body)
    }
}

/// OAuth refresh-token grant with a rotating refresh token (Dodo IS).
///
/// The refresh token is read from the store once and then tracked in memory,
/// so a failed write never makes the next exchange use a spent token.
pub struct RefreshTokenGrant {
    url: String,
    client_id: String,
    client_secret: String,
    store: Arc<dyn SecretStore>,
    store_key: String,
    current: Mutex<String>,
}

impl RefreshTokenGrant {
    pub fn from_store(
        url: impl Into<String>,
        store: Arc<dyn SecretStore>,
        client_id_key: &str,
        client_secret_key: &str,
        refresh_token_key: &str,
    ) -> Result<Self, AuthError> {
        let client_id = store.require(client_id_key)?;
        let client_secret = store.require(client_secret_key)?;
        let refresh_token = store.require(refresh_token_key)?;

        Ok(Self {
            url: url.into(),
            client_id,
            client_secret,
            store,
            store_key: refresh_token_key.to_string(),
            current: Mutex::new(refresh_token),
        })
    }

    fn current(&self) -> String {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl TokenGrant for RefreshTokenGrant {
    async fn exchange(&self, transport: &dyn Transport) -> Result<GrantResponse, AuthError> {
        info!("Refreshing access token at {}", self.url);
        let form = BTreeMap::from([
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("refresh_token".to_string(), self.current()),
        ]);
        let body = post_form(transport, &self.url, form).await?;
        let response = parse_grant_response(&body)?;

        let Some(rotated) = &response.refresh_token else {
            return Err(AuthError::InvalidResponse("missing refresh_token".to_string()));
        };
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = rotated.clone();

        Ok(response)
    }

    async fn persist_rotation(&self, refresh_token: &str) -> Result<(), StoreError> {
        self.store.write(&self.store_key, refresh_token)
    }
}

async fn post_form(
    transport: &dyn Transport,
    url: &str,
    form: BTreeMap<String, String>,
) -> Result<String, AuthError> {
    let request = HttpRequest {
        method: Method::Post,
        url: url.to_string(),
        headers: BTreeMap::from([(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )]),
        body: Some(Body::Form(form)),
        authorization: None,
        timeout: GRANT_TIMEOUT,
    };

    let response = transport
        .send(request)
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    debug!("Token endpoint {} answered {}", url, response.status);
    if !response.is_success() {
        return Err(AuthError::Rejected {
            status: response.status,
            body: response.body,
        });
    }
    Ok(response.body)
}

/// Accepts `access_token` or `token`, and `expires_in`, `expiresIn` or `expires`.
pub fn parse_grant_response(body: &str) -> Result<GrantResponse, AuthError> {
    let value: Value = serde_json::from_str(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

    let access_token = ["access_token", "token"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidResponse("missing access_token".to_string()))?
        .to_string();

    let expires_in = ["expires_in", "expiresIn", "expires"].iter().find_map(|key| {
        let field = value.get(*key)?;
        field
            .as_i64()
            .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
    });

    let refresh_token = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(GrantResponse {
        access_token,
        expires_in,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::transport::HttpResponse;
    use crate::auth::store::MemorySecretStore;

    #[test]
    fn test_parse_alternative_field_names() {
        let parsed = parse_grant_response(r#"{"token": "abc", "expiresIn": "1800"}"#).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.expires_in, Some(1800));
        assert_eq!(parsed.refresh_token, None);

        let parsed = parse_grant_response(r#"{"access_token": "x", "expires_in": 3600, "refresh_token": "r"}"#).unwrap();
        assert_eq!(parsed.expires_in, Some(3600));
        assert_eq!(parsed.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_parse_rejects_missing_token() {
        assert!(matches!(
            parse_grant_response(r#"{"expires_in": 10}"#),
            Err(AuthError::InvalidResponse(_))
        ));
        assert!(matches!(parse_grant_response("not json"), Err(AuthError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_password_grant_posts_form() {
        let transport = ScriptedTransport::responses(vec![HttpResponse::new(200, r#"{"access_token": "t"}"#)]);
        let grant = PasswordGrant::new("https://auth.example.test/login", "user", "pass");

        let response = grant.exchange(&transport).await.unwrap();
        assert_eq!(response.access_token, "t");

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        match &request.body {
            Some(Body::Form(form)) => {
                assert_eq!(form["username"], "user");
                assert_eq!(form["grant_type"], "client_credentials");
            }
            other => panic!("expected form body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_grant() {
        let transport = ScriptedTransport::responses(vec![HttpResponse::new(400, "invalid_grant")]);
        let grant = PasswordGrant::new("https://auth.example.test/login", "user", "pass");

        let err = grant.exchange(&transport).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_refresh_grant_tracks_rotated_token() {
        let store = Arc::new(MemorySecretStore::new([
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "secret"),
            ("REFRESH_TOKEN", "r1"),
        ]));
        let transport = ScriptedTransport::responses(vec![
            HttpResponse::new(200, r#"{"access_token": "a1", "refresh_token": "r2"}"#),
            HttpResponse::new(200, r#"{"access_token": "a2", "refresh_token": "r3"}"#),
        ]);
        let grant = RefreshTokenGrant::from_store(
            "https://auth.example.test/token",
            store,
            "CLIENT_ID",
            "CLIENT_SECRET",
            "REFRESH_TOKEN",
        )
        .unwrap();

        grant.exchange(&transport).await.unwrap();
        grant.exchange(&transport).await.unwrap();

        let sent: Vec<_> = transport
            .requests()
            .into_iter()
            .map(|r| match r.body {
                Some(Body::Form(form)) => form["refresh_token"].clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(sent, vec!["r1", "r2"]);
    }

    #[test]
    fn test_refresh_grant_requires_secrets() {
        let store = Arc::new(MemorySecretStore::new([("CLIENT_ID", "id")]));
        let err = RefreshTokenGrant::from_store("https://x.test", store, "CLIENT_ID", "CLIENT_SECRET", "REFRESH_TOKEN")
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::MissingSecret(key) if key == "CLIENT_SECRET"));
    }
}

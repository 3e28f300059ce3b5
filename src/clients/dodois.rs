//! Dodo IS public API client
//!
//! Bearer tokens come from a refresh-token grant whose refresh token rotates
//! on every exchange; the rotated value is written back to the secret store.

use crate::api::constants::{self, dodois};
use crate::api::{
    ApiError, CursorStrategy, ItemExtractor, MetricsCollector, RequestDescriptor, RequestExecutor, ResilienceConfig,
    Transport,
};
use crate::auth::{AuthError, RefreshTokenGrant, SecretStore, TokenManager};
use serde_json::Value;
use std::sync::Arc;

pub const CLIENT_ID_KEY: &str = "CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "CLIENT_SECRET";
pub const REFRESH_TOKEN_KEY: &str = "REFRESH_TOKEN";

#[derive(Clone)]
pub struct DodoIsClient {
    executor: RequestExecutor,
    base_url: String,
    tokens: Arc<TokenManager>,
    page_size: u32,
}

impl DodoIsClient {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Self {
        let executor = RequestExecutor::new("dodois", transport, config)
            .with_credentials(tokens.clone())
            .with_default_header("accept", "application/json");
        Self {
            executor,
            base_url: base_url.into(),
            tokens,
            page_size: dodois::DEFAULT_PAGE_SIZE,
        }
    }

    /// Token manager over the production token endpoint
    pub fn token_manager(store: Arc<dyn SecretStore>, transport: Arc<dyn Transport>) -> Result<TokenManager, AuthError> {
        let grant = RefreshTokenGrant::from_store(
            dodois::TOKEN_URL,
            store,
            CLIENT_ID_KEY,
            CLIENT_SECRET_KEY,
            REFRESH_TOKEN_KEY,
        )?;
        Ok(TokenManager::new("dodois", Arc::new(grant), transport))
    }

    /// Production client
    pub fn from_store(
        store: Arc<dyn SecretStore>,
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Result<Self, AuthError> {
        let tokens = Arc::new(Self::token_manager(store, transport.clone())?);
        Ok(Self::new(dodois::BASE_URL, tokens, transport, config))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.executor = self.executor.with_metrics(metrics);
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Single statistics request, e.g. `finances/sales/units`
    pub async fn statistics<I, K, V>(&self, endpoint: &str, params: I) -> Result<Value, ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let descriptor = self.get(endpoint).with_query_pairs(params);
        self.executor.execute(descriptor).await
    }

    /// Every record of a skip/take listing for `units` between two dates
    pub async fn fetch_paginated(
        &self,
        endpoint: &str,
        units: &[String],
        from: &str,
        to: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let descriptor = self
            .get(endpoint)
            .with_query("from", from)
            .with_query("to", to)
            .with_query("units", units.join(","));
        self.executor
            .fetch_all(
                descriptor,
                self.page_size,
                &CursorStrategy::skip_take(),
                &ItemExtractor::key("items"),
            )
            .await
    }

    fn get(&self, endpoint: &str) -> RequestDescriptor {
        RequestDescriptor::get(constants::join_url(&self.base_url, endpoint))
    }
}

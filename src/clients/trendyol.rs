//! Trendyol Go meal integrator client
//!
//! HTTP Basic on every request plus the agent headers Trendyol requires.
//! Listings are paged with `page`/`size`.

use crate::api::constants::{self, trendyol};
use crate::api::{
    ApiError, Authorization, CursorStrategy, ItemExtractor, MetricsCollector, RequestDescriptor, RequestExecutor,
    ResilienceConfig, Transport,
};
use crate::auth::{AuthError, SecretStore};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Per-region Trendyol credentials
#[derive(Clone)]
pub struct TrendyolCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub agent_name: String,
    pub agent_mail: String,
    pub supplier_id: String,
}

impl TrendyolCredentials {
    /// Read `TRENDYOL_*_<REGION>` keys
    pub fn from_store(store: &dyn SecretStore, region: &str) -> Result<Self, AuthError> {
        let key = |name: &str| format!("TRENDYOL_{name}_{region}");
        Ok(Self {
            api_key: store.require(&key("API_KEY"))?,
            api_secret: store.require(&key("API_SECRET"))?,
            agent_name: store.require(&key("AGENT_NAME"))?,
            agent_mail: store.require(&key("AGENT_MAIL"))?,
            supplier_id: store.require(&key("SUPPLIER_ID"))?,
        })
    }
}

impl fmt::Debug for TrendyolCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrendyolCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("agent_name", &self.agent_name)
            .field("agent_mail", &self.agent_mail)
            .field("supplier_id", &self.supplier_id)
            .finish()
    }
}

#[derive(Clone)]
pub struct TrendyolClient {
    executor: RequestExecutor,
    base_url: String,
    supplier_id: String,
    page_size: u32,
}

impl TrendyolClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: TrendyolCredentials,
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Self {
        let executor = RequestExecutor::new("trendyol", transport, config)
            .with_authorization(Authorization::Basic {
                username: credentials.api_key,
                password: credentials.api_secret,
            })
            .with_default_header("content-type", "application/json")
            .with_default_header(trendyol::AGENT_NAME_HEADER, credentials.agent_name)
            .with_default_header(trendyol::EXECUTOR_USER_HEADER, credentials.agent_mail);

        Self {
            executor,
            base_url: base_url.into(),
            supplier_id: credentials.supplier_id,
            page_size: trendyol::DEFAULT_PAGE_SIZE,
        }
    }

    /// Production client for one region
    pub fn from_store(
        store: &dyn SecretStore,
        region: &str,
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Result<Self, AuthError> {
        let credentials = TrendyolCredentials::from_store(store, region)?;
        Ok(Self::new(trendyol::BASE_URL, credentials, transport, config))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.executor = self.executor.with_metrics(metrics);
        self
    }

    pub fn supplier_id(&self) -> &str {
        &self.supplier_id
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Reviews left for a store in `[start_ms, end_ms)`
    pub async fn reviews(&self, store_id: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Value>, ApiError> {
        let descriptor = self
            .get(&trendyol::reviews_path(&self.supplier_id, store_id))
            .with_query("startDate", start_ms)
            .with_query("endDate", end_ms);
        self.fetch_all(descriptor).await
    }

    /// Claims created for a store in `[start_ms, end_ms)`
    pub async fn claims(&self, store_id: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Value>, ApiError> {
        let descriptor = self
            .get(&trendyol::claims_path(&self.supplier_id))
            .with_query("storeId", store_id)
            .with_query("createdStartDate", start_ms)
            .with_query("createdEndDate", end_ms);
        self.fetch_all(descriptor).await
    }

    /// Packages modified in `[start_ms, end_ms)`
    pub async fn packages(&self, store_id: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Value>, ApiError> {
        let descriptor = self
            .get(&trendyol::packages_path(&self.supplier_id))
            .with_query("storeId", store_id)
            .with_query("packageModificationStartDate", start_ms)
            .with_query("packageModificationEndDate", end_ms);
        self.fetch_all(descriptor).await
    }

    fn get(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::get(constants::join_url(&self.base_url, path))
    }

    async fn fetch_all(&self, descriptor: RequestDescriptor) -> Result<Vec<Value>, ApiError> {
        self.executor
            .fetch_all(
                descriptor,
                self.page_size,
                &CursorStrategy::page_size(),
                &ItemExtractor::key("content"),
            )
            .await
    }
}

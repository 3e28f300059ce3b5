//! Yemeksepeti POS middleware client
//!
//! Bearer tokens come from a username/password login. The middleware answers
//! 204 while an order is still being prepared for the API, which the
//! upstream preset retries.

use crate::api::constants::{self, yemeksepeti};
use crate::api::{ApiError, MetricsCollector, RequestDescriptor, RequestExecutor, ResilienceConfig, Transport};
use crate::auth::{AuthError, PasswordGrant, SecretStore, TokenManager};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;

/// Order listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Accepted,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Accepted => "accepted",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Identifiers returned by `orders/ids`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderIds {
    pub count: u64,
    pub orders: Vec<String>,
}

impl OrderIds {
    fn from_response(response: &Value) -> Self {
        let orders: Vec<String> = response
            .get("orders")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| match id {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let count = response
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(orders.len() as u64);
        Self { count, orders }
    }

    pub fn merge(mut self, other: OrderIds) -> Self {
        self.count += other.count;
        self.orders.extend(other.orders);
        self
    }
}

#[derive(Clone)]
pub struct YemeksepetiClient {
    executor: RequestExecutor,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl YemeksepetiClient {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Self {
        let executor = RequestExecutor::new("yemeksepeti", transport, config)
            .with_credentials(tokens.clone())
            .with_default_header("accept", "application/json");
        Self {
            executor,
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Production client for the chain named by `YEMEKSEPETI_CHAINID`
    pub fn from_store(
        store: &dyn SecretStore,
        transport: Arc<dyn Transport>,
        config: ResilienceConfig,
    ) -> Result<Self, AuthError> {
        let chain_id = store.require("YEMEKSEPETI_CHAINID")?;
        let grant = PasswordGrant::new(
            yemeksepeti::LOGIN_URL,
            store.require("YEMEKSEPETI_USERNAME")?,
            store.require("YEMEKSEPETI_PASSWORD")?,
        );
        let tokens = Arc::new(
            TokenManager::new("yemeksepeti", Arc::new(grant), transport.clone())
                .with_default_lifetime(Duration::seconds(yemeksepeti::DEFAULT_TOKEN_LIFETIME_SECS)),
        );

        Ok(Self::new(
            yemeksepeti::chain_base_url(&chain_id),
            tokens,
            transport,
            config,
        ))
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

    /// Recent order ids of one vendor with the given status
    pub async fn order_ids(&self, vendor_id: &str, status: OrderStatus) -> Result<OrderIds, ApiError> {
        let descriptor = self
            .get(yemeksepeti::ORDER_IDS)
            .with_query("status", status.as_str())
            .with_query("vendorId", vendor_id);
        let response = self.executor.execute(descriptor).await?;
        Ok(OrderIds::from_response(&response))
    }

    /// Accepted and cancelled order ids together
    pub async fn all_order_ids(&self, vendor_id: &str) -> Result<OrderIds, ApiError> {
        let accepted = self.order_ids(vendor_id, OrderStatus::Accepted).await?;
        let cancelled = self.order_ids(vendor_id, OrderStatus::Cancelled).await?;
        Ok(accepted.merge(cancelled))
    }

    /// Detail of one order: the object under `order`
    pub async fn order(&self, order_id: &str) -> Result<Value, ApiError> {
        let response = self.executor.execute(self.get(&yemeksepeti::order_path(order_id))).await?;
        match response {
            Value::Object(mut body) => body
                .remove("order")
                .ok_or_else(|| ApiError::MalformedResponse(format!("order {order_id} has no 'order' field"))),
            other => Err(ApiError::MalformedResponse(format!(
                "order {order_id}: expected an object, got {other}"
            ))),
        }
    }

    fn get(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::get(constants::join_url(&self.base_url, path))
    }
}

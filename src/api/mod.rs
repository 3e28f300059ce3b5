//! HTTP resilience layer shared by all upstream clients
//!
//! A [`RequestDescriptor`] describes one logical call. The [`RequestExecutor`]
//! sends it through a [`Transport`], consulting the retry policy after every
//! attempt, and pagination builds on top of the executor.

pub mod constants;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod request;
pub mod resilience;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use executor::{CredentialProvider, RequestExecutor};
pub use pagination::{CursorStrategy, ItemExtractor};
pub use request::{Body, Method, RequestDescriptor};
pub use resilience::{
    ApiLogger, Backoff, LogLevel, MetricsCollector, MetricsSnapshot, MonitoringConfig, ResilienceConfig, RetryConfig,
    RetryPolicy,
};
pub use transport::{Authorization, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportFailure};

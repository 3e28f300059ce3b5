//! Resilience features shared by every upstream client
//!
//! Retry classification, per-upstream presets, structured logging and call
//! counters.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use logging::{ApiLogger, OperationContext, OperationMetrics};
pub use metrics::{GlobalMetrics, MetricsCollector, MetricsSnapshot, OperationTypeMetrics, UpstreamMetrics};
pub use retry::{Backoff, Outcome, RetryAction, RetryConfig, RetryDecision, RetryPolicy, RetryReason};

//! Resilience configuration with builder pattern
//!
//! Bundles the retry policy, the per-call timeout and monitoring switches for
//! one upstream. Presets mirror how each upstream is known to behave.

use super::retry::{Backoff, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resilience configuration for one upstream API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    #[serde(with = "timeout_secs")]
    pub timeout: Duration,
    pub monitoring: MonitoringConfig,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub correlation_ids: bool,
    pub request_logging: bool,
    pub performance_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Conservative config for production environments
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            timeout: Duration::from_secs(10),
            monitoring: MonitoringConfig {
                log_level: LogLevel::Warn,
                ..MonitoringConfig::default()
            },
        }
    }

    /// Aggressive config for development/testing
    pub fn development() -> Self {
        Self {
            retry: RetryConfig::aggressive(),
            timeout: Duration::from_secs(30),
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
                ..MonitoringConfig::default()
            },
        }
    }

    /// Single attempt, no waits, no structured logging (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 1,
                rate_limit: Backoff::immediate(),
                server_error: Backoff::immediate(),
                auth: Backoff::immediate(),
                transport: Backoff::immediate(),
                processing: None,
                honor_retry_after: false,
                jitter: false,
            },
            timeout: Duration::from_secs(10),
            monitoring: MonitoringConfig {
                correlation_ids: false,
                request_logging: false,
                performance_metrics: false,
                log_level: LogLevel::Error,
            },
        }
    }

    /// Trendyol: initial attempt plus 3 retries, 1s doubling for everything retryable.
    pub fn trendyol() -> Self {
        let backoff = Backoff::exponential(Duration::from_secs(1), 2.0, Duration::from_secs(60));
        Self {
            retry: RetryConfig {
                max_attempts: 4,
                rate_limit: backoff,
                server_error: backoff,
                auth: Backoff::immediate(),
                transport: backoff,
                processing: None,
                honor_retry_after: true,
                jitter: false,
            },
            timeout: Duration::from_secs(10),
            monitoring: MonitoringConfig::default(),
        }
    }

    /// Yemeksepeti: long cooldown on 5xx, 204 means the order is still being processed.
    pub fn yemeksepeti() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 3,
                rate_limit: Backoff::fixed(Duration::from_secs(60)),
                server_error: Backoff::fixed(Duration::from_secs(30 * 60)),
                auth: Backoff::immediate(),
                transport: Backoff::fixed(Duration::from_secs(5)),
                processing: Some(Backoff::fixed(Duration::from_secs(5))),
                honor_retry_after: true,
                jitter: false,
            },
            timeout: Duration::from_secs(10),
            monitoring: MonitoringConfig::default(),
        }
    }

    /// Dodo IS: exponential from 1s, slower responses on statistics endpoints.
    pub fn dodois() -> Self {
        Self {
            retry: RetryConfig::exponential(3, Duration::from_secs(1), 2.0),
            timeout: Duration::from_secs(15),
            monitoring: MonitoringConfig::default(),
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Start from an existing preset
    pub fn from_config(config: ResilienceConfig) -> Self {
        Self { config }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set total attempts per call
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn rate_limit_backoff(mut self, backoff: Backoff) -> Self {
        self.config.retry.rate_limit = backoff;
        self
    }

    pub fn server_error_backoff(mut self, backoff: Backoff) -> Self {
        self.config.retry.server_error = backoff;
        self
    }

    pub fn transport_backoff(mut self, backoff: Backoff) -> Self {
        self.config.retry.transport = backoff;
        self
    }

    pub fn auth_backoff(mut self, backoff: Backoff) -> Self {
        self.config.retry.auth = backoff;
        self
    }

    /// Treat 204 as "processing" and retry it with the given backoff
    pub fn processing_retry(mut self, backoff: Option<Backoff>) -> Self {
        self.config.retry.processing = backoff;
        self
    }

    pub fn honor_retry_after(mut self, enabled: bool) -> Self {
        self.config.retry.honor_retry_after = enabled;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    /// Per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Configure monitoring
    pub fn monitoring_config(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    /// Enable/disable correlation IDs
    pub fn correlation_ids(mut self, enabled: bool) -> Self {
        self.config.monitoring.correlation_ids = enabled;
        self
    }

    /// Enable/disable request logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Enable/disable performance metrics
    pub fn performance_metrics(mut self, enabled: bool) -> Self {
        self.config.monitoring.performance_metrics = enabled;
        self
    }

    /// Set logging level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod timeout_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

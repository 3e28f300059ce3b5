//! Structured logging with correlation tracking for upstream calls
//!
//! Every logical call gets an [`OperationContext`]; attempts, retries and the
//! final outcome are emitted as single-line JSON events carrying its
//! correlation id.

use super::config::{LogLevel, MonitoringConfig};
use super::retry::RetryReason;
use log::{debug, error, info, trace, warn};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Structured logger for API operations with correlation tracking
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for one logical call
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    /// Upstream name, e.g. `trendyol`
    pub upstream: String,
    /// Short operation label, usually `METHOD path`
    pub operation: String,
    pub start_time: Instant,
}

/// Outcome of one logical call, reported when it completes
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    /// Transport calls made, including the first
    pub attempts: u32,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    /// Every wait taken before a retry
    pub waits: Vec<(RetryReason, Duration)>,
    pub reauthentications: u32,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Start tracking a new operation
    pub fn start_operation(&self, upstream: &str, operation: &str) -> OperationContext {
        let correlation_id = if self.config.correlation_ids {
            Uuid::new_v4().to_string()
        } else {
            String::new()
        };

        let context = OperationContext {
            correlation_id,
            upstream: upstream.to_string(),
            operation: operation.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "upstream": context.upstream,
                "operation": context.operation,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            debug!("API Operation Started: {}", log_data);
        }

        context
    }

    pub fn log_request(
        &self,
        context: &OperationContext,
        attempt: u32,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "upstream": context.upstream,
            "attempt": attempt,
            "method": method,
            "url": url,
            "headers": sanitize_headers(headers),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Request: {}", log_data);
    }

    pub fn log_response(&self, context: &OperationContext, attempt: u32, status_code: u16, duration: Duration) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "upstream": context.upstream,
            "attempt": attempt,
            "status_code": status_code,
            "duration_ms": duration.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if status_code >= 400 {
            warn!("HTTP Response (Error): {}", log_data);
        } else {
            debug!("HTTP Response: {}", log_data);
        }
    }

    /// Log a retry decision with the attempt index and the wait it imposes
    pub fn log_retry(&self, context: &OperationContext, attempt: u32, reason: RetryReason, error: &str, wait: Duration) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "retry_attempt",
            "correlation_id": context.correlation_id,
            "upstream": context.upstream,
            "operation": context.operation,
            "attempt": attempt,
            "reason": reason.as_str(),
            "error": error,
            "wait_ms": wait.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Retry Attempt: {}", log_data);
    }

    pub fn log_reauthentication(&self, context: &OperationContext, attempt: u32) {
        if !self.should_log(LogLevel::Info) {
            return;
        }

        let log_data = json!({
            "event": "credential_invalidated",
            "correlation_id": context.correlation_id,
            "upstream": context.upstream,
            "attempt": attempt,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        info!("Credential Invalidated: {}", log_data);
    }

    /// Complete an operation and log metrics
    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        if !self.config.performance_metrics {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "upstream": context.upstream,
            "operation": context.operation,
            "duration_ms": metrics.duration.as_millis(),
            "attempts": metrics.attempts,
            "success": metrics.success,
            "status_code": metrics.status_code,
            "error_message": metrics.error_message,
            "waits_ms": metrics.waits.iter().map(|(_, d)| d.as_millis()).collect::<Vec<_>>(),
            "reauthentications": metrics.reauthentications,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if metrics.success {
            if self.should_log(LogLevel::Info) {
                info!("API Operation Completed: {}", log_data);
            }
        } else if self.should_log(LogLevel::Error) {
            error!("API Operation Failed: {}", log_data);
        }
    }

    /// Attach a value to the trace log for an operation
    pub fn trace_value(&self, context: &OperationContext, key: &str, value: &Value) {
        if self.should_log(LogLevel::Trace) {
            trace!("[{}] {} = {}", context.correlation_id, key, value);
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.log_level
    }
}

/// Replace credential-bearing header values with `[REDACTED]`
pub fn sanitize_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(key, value)| {
            let key_lower = key.to_lowercase();
            let redacted = key_lower.contains("authorization")
                || key_lower.contains("token")
                || key_lower.contains("key")
                || key_lower.contains("secret");
            let value = if redacted { "[REDACTED]".to_string() } else { value.clone() };
            (key.clone(), value)
        })
        .collect()
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Fresh metrics for this context; counters are filled in by the caller
    pub fn create_metrics(&self) -> OperationMetrics {
        OperationMetrics {
            duration: Duration::ZERO,
            attempts: 0,
            success: false,
            status_code: None,
            error_message: None,
            waits: Vec::new(),
            reauthentications: 0,
        }
    }
}

impl OperationMetrics {
    pub fn add_wait(&mut self, reason: RetryReason, wait: Duration) {
        self.waits.push((reason, wait));
    }

    pub fn retries(&self) -> u32 {
        self.waits.len() as u32
    }

    pub fn total_wait(&self) -> Duration {
        self.waits.iter().map(|(_, d)| *d).sum()
    }

    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.duration > threshold
    }
}

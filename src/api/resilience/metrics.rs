//! Call counters aggregated per upstream and per operation
//!
//! The executor reports every finished logical call here. Counters are always
//! kept; tests and the run report read them through [`MetricsCollector::snapshot`].

use super::logging::{OperationContext, OperationMetrics};
use super::retry::RetryReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shared metrics collector; clones feed the same counters
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

#[derive(Debug)]
struct MetricsCollectorInner {
    upstreams: BTreeMap<String, UpstreamMetrics>,
    operations: BTreeMap<String, OperationTypeMetrics>,
    global: GlobalMetrics,
    start_time: Instant,
}

/// Counters for one upstream API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamMetrics {
    pub upstream: String,
    /// Logical calls
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Transport calls, retries included
    pub attempts: u64,
    pub retries: BTreeMap<RetryReason, u64>,
    pub reauthentications: u64,
    pub total_wait: Duration,
    pub status_codes: BTreeMap<u16, u64>,
}

/// Timing for one operation label on one upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationTypeMetrics {
    pub upstream: String,
    pub operation: String,
    pub calls: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub attempts: u64,
    /// Percentage of logical calls that failed
    pub error_rate: f64,
    pub total_wait: Duration,
    pub uptime: Duration,
}

/// Serializable view of all counters at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub global: GlobalMetrics,
    pub upstreams: Vec<UpstreamMetrics>,
    pub operations: Vec<OperationTypeMetrics>,
    pub timestamp: String,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsCollectorInner {
                upstreams: BTreeMap::new(),
                operations: BTreeMap::new(),
                global: GlobalMetrics::default(),
                start_time: Instant::now(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record completion of a logical call
    pub fn record_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        let mut inner = self.lock();
        let uptime = inner.start_time.elapsed();

        inner
            .upstreams
            .entry(context.upstream.clone())
            .or_insert_with(|| UpstreamMetrics::new(&context.upstream))
            .record(metrics);

        let key = format!("{} {}", context.upstream, context.operation);
        inner
            .operations
            .entry(key)
            .or_insert_with(|| OperationTypeMetrics::new(&context.upstream, &context.operation))
            .record(metrics);

        inner.global.record(metrics, uptime);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();

        MetricsSnapshot {
            global: inner.global.clone(),
            upstreams: inner.upstreams.values().cloned().collect(),
            operations: inner.operations.values().cloned().collect(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn upstream(&self, upstream: &str) -> Option<UpstreamMetrics> {
        self.lock().upstreams.get(upstream).cloned()
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.upstreams.clear();
        inner.operations.clear();
        inner.global = GlobalMetrics::default();
        inner.start_time = Instant::now();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamMetrics {
    fn new(upstream: &str) -> Self {
        Self {
            upstream: upstream.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, metrics: &OperationMetrics) {
        self.calls += 1;
        if metrics.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }

        self.attempts += u64::from(metrics.attempts);
        self.reauthentications += u64::from(metrics.reauthentications);
        self.total_wait += metrics.total_wait();

        for (reason, _) in &metrics.waits {
            *self.retries.entry(*reason).or_insert(0) += 1;
        }

        if let Some(status) = metrics.status_code {
            *self.status_codes.entry(status).or_insert(0) += 1;
        }
    }

    /// Retries taken for one reason
    pub fn retries_for(&self, reason: RetryReason) -> u64 {
        self.retries.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_retries(&self) -> u64 {
        self.retries.values().sum()
    }
}

impl OperationTypeMetrics {
    fn new(upstream: &str, operation: &str) -> Self {
        Self {
            upstream: upstream.to_string(),
            operation: operation.to_string(),
            calls: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
        }
    }

    fn record(&mut self, metrics: &OperationMetrics) {
        self.calls += 1;
        if !metrics.success {
            self.failures += 1;
        }
        self.total_duration += metrics.duration;
        self.min_duration = self.min_duration.min(metrics.duration);
        self.max_duration = self.max_duration.max(metrics.duration);
    }

    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(calls) => self.total_duration / calls,
        }
    }
}

impl GlobalMetrics {
    fn record(&mut self, metrics: &OperationMetrics, uptime: Duration) {
        self.calls += 1;
        self.uptime = uptime;
        if metrics.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.attempts += u64::from(metrics.attempts);
        self.total_wait += metrics.total_wait();
        self.error_rate = (self.failures as f64 / self.calls as f64) * 100.0;
    }
}

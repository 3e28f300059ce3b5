//! Resilient request executor
//!
//! Runs one logical call through up to `max_attempts` transport calls. Every
//! outcome goes through the [`RetryPolicy`]; the executor only carries out the
//! decision: attach credentials, sleep, invalidate, parse, or give up.

use super::error::ApiError;
use super::request::RequestDescriptor;
use super::resilience::{
    ApiLogger, MetricsCollector, OperationContext, OperationMetrics, Outcome, ResilienceConfig, RetryAction,
    RetryPolicy, RetryReason,
};
use super::transport::{Authorization, HttpRequest, Transport};
use crate::auth::AuthError;
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Source of bearer tokens for an executor.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token that is valid right now, refreshing first if needed.
    async fn ensure_valid(&self) -> Result<String, AuthError>;

    /// Drop the cached credential after the server rejected it.
    async fn invalidate(&self);
}

/// Executes request descriptors against one upstream
#[derive(Clone)]
pub struct RequestExecutor {
    upstream: String,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    timeout: Duration,
    credentials: Option<Arc<dyn CredentialProvider>>,
    authorization: Option<Authorization>,
    default_headers: BTreeMap<String, String>,
    logger: ApiLogger,
    metrics: MetricsCollector,
}

impl RequestExecutor {
    pub fn new(upstream: impl Into<String>, transport: Arc<dyn Transport>, config: ResilienceConfig) -> Self {
        Self {
            upstream: upstream.into(),
            transport,
            policy: RetryPolicy::new(config.retry),
            timeout: config.timeout,
            credentials: None,
            authorization: None,
            default_headers: BTreeMap::new(),
            logger: ApiLogger::new(config.monitoring),
            metrics: MetricsCollector::new(),
        }
    }

    /// Attach a bearer token from `provider` to every attempt
    pub fn with_credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Fixed credentials (e.g. HTTP Basic); ignored when a provider is set
    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Header sent on every request; descriptor headers win on conflict
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Report into a shared collector instead of a private one
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        self.execute_with_cancel(descriptor, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), aborting with [`ApiError::Cancelled`]
    /// as soon as `cancel` fires during a wait or an in-flight call.
    pub async fn execute_with_cancel(
        &self,
        descriptor: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = descriptor.url()?;
        let context = self
            .logger
            .start_operation(&self.upstream, &operation_label(&descriptor));
        let mut metrics = context.create_metrics();

        let result = self
            .run_attempts(&descriptor, &url, cancel, &context, &mut metrics)
            .await;

        metrics.duration = context.elapsed();
        metrics.success = result.is_ok();
        if let Err(err) = &result {
            metrics.error_message = Some(err.to_string());
        }
        self.logger.complete_operation(&context, &metrics);
        self.metrics.record_operation(&context, &metrics);

        result
    }

    async fn run_attempts(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
        cancel: &CancellationToken,
        context: &OperationContext,
        metrics: &mut OperationMetrics,
    ) -> Result<Value, ApiError> {
        let max_attempts = self.policy.max_attempts();
        let timeout = descriptor.timeout().unwrap_or(self.timeout);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let authorization = match &self.credentials {
                Some(provider) => {
                    let token = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        token = provider.ensure_valid() => token?,
                    };
                    Some(Authorization::Bearer(token))
                }
                None => self.authorization.clone(),
            };

            let mut headers = self.default_headers.clone();
            headers.extend(descriptor.headers().iter().map(|(k, v)| (k.clone(), v.clone())));

            self.logger
                .log_request(context, attempt, descriptor.method().as_str(), url, &headers);

            let request = HttpRequest {
                method: descriptor.method(),
                url: url.to_string(),
                headers,
                body: descriptor.body().cloned(),
                authorization,
                timeout,
            };

            metrics.attempts += 1;
            let started = Instant::now();
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                sent = self.transport.send(request) => sent,
            };

            let decision = match &sent {
                Ok(response) => {
                    self.logger
                        .log_response(context, attempt, response.status, started.elapsed());
                    metrics.status_code = Some(response.status);
                    self.policy.decide(&Outcome::Response(response), attempt)
                }
                Err(failure) => {
                    debug!("{} attempt {} transport failure: {}", self.upstream, attempt, failure);
                    self.policy.decide(&Outcome::Transport(failure), attempt)
                }
            };

            if decision.invalidate_credentials {
                if let Some(provider) = &self.credentials {
                    provider.invalidate().await;
                    metrics.reauthentications += 1;
                    self.logger.log_reauthentication(context, attempt);
                }
            }

            match decision.action {
                RetryAction::Success => {
                    return match sent {
                        Ok(response) => Ok(parse_body(&response.body)),
                        Err(failure) => Err(ApiError::Transport(failure.to_string())),
                    };
                }
                RetryAction::Fail => {
                    return Err(decision
                        .error
                        .unwrap_or_else(|| ApiError::Transport("unclassified failure".to_string())));
                }
                RetryAction::Retry => {
                    let reason = decision.reason.unwrap_or(RetryReason::Transport);
                    let message = decision.error.as_ref().map(ToString::to_string).unwrap_or_default();
                    self.logger
                        .log_retry(context, attempt, reason, &message, decision.wait);
                    metrics.add_wait(reason, decision.wait);
                    last_error = decision.error;

                    sleep_or_cancel(decision.wait, cancel).await?;
                }
            }
        }

        Err(ApiError::ExhaustedRetries {
            attempts: max_attempts,
            last_error: last_error.map(Box::new),
        })
    }
}

/// Sleep for `wait` unless `cancel` fires first.
pub async fn sleep_or_cancel(wait: Duration, cancel: &CancellationToken) -> Result<(), ApiError> {
    if wait.is_zero() {
        return if cancel.is_cancelled() {
            Err(ApiError::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        _ = tokio::time::sleep(wait) => Ok(()),
    }
}

/// Empty body is `null`; a body that is not JSON comes back as a string.
pub fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn operation_label(descriptor: &RequestDescriptor) -> String {
    let path = reqwest::Url::parse(descriptor.target())
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| descriptor.target().to_string());
    format!("{} {}", descriptor.method(), path)
}

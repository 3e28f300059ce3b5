//! Classified errors raised by the request executor and the pagination layer

use std::time::Duration;
use thiserror::Error;

/// Error returned by a logical call once the retry loop gives up, or when a
/// fatal condition is met.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Connection refused, timeout, DNS and other failures below HTTP.
    #[error("transport failure: {0}")]
    Transport(String),

    /// HTTP 429.
    #[error("rate limited (429): {body}")]
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },

    /// HTTP 5xx.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// HTTP 401/403, or a failed login/refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other 4xx. Never retried.
    #[error("client error {status}: {body}")]
    Client { status: u16, body: String },

    /// The server kept answering 204 "not ready yet".
    #[error("server still processing the request")]
    Processing,

    /// All attempts were used up.
    #[error("max retries exceeded after {attempts} attempts{}", last_error_suffix(.last_error))]
    ExhaustedRetries {
        attempts: u32,
        last_error: Option<Box<ApiError>>,
    },

    /// A listing response without a recognisable item collection.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A successful response whose body could not be used.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The descriptor could not be turned into a request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The cancellation token fired before or between attempts.
    #[error("operation cancelled")]
    Cancelled,
}

fn last_error_suffix(last_error: &Option<Box<ApiError>>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {err})"),
        None => String::new(),
    }
}

impl ApiError {
    /// Build the error matching an HTTP status and its body text.
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let body = body.into();
        match status {
            429 => ApiError::RateLimited { retry_after, body },
            401 | 403 => ApiError::Auth(format!("{status}: {body}")),
            204 => ApiError::Processing,
            500..=599 => ApiError::Server { status, body },
            _ => ApiError::Client { status, body },
        }
    }

    /// Status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Server { status, .. } | ApiError::Client { status, .. } => Some(*status),
            ApiError::ExhaustedRetries { last_error: Some(err), .. } => err.status(),
            _ => None,
        }
    }

    /// Fatal errors end the attempt loop immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiError::Client { .. }
                | ApiError::ExhaustedRetries { .. }
                | ApiError::Decode(_)
                | ApiError::InvalidRequest(_)
                | ApiError::Cancelled
        )
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        ApiError::Auth(err.to_string())
    }
}

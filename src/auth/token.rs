use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the credential held by a token manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
    /// Nothing acquired yet
    Uninitialized,
    Valid,
    /// Held but inside the safety margin of its expiry
    Expired,
    /// Cleared after a rejection or a failed refresh
    Invalid,
}

/// Bearer credential, replaced as a whole on every refresh
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at: issued_at + lifetime,
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Usable at `now` with at least `margin` to spare
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_respects_margin() {
        let now = Utc::now();
        let credential = Credential::new("t", now, Duration::seconds(60));

        assert!(credential.is_fresh(now, Duration::seconds(30)));
        assert!(!credential.is_fresh(now + Duration::seconds(30), Duration::seconds(30)));
        assert!(!credential.is_fresh(now + Duration::seconds(90), Duration::zero()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::new("secret-token", Utc::now(), Duration::seconds(60))
            .with_refresh_token(Some("secret-refresh".into()));
        let debug = format!("{credential:?}");

        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("secret-refresh"));
    }
}

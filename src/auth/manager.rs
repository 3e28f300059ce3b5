//! Bearer token lifecycle
//!
//! A [`TokenManager`] owns one credential behind an async mutex. Concurrent
//! callers queue on the mutex, so at most one grant exchange is in flight and
//! everyone behind it sees the new credential.

use super::error::AuthError;
use super::grant::TokenGrant;
use super::token::{Credential, TokenState};
use crate::api::executor::CredentialProvider;
use crate::api::transport::Transport;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Refresh this long before the credential actually expires
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 30;
/// Assumed lifetime when the token endpoint does not state one
pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Result of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// The new credential is installed but the rotated refresh token could
    /// not be written to the secret store.
    PersistFailed(String),
}

#[derive(Debug)]
struct TokenSlot {
    state: TokenState,
    credential: Option<Credential>,
    /// Set while the secret store holds a spent refresh token
    persist_failure: Option<String>,
}

pub struct TokenManager {
    name: String,
    grant: Arc<dyn TokenGrant>,
    transport: Arc<dyn Transport>,
    safety_margin: Duration,
    default_lifetime: Duration,
    slot: Mutex<TokenSlot>,
    refreshes: AtomicU32,
}

impl TokenManager {
    pub fn new(name: impl Into<String>, grant: Arc<dyn TokenGrant>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            grant,
            transport,
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS),
            default_lifetime: Duration::seconds(DEFAULT_LIFETIME_SECS),
            slot: Mutex::new(TokenSlot {
                state: TokenState::Uninitialized,
                credential: None,
                persist_failure: None,
            }),
            refreshes: AtomicU32::new(0),
        }
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grant exchanges attempted so far, failed ones included
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> TokenState {
        let slot = self.slot.lock().await;
        match (&slot.state, &slot.credential) {
            (TokenState::Valid, Some(credential)) if !credential.is_fresh(Utc::now(), self.safety_margin) => {
                TokenState::Expired
            }
            (state, _) => *state,
        }
    }

    /// Current credential, if one is held (fresh or not)
    pub async fn credential(&self) -> Option<Credential> {
        self.slot.lock().await.credential.clone()
    }

    /// Return a usable token, refreshing first when the credential is absent,
    /// invalid, or inside the safety margin.
    pub async fn ensure_valid(&self) -> Result<String, AuthError> {
        let mut slot = self.slot.lock().await;

        if slot.state == TokenState::Valid {
            if let Some(credential) = &slot.credential {
                if credential.is_fresh(Utc::now(), self.safety_margin) {
                    return Ok(credential.token.clone());
                }
                debug!("{}: credential expires at {}, refreshing", self.name, credential.expires_at);
                slot.state = TokenState::Expired;
            }
        }

        self.refresh_locked(&mut slot).await?;
        slot.credential
            .as_ref()
            .map(|credential| credential.token.clone())
            .ok_or_else(|| AuthError::InvalidResponse("no credential after refresh".to_string()))
    }

    /// Exchange the grant now, regardless of the current state
    pub async fn refresh(&self) -> Result<RefreshOutcome, AuthError> {
        let mut slot = self.slot.lock().await;
        self.refresh_locked(&mut slot).await
    }

    /// Last rotated refresh token that could not be written to the secret
    /// store, cleared by the call. Refreshes made through `ensure_valid`
    /// report it only here.
    pub async fn take_persist_failure(&self) -> Option<String> {
        self.slot.lock().await.persist_failure.take()
    }

    /// Forget the credential; the next `ensure_valid` performs a refresh
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        slot.credential = None;
        slot.state = TokenState::Invalid;
        info!("{}: credential invalidated", self.name);
    }

    async fn refresh_locked(&self, slot: &mut TokenSlot) -> Result<RefreshOutcome, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        let response = match self.grant.exchange(self.transport.as_ref()).await {
            Ok(response) => response,
            Err(err) => {
                error!("{}: token refresh failed: {}", self.name, err);
                slot.credential = None;
                slot.state = TokenState::Invalid;
                return Err(err);
            }
        };

        let lifetime = response
            .expires_in
            .map(Duration::seconds)
            .unwrap_or(self.default_lifetime);
        let credential = Credential::new(response.access_token, Utc::now(), lifetime)
            .with_refresh_token(response.refresh_token.clone());

        let outcome = match &response.refresh_token {
            Some(rotated) => match self.grant.persist_rotation(rotated).await {
                Ok(()) => {
                    slot.persist_failure = None;
                    RefreshOutcome::Refreshed
                }
                Err(err) => {
                    warn!("{}: new refresh token could not be persisted: {}", self.name, err);
                    slot.persist_failure = Some(err.to_string());
                    RefreshOutcome::PersistFailed(err.to_string())
                }
            },
            None => RefreshOutcome::Refreshed,
        };

        info!("{}: credential refreshed, valid until {}", self.name, credential.expires_at);
        slot.credential = Some(credential);
        slot.state = TokenState::Valid;

        Ok(outcome)
    }
}

#[async_trait]
impl CredentialProvider for TokenManager {
    async fn ensure_valid(&self) -> Result<String, AuthError> {
        TokenManager::ensure_valid(self).await
    }

    async fn invalidate(&self) {
        TokenManager::invalidate(self).await
    }
}

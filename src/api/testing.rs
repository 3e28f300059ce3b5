//! Scripted doubles shared by the unit tests

use super::transport::{HttpRequest, HttpResponse, Transport, TransportFailure};
use crate::api::executor::CredentialProvider;
use crate::auth::AuthError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Transport that replays a fixed script and records every request.
/// Once the script runs out, the last entry is repeated.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
    last: Mutex<Option<Result<HttpResponse, TransportFailure>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, TransportFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responses(responses: Vec<HttpResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(entry) => {
                *last = Some(entry.clone());
                entry
            }
            None => last.clone().expect("scripted transport has an empty script"),
        }
    }
}

/// Credential provider handing out numbered tokens: `token-1`, `token-2`, ...
/// A new token is minted only after an invalidation.
pub struct CountingCredentials {
    issued: AtomicU32,
    valid: Mutex<bool>,
    invalidations: AtomicU32,
}

impl CountingCredentials {
    pub fn new() -> Self {
        Self {
            issued: AtomicU32::new(0),
            valid: Mutex::new(false),
            invalidations: AtomicU32::new(0),
        }
    }

    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> u32 {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn ensure_valid(&self) -> Result<String, AuthError> {
        let mut valid = self.valid.lock().unwrap();
        if !*valid {
            self.issued.fetch_add(1, Ordering::SeqCst);
            *valid = true;
        }
        Ok(format!("token-{}", self.issued()))
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        *self.valid.lock().unwrap() = false;
    }
}

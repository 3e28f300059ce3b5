//! Credential acquisition and storage
//!
//! Grants exchange secrets for bearer tokens, the [`TokenManager`] caches
//! and refreshes them, and [`SecretStore`]s hold the long-lived secrets.

pub mod error;
pub mod grant;
pub mod manager;
pub mod store;
pub mod token;

pub use error::{AuthError, StoreError};
pub use grant::{GrantResponse, PasswordGrant, RefreshTokenGrant, TokenGrant};
pub use manager::{RefreshOutcome, TokenManager};
pub use store::{EnvFileStore, MemorySecretStore, SecretStore};
pub use token::{Credential, TokenState};

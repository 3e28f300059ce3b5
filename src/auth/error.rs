use thiserror::Error;

/// Failure to obtain a bearer credential. Never retried by the token manager.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("missing secret '{0}'")]
    MissingSecret(String),

    #[error("token endpoint rejected the grant ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Failure to read or write the secret store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secret store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse secret store {path}: {message}")]
    Parse { path: String, message: String },

    #[error("secret store is read-only")]
    ReadOnly,
}

//! Error taxonomy for the Agentbox client.
//!
//! One enum covers the whole workspace. Variants carry string payloads so
//! the type stays `Clone`: single-flight waiters all receive the same
//! failure, which requires cloning it once per waiter.
//!
//! Classification rules:
//! - `Config` is fatal at session acquisition and never retried.
//! - `Unauthorized` is produced only after the single forced
//!   re-authentication retry has also seen a 401.
//! - `Storage` is swallowed on cache *write* paths (best-effort caching)
//!   and surfaced on read paths.
//! - `Contract` aborts the retrieval that observed it, nothing else.

use thiserror::Error;

/// Unified error type for Agentbox client operations
#[derive(Debug, Clone, Error)]
pub enum AgentboxError {
    /// Missing or invalid configuration (credentials, base URL, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The authentication collaborator failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The backend rejected the request with 401 even after a forced
    /// re-authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport-level failure (connect, timeout, TLS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response other than 401
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A payload did not match its declared schema
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The listing endpoint violated the envelope contract
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Cache store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Caller-supplied input was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bug or broken invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentboxError {
    /// True when retrying the same operation could plausibly succeed.
    ///
    /// `Config`, `Contract` and `InvalidInput` are deterministic; retrying
    /// them only repeats the failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { status: 500..=599, .. })
    }
}

impl From<serde_json::Error> for AgentboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AgentboxError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for Agentbox client operations
pub type Result<T> = std::result::Result<T, AgentboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(AgentboxError::Network("reset".into()).is_retryable());
        assert!(AgentboxError::Api { status: 503, message: "unavailable".into() }.is_retryable());
        assert!(!AgentboxError::Api { status: 404, message: "missing".into() }.is_retryable());
        assert!(!AgentboxError::Config("no password".into()).is_retryable());
        assert!(!AgentboxError::Contract("no item key".into()).is_retryable());
    }

    #[test]
    fn errors_clone_for_shared_waiters() {
        let err = AgentboxError::Auth("login rejected".into());
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn display_includes_status() {
        let err = AgentboxError::Api { status: 422, message: "bad filter".into() };
        assert!(err.to_string().contains("422"));
    }
}

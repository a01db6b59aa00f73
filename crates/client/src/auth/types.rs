//! Shared authentication types.

use std::fmt;

use agentbox_common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Username and password for the form login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

// Manual impl so the password never lands in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Proof of an authenticated session, as cached and replayed on every
/// request.
///
/// `cookie` is the full `Cookie` header value; `csrf_token` goes into the
/// `x-csrf-token` header for mutating calls. Unknown fields are rejected on
/// deserialization so a stale cache schema surfaces as an error instead of
/// silently half-loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthState {
    pub cookie: String,
    pub csrf_token: String,
}

impl AuthState {
    #[must_use]
    pub fn new(cookie: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self { cookie: cookie.into(), csrf_token: csrf_token.into() }
    }
}

/// Strategy for obtaining a fresh [`AuthState`].
///
/// Implementations perform the whole interactive exchange against the
/// backend; the session layer handles caching, coalescing of concurrent
/// logins, and retry-on-401.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate against `base_url` and return the resulting state.
    ///
    /// # Errors
    /// `Auth` when the backend rejects the credentials or the exchange does
    /// not produce the expected cookies; `Network` for transport failures.
    async fn authenticate(&self, base_url: &Url, credentials: &Credentials) -> Result<AuthState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("agent@example.com", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("agent@example.com"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn auth_state_rejects_unknown_fields() {
        let raw = r#"{"cookie":"a=b","csrf_token":"tok","extra":1}"#;
        assert!(serde_json::from_str::<AuthState>(raw).is_err());
    }

    #[test]
    fn auth_state_round_trips() {
        let state = AuthState::new("sid=abc; xsrf=def", "def");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<AuthState>(&json).unwrap(), state);
    }
}

//! Process-wide session registry.
//!
//! One registry owns the shared cache store, HTTP client, and authenticator
//! strategy; sessions are created on first use and handed out as clones of
//! the same [`Arc`] afterwards, so two callers asking for the same username
//! share credentials, auth cache, and the concurrency limiter.

use std::collections::HashMap;
use std::sync::Arc;

use agentbox_common::cache::{CacheScope, KvStore};
use agentbox_common::{AgentboxError, Result};
use parking_lot::RwLock;
use tracing::info;
use url::Url;

use crate::auth::{Authenticator, FormLoginAuthenticator};
use crate::config::ClientConfig;
use crate::http::HttpClient;

use super::Session;

/// Creates and caches [`Session`]s keyed by username.
pub struct SessionRegistry {
    default_base_url: Option<Url>,
    cache_root: CacheScope,
    authenticator: Arc<dyn Authenticator>,
    http: HttpClient,
    max_concurrent_requests: usize,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("default_base_url", &self.default_base_url.as_ref().map(Url::as_str))
            .field("sessions", &self.sessions.read().len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Build a registry from configuration, using the form-login strategy.
    ///
    /// # Errors
    /// `Storage` when the cache store cannot be prepared, `Network` when
    /// the HTTP client cannot be constructed, `Config` for an invalid
    /// concurrency bound.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_authenticator(config, Arc::new(FormLoginAuthenticator::new()))
    }

    /// Build a registry with an explicit authentication strategy.
    ///
    /// # Errors
    /// Same conditions as [`SessionRegistry::new`].
    pub fn with_authenticator(
        config: &ClientConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        if config.max_concurrent_requests == 0 {
            return Err(AgentboxError::Config("concurrency bound must be at least 1".into()));
        }
        let store = Arc::new(KvStore::new(&config.cache_dir, config.cache_clean)?);
        Ok(Self {
            default_base_url: config.base_url.clone(),
            cache_root: CacheScope::root(store),
            authenticator,
            http: HttpClient::new()?,
            max_concurrent_requests: config.max_concurrent_requests,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Look up the session for `username`, creating it on first use.
    ///
    /// After the first call for a username, `password` and `base_url` are
    /// ignored; the existing session is returned as-is.
    ///
    /// # Errors
    /// `Config` when the session does not exist yet and `password` is
    /// absent, or no base URL is available from either the argument or the
    /// registry default.
    pub fn get_or_create(
        &self,
        username: &str,
        password: Option<&str>,
        base_url: Option<Url>,
    ) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.read().get(username) {
            return Ok(Arc::clone(session));
        }

        let mut sessions = self.sessions.write();
        // Lost the race: someone else created it between the locks.
        if let Some(session) = sessions.get(username) {
            return Ok(Arc::clone(session));
        }

        let password = password.ok_or_else(|| {
            AgentboxError::Config(format!("password required to create a session for {username}"))
        })?;
        let base_url = base_url.or_else(|| self.default_base_url.clone()).ok_or_else(|| {
            AgentboxError::Config(format!("no base URL available for session {username}"))
        })?;

        let session = Arc::new(
            Session::builder()
                .username(username)
                .password(password)
                .base_url(base_url)
                .cache(self.cache_root.clone())
                .authenticator(Arc::clone(&self.authenticator))
                .http(self.http.clone())
                .max_concurrent_requests(self.max_concurrent_requests)
                .build()?,
        );
        info!(username, "created session");
        sessions.insert(username.to_owned(), Arc::clone(&session));
        Ok(session)
    }

    /// The session for `username`, if one has been created.
    #[must_use]
    pub fn get(&self, username: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(username).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn test_config(dir: &TempDir) -> ClientConfig {
        ClientConfig {
            base_url: Some(Url::parse("http://127.0.0.1:1").unwrap()),
            cache_dir: dir.path().to_path_buf(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn same_username_yields_the_same_session() {
        let dir = TempDir::new().unwrap();
        let registry = SessionRegistry::new(&test_config(&dir)).unwrap();

        let first = registry.get_or_create("agent@example.com", Some("hunter2"), None).unwrap();
        let second = registry.get_or_create("agent@example.com", None, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get("agent@example.com").is_some());
    }

    #[test]
    fn first_construction_requires_a_password() {
        let dir = TempDir::new().unwrap();
        let registry = SessionRegistry::new(&test_config(&dir)).unwrap();

        let result = registry.get_or_create("agent@example.com", None, None);
        assert!(matches!(result, Err(AgentboxError::Config(_))));
    }

    #[test]
    fn missing_base_url_everywhere_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.base_url = None;
        let registry = SessionRegistry::new(&config).unwrap();

        let result = registry.get_or_create("agent@example.com", Some("hunter2"), None);
        assert!(matches!(result, Err(AgentboxError::Config(_))));
    }

    #[test]
    fn explicit_base_url_overrides_the_default() {
        let dir = TempDir::new().unwrap();
        let registry = SessionRegistry::new(&test_config(&dir)).unwrap();

        let custom = Url::parse("http://198.51.100.7:8080").unwrap();
        let session = registry
            .get_or_create("agent@example.com", Some("hunter2"), Some(custom.clone()))
            .unwrap();
        assert_eq!(session.base_url(), &custom);
    }
}

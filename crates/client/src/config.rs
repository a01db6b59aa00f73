//! Client configuration
//!
//! Loaded once at process start from `AGENTBOX_*` environment variables
//! (a `.env` file is honored via dotenvy). There is no runtime
//! reconfiguration.
//!
//! ## Environment Variables
//! - `AGENTBOX_BASE_URL`: admin backend base URL (required unless supplied
//!   per session)
//! - `AGENTBOX_USERNAME` / `AGENTBOX_PASSWORD`: default account for
//!   sessions created without explicit credentials
//! - `AGENTBOX_CACHE_DIR`: cache directory or `.sqlite3` file path
//!   (default `.cache`)
//! - `AGENTBOX_CACHE_CLEAN`: `1`/`true` removes the cache file on startup
//! - `AGENTBOX_MAX_REQUESTS`: per-session concurrent request bound
//!   (default 5)

use std::path::PathBuf;

use agentbox_common::{AgentboxError, Result};
use tracing::debug;
use url::Url;

use crate::constants::MAX_CONCURRENT_REQUESTS;

/// Process-wide client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Default admin backend base URL for new sessions
    pub base_url: Option<Url>,
    /// Default account username
    pub username: Option<String>,
    /// Default account password
    pub password: Option<String>,
    /// Directory (or `.sqlite3` file) backing the durable cache
    pub cache_dir: PathBuf,
    /// Remove the cache file before first open
    pub cache_clean: bool,
    /// Bound on a session's concurrent outbound requests
    pub max_concurrent_requests: usize,
}

// Manual impl so the password never lands in logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cache_dir", &self.cache_dir)
            .field("cache_clean", &self.cache_clean)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            password: None,
            cache_dir: PathBuf::from(".cache"),
            cache_clean: false,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    /// `Config` if a variable that is present fails to parse.
    pub fn load() -> Result<Self> {
        // A missing .env file is fine; explicit env vars still apply.
        let _ = dotenvy::dotenv();

        let base_url = match std::env::var("AGENTBOX_BASE_URL") {
            Ok(raw) => Some(Url::parse(&raw).map_err(|e| {
                AgentboxError::Config(format!("invalid AGENTBOX_BASE_URL {raw:?}: {e}"))
            })?),
            Err(_) => None,
        };

        let username = std::env::var("AGENTBOX_USERNAME").ok();
        let password = std::env::var("AGENTBOX_PASSWORD").ok();

        let cache_dir = std::env::var("AGENTBOX_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".cache"));

        let cache_clean = env_bool("AGENTBOX_CACHE_CLEAN");

        let max_concurrent_requests = match std::env::var("AGENTBOX_MAX_REQUESTS") {
            Ok(raw) => {
                let parsed = raw.parse::<usize>().map_err(|e| {
                    AgentboxError::Config(format!("invalid AGENTBOX_MAX_REQUESTS {raw:?}: {e}"))
                })?;
                if parsed == 0 {
                    return Err(AgentboxError::Config(
                        "AGENTBOX_MAX_REQUESTS must be greater than 0".into(),
                    ));
                }
                parsed
            }
            Err(_) => MAX_CONCURRENT_REQUESTS,
        };

        let config =
            Self { base_url, username, password, cache_dir, cache_clean, max_concurrent_requests };
        debug!(?config, "configuration loaded from environment");
        Ok(config)
    }
}

fn env_bool(name: &str) -> bool {
    std::env::var(name).as_deref().is_ok_and(parse_bool)
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw, "1" | "true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from(".cache"));
        assert!(!config.cache_clean);
        assert_eq!(config.max_concurrent_requests, 5);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn debug_redacts_the_password() {
        let config = ClientConfig {
            username: Some("agent@example.com".into()),
            password: Some("hunter2".into()),
            ..ClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("agent@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn bool_flags_accept_one_and_true() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("TRUE"));
    }
}

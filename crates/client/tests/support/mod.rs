//! Shared helpers for the client integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agentbox_client::auth::{AuthState, Authenticator, Credentials};
use agentbox_client::Session;
use agentbox_common::cache::{CacheScope, KvStore};
use agentbox_common::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use url::Url;
use wiremock::MockServer;

/// Authenticator stub that mints sequenced cookie generations and counts
/// how often it ran.
pub struct SequencedAuthenticator {
    logins: AtomicUsize,
}

impl SequencedAuthenticator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { logins: AtomicUsize::new(0) })
    }

    pub fn count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for SequencedAuthenticator {
    async fn authenticate(&self, _base_url: &Url, _credentials: &Credentials) -> Result<AuthState> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AuthState::new(format!("SESSION=gen-{n}"), format!("csrf-{n}")))
    }
}

/// A session against the mock server with a fresh temp-backed cache.
///
/// The [`TempDir`] must outlive the session or the cache file disappears
/// under it.
pub fn session_for(
    server: &MockServer,
    authenticator: Arc<dyn Authenticator>,
    max_concurrent: usize,
) -> (TempDir, Arc<Session>) {
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(KvStore::new(dir.path(), false).expect("open cache store"));
    let session = Session::builder()
        .username("agent@example.com")
        .password("hunter2")
        .base_url(Url::parse(&server.uri()).expect("parse mock server URI"))
        .cache(CacheScope::root(store))
        .authenticator(authenticator)
        .max_concurrent_requests(max_concurrent)
        .build()
        .expect("build session");
    (dir, Arc::new(session))
}

/// Enveloped listing page whose item ids span `first..first + count`.
pub fn contacts_page(total: u64, first: u64, count: u64) -> Value {
    let items: Vec<Value> = (first..first + count).map(|id| json!({ "id": id })).collect();
    json!({
        "response": {
            "items": total.to_string(),
            "current": "1",
            "last": total.div_ceil(100).max(1).to_string(),
            "contacts": items,
        }
    })
}

/// Enveloped listing page with no items.
pub fn empty_contacts_page(total: u64) -> Value {
    contacts_page(total, 0, 0)
}

//! Integration tests for the session orchestrator against a mock backend.
//!
//! Coverage:
//! - Concurrent cold-cache dispatches trigger exactly one login
//! - The dispatch queue actually bounds in-flight requests
//! - A mid-run credential expiry heals through one forced re-login
//! - Auth material persists across sessions sharing a cache directory

#![allow(dead_code)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use agentbox_client::auth::{AuthState, Authenticator};
use agentbox_client::{AgentboxError, RequestSpec, Session};
use agentbox_common::cache::{CacheScope, KvStore};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{session_for, SequencedAuthenticator};

#[tokio::test]
async fn concurrent_cold_dispatches_log_in_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(10)
        .mount(&server)
        .await;

    let authenticator = SequencedAuthenticator::new();
    let (_dir, session) = session_for(&server, authenticator.clone(), 5);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.dispatch(RequestSpec::get("/ping")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(authenticator.count(), 1);
}

#[tokio::test]
async fn dispatch_queue_bounds_in_flight_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(60)))
        .expect(8)
        .mount(&server)
        .await;

    let (_dir, session) = session_for(&server, SequencedAuthenticator::new(), 2);

    // 8 requests of 60 ms each through a bound of 2 cannot finish in fewer
    // than 4 sequential waves.
    let started = std::time::Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.dispatch(RequestSpec::get("/slow")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(started.elapsed() >= Duration::from_millis(240), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn expired_credentials_heal_through_one_relogin() {
    let server = MockServer::start().await;
    // The backend only honors second-generation cookies.
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .and(header("cookie", "SESSION=gen-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .and(header("cookie", "SESSION=gen-2"))
        .and(header("x-csrf-token", "csrf-2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let authenticator = SequencedAuthenticator::new();
    let (_dir, session) = session_for(&server, authenticator.clone(), 5);

    let response = session.dispatch(RequestSpec::get("/contacts")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(authenticator.count(), 2);

    // The refreshed material is cached; the next dispatch reuses it.
    let response = session.dispatch(RequestSpec::get("/contacts")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(authenticator.count(), 2);
}

#[tokio::test]
async fn persistent_rejection_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let (_dir, session) = session_for(&server, SequencedAuthenticator::new(), 5);
    let result = session.dispatch(RequestSpec::get("/contacts")).await;
    assert!(matches!(result, Err(AgentboxError::Unauthorized(_))));
}

#[tokio::test]
async fn auth_material_survives_a_session_rebuild() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let build = |authenticator: Arc<dyn Authenticator>| {
        let store = Arc::new(KvStore::new(dir.path(), false).unwrap());
        Session::builder()
            .username("agent@example.com")
            .password("hunter2")
            .base_url(Url::parse(&server.uri()).unwrap())
            .cache(CacheScope::root(store))
            .authenticator(authenticator)
            .build()
            .unwrap()
    };

    let first_auth = SequencedAuthenticator::new();
    let session = build(first_auth.clone());
    let original: AuthState = session.login(false).await.unwrap();
    assert_eq!(first_auth.count(), 1);
    drop(session);

    // A rebuilt session for the same user finds the cached material and
    // never invokes its authenticator.
    let second_auth = SequencedAuthenticator::new();
    let session = build(second_auth.clone());
    let revived = session.login(false).await.unwrap();
    assert_eq!(revived, original);
    assert_eq!(second_auth.count(), 0);
}

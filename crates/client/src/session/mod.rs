//! Authenticated session against one admin backend account.
//!
//! A [`Session`] ties together the collaborators that govern every call:
//! the dispatch queue bounds outbound concurrency, the single-flight slot
//! collapses concurrent logins into one, and the per-user cache scope
//! persists [`AuthState`] across processes. Request semantics follow the
//! admin panel itself: cached credentials are replayed as cookies, a 401
//! triggers exactly one forced re-login and resend, and a second 401 is
//! final.

mod registry;

pub use registry::SessionRegistry;

use std::sync::Arc;

use agentbox_common::cache::CacheScope;
use agentbox_common::resilience::{DispatchQueue, SingleFlight};
use agentbox_common::{AgentboxError, Result};
use futures::Stream;
use reqwest::header::COOKIE;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{AuthState, Authenticator, Credentials};
use crate::constants::{AUTH_CACHE_KEY, AUTH_TTL, CSRF_HEADER, MAX_CONCURRENT_REQUESTS};
use crate::http::HttpClient;
use crate::search;
use crate::types::{ApiEnvelope, RequestParameters, RequestSpec};

/// One authenticated account against one backend.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct Session {
    username: String,
    credentials: Credentials,
    base_url: Url,
    cache: CacheScope,
    queue: DispatchQueue,
    login_flight: SingleFlight<AuthState, AgentboxError>,
    authenticator: Arc<dyn Authenticator>,
    http: HttpClient,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("base_url", &self.base_url.as_str())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Session`]. Used directly in tests; production code goes
/// through [`SessionRegistry`].
pub struct SessionBuilder {
    username: Option<String>,
    password: Option<String>,
    base_url: Option<Url>,
    cache: Option<CacheScope>,
    authenticator: Option<Arc<dyn Authenticator>>,
    http: Option<HttpClient>,
    max_concurrent_requests: usize,
}

impl SessionBuilder {
    fn new() -> Self {
        Self {
            username: None,
            password: None,
            base_url: None,
            cache: None,
            authenticator: None,
            http: None,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
        }
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Cache scope shared across sessions; the builder derives the
    /// per-user child scope from it.
    #[must_use]
    pub fn cache(mut self, root: CacheScope) -> Self {
        self.cache = Some(root);
        self
    }

    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    #[must_use]
    pub fn http(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn max_concurrent_requests(mut self, bound: usize) -> Self {
        self.max_concurrent_requests = bound;
        self
    }

    /// Assemble the session.
    ///
    /// # Errors
    /// `Config` when username, password, base URL, or cache scope are
    /// missing, or the concurrency bound is zero.
    pub fn build(self) -> Result<Session> {
        let username =
            self.username.ok_or_else(|| AgentboxError::Config("username is required".into()))?;
        let password =
            self.password.ok_or_else(|| AgentboxError::Config("password is required".into()))?;
        let base_url =
            self.base_url.ok_or_else(|| AgentboxError::Config("base URL is required".into()))?;
        let root =
            self.cache.ok_or_else(|| AgentboxError::Config("cache scope is required".into()))?;
        if self.max_concurrent_requests == 0 {
            return Err(AgentboxError::Config("concurrency bound must be at least 1".into()));
        }
        let authenticator = match self.authenticator {
            Some(authenticator) => authenticator,
            None => Arc::new(crate::auth::FormLoginAuthenticator::new()),
        };
        let http = match self.http {
            Some(http) => http,
            None => HttpClient::new()?,
        };

        let cache = root.scope(username.as_str());
        Ok(Session {
            credentials: Credentials::new(username.clone(), password),
            username,
            base_url,
            cache,
            queue: DispatchQueue::new(self.max_concurrent_requests),
            login_flight: SingleFlight::new(),
            authenticator,
            http,
        })
    }
}

impl Session {
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Obtain authentication material.
    ///
    /// With `force == false`, cached non-expired material is returned
    /// without touching the network or the coalescer. Otherwise the
    /// authenticator runs behind the single-flight slot; every concurrent
    /// caller of the same generation receives the same outcome, and a
    /// successful login is cached for 24 hours.
    ///
    /// # Errors
    /// Whatever the authenticator fails with, shared across all coalesced
    /// callers of that generation.
    pub async fn login(&self, force: bool) -> Result<AuthState> {
        if !force {
            match self.cache.get::<AuthState>(AUTH_CACHE_KEY).await {
                Ok(Some(auth)) => return Ok(auth),
                Ok(None) => {}
                Err(err) => {
                    warn!(username = %self.username, error = %err,
                        "cached auth unreadable, re-authenticating");
                }
            }
        }

        let authenticator = Arc::clone(&self.authenticator);
        let base_url = self.base_url.clone();
        let credentials = self.credentials.clone();
        let cache = self.cache.clone();
        let username = self.username.clone();
        self.login_flight
            .run(move || async move {
                info!(username = %username, force, "authenticating");
                let auth = authenticator.authenticate(&base_url, &credentials).await?;
                cache.set(AUTH_CACHE_KEY, &auth, Some(AUTH_TTL)).await;
                Ok(auth)
            })
            .await
    }

    /// Send one request through the concurrency limiter with
    /// retry-on-401 semantics.
    ///
    /// # Errors
    /// `Unauthorized` when the backend rejects the request even after a
    /// forced re-login; transport and login failures pass through.
    pub async fn dispatch(&self, spec: RequestSpec) -> Result<Response> {
        let auth = self.login(false).await?;
        self.queue
            .run(|| async move {
                let response = self.send_decorated(&spec, &auth).await?;
                if response.status() != StatusCode::UNAUTHORIZED {
                    return Ok(response);
                }

                debug!(username = %self.username, path = %spec.path,
                    "request returned 401, forcing re-authentication");
                let auth = self.login(true).await?;
                let response = self.send_decorated(&spec, &auth).await?;
                if response.status() == StatusCode::UNAUTHORIZED {
                    return Err(AgentboxError::Unauthorized(format!(
                        "request to {} rejected after re-authentication",
                        spec.path
                    )));
                }
                Ok(response)
            })
            .await
    }

    /// Fetch a single resource from the versioned admin API and unwrap its
    /// envelope.
    ///
    /// `path` is the resource path below `/admin/api`, e.g. `/contacts/1`.
    ///
    /// # Errors
    /// `Api` for errors the backend embeds in the envelope or returns as a
    /// bare error status, `Serialization` for a malformed success body,
    /// plus everything [`Session::dispatch`] can fail with.
    pub async fn get(&self, path: &str, params: Option<&RequestParameters>) -> Result<Value> {
        let mut spec = RequestSpec::get(format!("/admin/api{path}"))
            .query("version", "2")
            .header("content-type", "application/json");
        if let Some(params) = params {
            for (key, value) in params.to_query() {
                spec = spec.query(key, value);
            }
        }
        let response = self.dispatch(spec).await?;
        unwrap_envelope(response).await
    }

    /// Fetch a rendered admin panel fragment.
    ///
    /// # Errors
    /// `Api` for error statuses, plus everything [`Session::dispatch`] can
    /// fail with.
    pub async fn panel(&self, card: &str, tab: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut spec = RequestSpec::get(format!("/admin/{card}/{tab}"));
        for (key, value) in query {
            spec = spec.query(*key, *value);
        }
        let response = self.dispatch(spec).await?;
        let status = response.status();
        let body =
            response.text().await.map_err(|e| AgentboxError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentboxError::Api { status: status.as_u16(), message: body });
        }
        Ok(body)
    }

    /// Stream every item of a listing endpoint, page by page.
    ///
    /// See [`search::search`] for the paging and circuit-breaker
    /// semantics.
    pub fn search<'a>(
        &'a self,
        path: &str,
        params: RequestParameters,
    ) -> impl Stream<Item = Result<Value>> + 'a {
        search::search(self, path.to_owned(), params)
    }

    /// Stream every item of a listing endpoint with speculative page
    /// fetches, in arrival order.
    ///
    /// See [`search::search_in_background`]. Requires an [`Arc`] because
    /// the page fetches run as spawned tasks that outlive any one poll.
    pub fn search_in_background(
        self: &Arc<Self>,
        path: &str,
        params: RequestParameters,
    ) -> impl Stream<Item = Result<Value>> + Send + 'static {
        search::search_in_background(Arc::clone(self), path.to_owned(), params)
    }

    /// Fetch one page of a listing endpoint. Used by the search engine.
    pub(crate) async fn fetch_list_page(
        &self,
        path: &str,
        params: &RequestParameters,
        page: u64,
    ) -> Result<search::ListPage> {
        let mut spec = RequestSpec::get(format!("/admin/api{path}"))
            .query("version", "2")
            .query("page", page.to_string())
            .query("limit", crate::constants::PAGE_SIZE.to_string())
            .header("content-type", "application/json");
        for (key, value) in params.to_query() {
            spec = spec.query(key, value);
        }
        let response = self.dispatch(spec).await?;
        let payload = unwrap_envelope(response).await?;
        search::ListPage::parse(&payload)
    }

    async fn send_decorated(&self, spec: &RequestSpec, auth: &AuthState) -> Result<Response> {
        let mut url = self
            .base_url
            .join(&spec.path)
            .map_err(|e| AgentboxError::InvalidInput(format!("invalid request path: {e}")))?;
        if !spec.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(spec.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let mut builder = self
            .http
            .request(spec.method.clone(), url)
            .header(COOKIE, &auth.cookie)
            .header(CSRF_HEADER, &auth.csrf_token);
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }
        self.http.send(builder).await
    }
}

/// Read a response body as an API envelope and unwrap the payload.
async fn unwrap_envelope(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.map_err(|e| AgentboxError::Network(e.to_string()))?;
    match serde_json::from_str::<ApiEnvelope>(&body) {
        Ok(envelope) => envelope.into_result(status.as_u16()),
        Err(_) if !status.is_success() => {
            Err(AgentboxError::Api { status: status.as_u16(), message: body })
        }
        Err(err) => {
            Err(AgentboxError::Serialization(format!("response is not an API envelope: {err}")))
        }
    }
}

//! Browser-emulating form login.
//!
//! Replays the exact redirect chain a browser walks when signing in to the
//! admin panel: the login page bounces to the identity host, which sets an
//! `XSRF-TOKEN` cookie, accepts the credential form, and bounces back
//! through a handshake of redirects until the panel session cookies are in
//! place. Every redirect is followed manually because the intermediate
//! `Location` headers and `Set-Cookie` responses are the payload here.

use std::sync::Arc;
use std::time::Duration;

use agentbox_common::{AgentboxError, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::constants::BROWSER_USER_AGENT;

use super::types::{AuthState, Authenticator, Credentials};

/// Performs the credential form login against the admin backend.
#[derive(Debug, Clone)]
pub struct FormLoginAuthenticator {
    timeout: Duration,
}

impl FormLoginAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self { timeout: Duration::from_secs(30) }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn fresh_client(&self, jar: Arc<Jar>) -> Result<Client> {
        Client::builder()
            .redirect(Policy::none())
            .cookie_provider(jar)
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.timeout)
            .no_proxy()
            .build()
            .map_err(|e| AgentboxError::Network(e.to_string()))
    }
}

impl Default for FormLoginAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for FormLoginAuthenticator {
    async fn authenticate(&self, base_url: &Url, credentials: &Credentials) -> Result<AuthState> {
        // Fresh jar per attempt so a failed login never contaminates the
        // next one with half-established cookies.
        let jar = Arc::new(Jar::default());
        let client = self.fresh_client(Arc::clone(&jar))?;

        let login_url = join(base_url, "/admin/login")?;
        debug!(username = %credentials.username, %login_url, "starting form login");

        // 1. The login page redirects to the identity host.
        let response = send(&client, client.get(login_url.clone())).await?;
        let auth_url = redirect_target(&login_url, &response, "login entry")?;

        // 2. The identity host sets the XSRF-TOKEN cookie for the form.
        let response = send(&client, client.get(auth_url.clone())).await?;
        let xsrf = set_cookie_value(&response, "XSRF-TOKEN").ok_or_else(|| {
            AgentboxError::Auth("identity host did not issue an XSRF-TOKEN cookie".into())
        })?;

        // 3. Submit the credential form.
        let form = [
            ("_csrf", xsrf.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = send(&client, client.post(auth_url.clone()).form(&form)).await?;
        if !response.status().is_redirection() {
            return Err(AgentboxError::Auth(format!(
                "credential form rejected with status {}",
                response.status()
            )));
        }
        let callback_url = redirect_target(&auth_url, &response, "credential form")?;

        // 4-5. Walk the post-login handshake on the identity host.
        let response = send(&client, client.get(callback_url.clone())).await?;
        let handoff_url = redirect_target(&callback_url, &response, "identity callback")?;
        let response = send(&client, client.get(handoff_url.clone())).await?;

        // 6. The final hop lands back on the admin host, which issues the
        // session cookies. Its Location is a path on the base host.
        let final_path = location_header(&response, "identity handoff")?;
        let final_url = join(base_url, &final_path)?;
        send(&client, client.get(final_url)).await?;

        let state = session_state_from_jar(&jar, base_url)?;
        debug!(username = %credentials.username, "form login succeeded");
        Ok(state)
    }
}

/// Read the admin session cookies out of a jar after a completed login.
///
/// The cookies scoped to `/admin/master` are the session proof; the
/// `_csrf` cookie among them doubles as the CSRF header token.
pub(crate) fn session_state_from_jar(jar: &Jar, base_url: &Url) -> Result<AuthState> {
    let probe_url = join(base_url, "/admin/master")?;
    let cookie = jar
        .cookies(&probe_url)
        .and_then(|value| value.to_str().map(str::to_owned).ok())
        .ok_or_else(|| {
            AgentboxError::Auth("login completed without admin session cookies".into())
        })?;
    let csrf_token = cookie
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("_csrf="))
        .map(str::to_owned)
        .ok_or_else(|| {
            AgentboxError::Auth("admin session cookies are missing the _csrf token".into())
        })?;
    Ok(AuthState { cookie, csrf_token })
}

async fn send(client: &Client, builder: reqwest::RequestBuilder) -> Result<Response> {
    builder.send().await.map_err(|e| AgentboxError::Network(e.to_string()))
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path).map_err(|e| AgentboxError::Auth(format!("invalid redirect target: {e}")))
}

/// Read the `Location` header, failing with the step name for diagnostics.
fn location_header(response: &Response, step: &str) -> Result<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
            AgentboxError::Auth(format!(
                "{} returned status {} without a Location header",
                step,
                response.status()
            ))
        })
}

/// Resolve the `Location` header against the URL that produced it.
fn redirect_target(current: &Url, response: &Response, step: &str) -> Result<Url> {
    let location = location_header(response, step)?;
    current
        .join(&location)
        .map_err(|e| AgentboxError::Auth(format!("{step} redirect target is invalid: {e}")))
}

/// Extract the value of a named cookie from the response's `Set-Cookie`
/// headers.
fn set_cookie_value(response: &Response, name: &str) -> Option<String> {
    response.headers().get_all(SET_COOKIE).iter().find_map(|header| {
        let raw = header.to_str().ok()?;
        let pair = raw.split(';').next()?;
        let (cookie_name, value) = pair.split_once('=')?;
        (cookie_name.trim() == name).then(|| value.trim().to_owned())
    })
}

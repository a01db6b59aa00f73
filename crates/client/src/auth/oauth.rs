//! OAuth 2.0 authorization-code flow with PKCE.
//!
//! For deployments that put an identity provider in front of the admin
//! panel. The flow runs headless: credentials go straight to the IdP's
//! authorization endpoint, the returned code is exchanged for an access
//! token, and the token bootstraps a regular admin session so the rest of
//! the client never has to care which strategy produced its [`AuthState`].

use std::sync::Arc;
use std::time::Duration;

use agentbox_common::{AgentboxError, Result};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::constants::BROWSER_USER_AGENT;

use super::flow::session_state_from_jar;
use super::pkce::PkceChallenge;
use super::types::{AuthState, Authenticator, Credentials};

/// Identity-provider endpoints and client registration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Successful token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Authorization-code authenticator with PKCE.
#[derive(Debug, Clone)]
pub struct OAuthCodeAuthenticator {
    config: OAuthConfig,
    timeout: Duration,
}

impl OAuthCodeAuthenticator {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self { config, timeout: Duration::from_secs(30) }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the authorization URL for a given PKCE challenge.
    #[must_use]
    pub fn authorization_url(&self, challenge: &PkceChallenge) -> Url {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope_string())
            .append_pair("code_challenge", &challenge.code_challenge)
            .append_pair("code_challenge_method", challenge.challenge_method())
            .append_pair("state", &challenge.state);
        url
    }

    /// Exchange an authorization code (plus its verifier) for tokens.
    ///
    /// # Errors
    /// `Auth` when the token endpoint rejects the exchange, `Network` for
    /// transport failures, `Serialization` for a malformed token payload.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        let client = self.http_client(None)?;
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
        ];
        let response = client
            .post(self.config.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AgentboxError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentboxError::Auth(format!(
                "token exchange failed with status {status}: {body}"
            )));
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AgentboxError::Serialization(format!("malformed token response: {e}")))
    }

    fn http_client(&self, jar: Option<Arc<Jar>>) -> Result<Client> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .user_agent(BROWSER_USER_AGENT)
            .timeout(self.timeout)
            .no_proxy();
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }
        builder.build().map_err(|e| AgentboxError::Network(e.to_string()))
    }

    /// Obtain an authorization code by posting the credentials directly to
    /// the authorization endpoint, the way a headless client does.
    async fn obtain_code(
        &self,
        client: &Client,
        challenge: &PkceChallenge,
        credentials: &Credentials,
    ) -> Result<String> {
        let scope = self.config.scope_string();
        let form = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("code_challenge", challenge.code_challenge.as_str()),
            ("code_challenge_method", challenge.challenge_method()),
            ("state", challenge.state.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = client
            .post(self.config.authorize_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AgentboxError::Network(e.to_string()))?;

        if !response.status().is_redirection() {
            return Err(AgentboxError::Auth(format!(
                "authorization endpoint rejected the credentials with status {}",
                response.status()
            )));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AgentboxError::Auth("authorization redirect is missing a Location header".into())
            })?;
        let redirect = self.config.authorize_url.join(location).map_err(|e| {
            AgentboxError::Auth(format!("authorization redirect target is invalid: {e}"))
        })?;

        let mut code = None;
        let mut returned_state = None;
        for (key, value) in redirect.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => returned_state = Some(value.into_owned()),
                _ => {}
            }
        }
        // The state echo is the CSRF check; a mismatch means the redirect
        // does not belong to our request.
        match returned_state {
            Some(ref state) if state == &challenge.state => {}
            _ => return Err(AgentboxError::Auth("authorization state mismatch".into())),
        }
        code.ok_or_else(|| {
            AgentboxError::Auth("authorization redirect did not carry a code".into())
        })
    }
}

#[async_trait]
impl Authenticator for OAuthCodeAuthenticator {
    async fn authenticate(&self, base_url: &Url, credentials: &Credentials) -> Result<AuthState> {
        let challenge = PkceChallenge::generate();
        debug!(username = %credentials.username, client_id = %self.config.client_id,
            "starting OAuth code flow");

        let plain_client = self.http_client(None)?;
        let code = self.obtain_code(&plain_client, &challenge, credentials).await?;
        let tokens = self.exchange_code(&code, &challenge.code_verifier).await?;

        // Bootstrap the admin session from the access token. The backend
        // answers with the same session cookies the form login produces.
        let jar = Arc::new(Jar::default());
        let session_client = self.http_client(Some(Arc::clone(&jar)))?;
        let sso_url = base_url
            .join("/admin/sso")
            .map_err(|e| AgentboxError::Auth(format!("invalid base URL: {e}")))?;
        let response = session_client
            .get(sso_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AgentboxError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AgentboxError::Auth(format!(
                "session bootstrap rejected the access token with status {}",
                response.status()
            )));
        }

        let state = session_state_from_jar(&jar, base_url)?;
        debug!(username = %credentials.username, "OAuth code flow succeeded");
        Ok(state)
    }
}

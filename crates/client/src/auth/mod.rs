//! Authentication against the admin backend.
//!
//! Two interchangeable strategies sit behind the [`Authenticator`] trait:
//! the browser-emulating form login ([`FormLoginAuthenticator`]) that the
//! admin panel itself uses, and an OAuth 2.0 authorization-code flow with
//! PKCE ([`OAuthCodeAuthenticator`]) for deployments that front the panel
//! with an identity provider. Sessions only ever see the resulting
//! [`AuthState`].

pub mod flow;
pub mod oauth;
pub mod pkce;
pub mod types;

pub use flow::FormLoginAuthenticator;
pub use oauth::{OAuthCodeAuthenticator, OAuthConfig};
pub use pkce::PkceChallenge;
pub use types::{AuthState, Authenticator, Credentials};

//! Async client for the Agentbox CRM's browser-oriented admin backend.
//!
//! The vendor's admin API sits behind a cookie/CSRF browser session, so this
//! crate reproduces the login choreography once and then multiplexes every
//! request through shared machinery:
//!
//! ```text
//! ┌──────────────────┐
//! │     Session      │  per-user orchestrator
//! └──────┬───────────┘
//!        │
//!        ├──► DispatchQueue   (bounded outbound concurrency, FIFO)
//!        ├──► SingleFlight    (one login at a time, shared outcome)
//!        ├──► CacheScope      (durable auth material, 24 h TTL)
//!        └──► HttpClient      (reqwest wrapper, cookie + CSRF headers)
//!
//! search / search_in_background build on Session::dispatch
//! ```
//!
//! A request obtains auth material from the cache (logging in through the
//! single-flight coalescer when it is missing), is admitted by the session's
//! dispatch queue, and on a 401 triggers exactly one forced
//! re-authentication and retry. Paginated listings are exposed as item
//! streams with a sequential strategy and a speculative parallel strategy.
//!
//! # Module Organization
//!
//! - [`config`]: environment-driven [`config::ClientConfig`]
//! - [`auth`]: credentials, auth-state schema, the form-login choreography
//!   and the OAuth2/PKCE variant
//! - [`http`]: thin reqwest wrapper with timeouts and transient-error retry
//! - [`session`]: [`session::Session`] and [`session::SessionRegistry`]
//! - [`search`]: the paginated retrieval engine

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod config;
pub mod constants;
pub mod http;
pub mod search;
pub mod session;
pub mod types;

pub use agentbox_common::{AgentboxError, Result};
pub use auth::{AuthState, Authenticator, Credentials, FormLoginAuthenticator};
pub use config::ClientConfig;
pub use session::{Session, SessionRegistry};
pub use types::{RequestParameters, RequestSpec};

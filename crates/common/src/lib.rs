//! Cross-cutting primitives shared across the Agentbox client crates.
//!
//! Three concerns live here, independent of any vendor endpoint:
//!
//! - [`error`]: the crate-wide error taxonomy and `Result` alias
//! - [`resilience`]: bounded-concurrency dispatch and single-flight
//!   coalescing for duplicate async computations
//! - [`cache`]: a durable, scoped, TTL-aware key/value store backed by
//!   SQLite

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod error;
pub mod resilience;

pub use error::{AgentboxError, Result};

//! Concurrency control primitives for request dispatch
//!
//! Two patterns live here, both independent of what the wrapped operation
//! does:
//!
//! - **Dispatch queue**: admits at most N concurrently-running operations
//!   from a FIFO backlog. Used to bound a session's outbound network calls.
//! - **Single-flight**: collapses concurrent duplicate async computations
//!   into one shared execution. Used to guard re-authentication so that many
//!   requests discovering an expired session trigger exactly one login.
//!
//! Neither primitive supports cancellation: once an operation is admitted it
//! runs to completion, and callers that stop caring simply drop the result.

pub mod dispatch_queue;
pub mod single_flight;

pub use dispatch_queue::{DispatchQueue, DispatchQueueMetrics};
pub use single_flight::SingleFlight;

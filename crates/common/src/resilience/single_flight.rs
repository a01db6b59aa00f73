//! Single-flight coalescing of duplicate async computations
//!
//! Ensures at most one execution of a wrapped computation is in flight at a
//! time. Callers that arrive while a computation is running attach to it and
//! receive the identical outcome; once it settles, the slot clears and the
//! next call starts a fresh execution.
//!
//! The guarded use case is re-authentication: many requests may discover an
//! expired session at once, and each must not trigger its own login.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Coalesces concurrent duplicate computations into one shared execution.
///
/// `T` and `E` must be `Clone` because every attached waiter receives its
/// own copy of the single settled outcome.
///
/// # Examples
///
/// ```rust
/// use agentbox_common::resilience::SingleFlight;
///
/// # async fn example() {
/// let flight: SingleFlight<u32, String> = SingleFlight::new();
/// let value = flight.run(|| async { Ok(7) }).await;
/// assert_eq!(value, Ok(7));
/// # }
/// ```
pub struct SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    slot: Mutex<Option<SharedOutcome<T, E>>>,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty coalescer (nothing in flight).
    #[must_use]
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Run `factory`'s computation, or attach to the one already in flight.
    ///
    /// All callers that attach to a given generation observe the identical
    /// `Ok` value or `Err`. The factory is invoked at most once per
    /// generation; it must be cheap to *call* (the returned future does the
    /// work once polled).
    pub async fn run<F, Fut>(&self, factory: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                // Attach only while the generation is genuinely unsettled;
                // a settled leftover means its waiters haven't cleared the
                // slot yet, and a new caller must get a fresh computation.
                Some(existing) if existing.peek().is_none() => {
                    debug!("single-flight: attaching to in-flight computation");
                    existing.clone()
                }
                _ => {
                    debug!("single-flight: starting new computation");
                    let shared = factory().boxed().shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;

        // First waiter back clears the slot; ptr_eq keeps a newer
        // generation from being clobbered.
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
            *slot = None;
        }

        result
    }

    /// True while a computation is running and unsettled.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|shared| shared.peek().is_none())
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight").field("in_flight", &self.is_in_flight()).finish()
    }
}

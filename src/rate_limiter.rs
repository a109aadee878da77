//! The admission contract shared by all limiter algorithms.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WaitResult;
use crate::limit::Limit;
use crate::reservation::Reservation;
use crate::types::{Algorithm, Capabilities};

/// The uniform operation set every limiter algorithm implements.
///
/// One instance is shared across callers (the factory hands out
/// `Arc<dyn RateLimiter>`); all operations are safe for concurrent use.
/// Each engine guards its accounting state with a single internal mutex held
/// only for the advance-decide-mutate critical section, never across a
/// suspension.
///
/// # Timestamps
///
/// Operations with an `at` parameter evaluate admission as of that instant
/// and advance the engine's time-dependent bookkeeping to it first. Callers
/// may pass historical instants (useful in tests); bookkeeping never rewinds,
/// so accounting stays monotonic regardless of call order. The convenience
/// forms without `at` use `Instant::now()`.
///
/// # Waiting and cancellation
///
/// [`wait_n`](RateLimiter::wait_n) suspends the calling task until the
/// requested units can be admitted, racing its timer against the supplied
/// [`CancellationToken`]. For a deadline rather than a manual cancel, arm the
/// token from a timer or wrap the wait in `tokio::time::timeout`. There is no
/// fairness among concurrent waiters: each secures or re-checks its own slot
/// independently, so admissions may complete out of arrival order.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempts to admit one unit now. Shorthand for
    /// [`allow_n`](RateLimiter::allow_n) with `n = 1`.
    fn allow(&self) -> bool {
        self.allow_n(Instant::now(), 1)
    }

    /// Atomically attempts to admit `n` units at instant `at`.
    ///
    /// On success the engine's state is updated immediately and irrevocably;
    /// on denial nothing changes beyond the bookkeeping advance.
    fn allow_n(&self, at: Instant, n: u64) -> bool;

    /// Suspends until one unit can be admitted; shorthand for
    /// [`wait_n`](RateLimiter::wait_n) with `n = 1`.
    async fn wait(&self, cancel: &CancellationToken) -> WaitResult {
        self.wait_n(cancel, 1).await
    }

    /// Suspends the calling task until `n` units are admitted, the token is
    /// cancelled, or the request is found to exceed capacity.
    ///
    /// # Errors
    ///
    /// * [`RateLimitError::BeyondCapacity`](crate::RateLimitError::BeyondCapacity)
    ///   if `n` exceeds the configured burst; returned immediately, never
    ///   after a wait.
    /// * [`RateLimitError::Cancelled`](crate::RateLimitError::Cancelled) if
    ///   `cancel` fires first. Capacity already committed for this wait may
    ///   remain consumed (best-effort reservation cancellation).
    async fn wait_n(&self, cancel: &CancellationToken, n: u64) -> WaitResult;

    /// Reserves one unit as of now; shorthand for
    /// [`reserve_n`](RateLimiter::reserve_n) with `n = 1`.
    fn reserve(&self) -> Reservation {
        self.reserve_n(Instant::now(), 1)
    }

    /// Computes, without blocking, whether and when `n` units become
    /// available, committing state as if they were consumed at that instant.
    ///
    /// The token and leaky buckets return a grant with a true future delay.
    /// The window algorithms cannot predict future admissibility from
    /// current state alone, so their reservations degenerate to an immediate
    /// try-admit: a grant with zero delay, or a denied reservation. Check
    /// [`capabilities`](RateLimiter::capabilities) before relying on delays.
    fn reserve_n(&self, at: Instant, n: u64) -> Reservation;

    /// Remaining capacity as of now; shorthand for
    /// [`tokens_at`](RateLimiter::tokens_at).
    fn tokens(&self) -> f64 {
        self.tokens_at(Instant::now())
    }

    /// The algorithm's notion of remaining capacity at `at`, advancing
    /// bookkeeping as a side effect.
    ///
    /// Exact fractional tokens for the token bucket (negative after deficit
    /// reservations); for the other algorithms an integer count of slots not
    /// yet used in the current accounting epoch, to be read as an
    /// approximation rather than a token count.
    fn tokens_at(&self, at: Instant) -> f64;

    /// The configured rate.
    fn limit(&self) -> Limit;

    /// Replaces the rate as of now; shorthand for
    /// [`set_limit_at`](RateLimiter::set_limit_at).
    fn set_limit(&self, new_limit: Limit) {
        self.set_limit_at(Instant::now(), new_limit);
    }

    /// Replaces the rate as of `at`.
    ///
    /// Bookkeeping is first advanced to `at` under the old rate, so history
    /// accrued before the change is neither lost nor double-counted.
    fn set_limit_at(&self, at: Instant, new_limit: Limit);

    /// The configured burst / capacity bound.
    fn burst(&self) -> u64;

    /// Replaces the burst as of now; shorthand for
    /// [`set_burst_at`](RateLimiter::set_burst_at).
    fn set_burst(&self, new_burst: u64) {
        self.set_burst_at(Instant::now(), new_burst);
    }

    /// Replaces the burst as of `at`, advancing bookkeeping under the old
    /// configuration first.
    fn set_burst_at(&self, at: Instant, new_burst: u64);

    /// The tag this limiter was constructed with.
    fn algorithm(&self) -> Algorithm;

    /// What this algorithm can report and predict. Needs no state access.
    fn capabilities(&self) -> Capabilities;

    /// Hook invoked by [`Reservation::cancel_at`] to route a cancellation
    /// back to the owning engine.
    ///
    /// None of the shipped algorithms can return reserved units to the pool,
    /// so the default implementation does nothing; the reservation remains
    /// consumed. Overriding implementations must keep cancellation
    /// best-effort.
    fn cancel_reservation(&self, _at: Instant, _units: u64) {}
}

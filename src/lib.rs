//! A rate-admission library for Rust applications.
//!
//! Given a configured rate and burst capacity, a limiter decides for each
//! incoming unit of work whether to admit it now, how long to delay it, or
//! to deny it, using one of four interchangeable accounting algorithms
//! behind a single polymorphic contract. All implementations are thread-safe
//! and designed for concurrent callers.
//!
//! # Quick Start
//!
//! ```rust
//! use rate_gate::{new_limiter, Algorithm, Limit};
//!
//! // 10 units per second, bursts of up to 5.
//! let limiter = new_limiter(Algorithm::TokenBucket, Limit::per_second(10.0), 5);
//!
//! if limiter.allow() {
//!     // admitted: proceed with the request
//! }
//! ```
//!
//! Callers that would rather suspend than poll use [`wait`](RateLimiter::wait),
//! racing the admission timer against a cancellation signal:
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use rate_gate::{new_limiter, Algorithm, Limit};
//! use tokio_util::sync::CancellationToken;
//!
//! let limiter = new_limiter(Algorithm::LeakyBucket, Limit::per_second(200.0), 1);
//! let cancel = CancellationToken::new();
//!
//! limiter.wait(&cancel).await.expect("admitted");
//! # }
//! ```
//!
//! # Available Algorithms
//!
//! ## [Token Bucket](rate_limiters::TokenBucketLimiter)
//! Continuous refill with bursts up to capacity; exact fractional token
//! introspection and true future-delay reservations.
//!
//! ## [Leaky Bucket](rate_limiters::LeakyBucketLimiter)
//! Queued units draining at a constant rate; smooth traffic shaping with
//! overflow reservations.
//!
//! ## [Sliding Window](rate_limiters::SlidingWindowLimiter)
//! Timestamp log over a rolling window; at most `burst` admissions in any
//! trailing window.
//!
//! ## [Fixed Window](rate_limiters::FixedWindowLimiter)
//! Counter over globally aligned windows; simplest accounting, with the
//! classic double-burst artifact at boundaries.
//!
//! # Core Concepts
//!
//! ## Time
//! Operations take an explicit `at: Instant` (or default to now). Engines
//! advance their bookkeeping to the operation's timestamp before deciding
//! admission and never rewind it, so historical timestamps (handy in tests)
//! keep accounting monotonic. Fixed-window boundaries align to
//! [`window_origin`], a process-wide grid shared by all limiters.
//!
//! ## Rates
//! A [`Limit`] is a finite units-per-second value or [`Limit::Unlimited`].
//! Unlimited saturates the accounting state to full capacity on every
//! advance; a rate of zero (or below) never replenishes, so nothing beyond
//! the initial burst is ever admitted.
//!
//! ## Reservations
//! [`reserve_n`](RateLimiter::reserve_n) commits capacity now in exchange
//! for a [`Reservation`] naming the instant to act. Cancelling one is best
//! effort and does not restore consumed capacity. The window algorithms
//! cannot predict future admissibility and degrade to immediate try-admits;
//! check [`capabilities`](RateLimiter::capabilities) before relying on
//! reservation delays.
//!
//! # Algorithm Selection Guide
//!
//! - **Allow controlled bursts**: [`TokenBucketLimiter`](rate_limiters::TokenBucketLimiter)
//! - **Strict constant outflow**: [`LeakyBucketLimiter`](rate_limiters::LeakyBucketLimiter)
//! - **Accurate trailing-window bound**: [`SlidingWindowLimiter`](rate_limiters::SlidingWindowLimiter)
//! - **Simple counting**: [`FixedWindowLimiter`](rate_limiters::FixedWindowLimiter)

use std::sync::Arc;

pub mod clock;
pub mod error;
pub mod limit;
pub mod rate_limiter;
pub mod rate_limiters;
pub mod reservation;
pub mod types;

pub use clock::window_origin;
pub use error::{RateLimitError, WaitResult};
pub use limit::Limit;
pub use rate_limiter::RateLimiter;
pub use reservation::Reservation;
pub use types::{Algorithm, Capabilities};

use rate_limiters::{
    FixedWindowLimiter, LeakyBucketLimiter, SlidingWindowLimiter, TokenBucketLimiter,
};

/// Builds the engine for `algorithm` with the given rate and burst.
///
/// The returned limiter is shared: clone the `Arc` freely across threads
/// and tasks. The algorithm tag is fixed for the limiter's lifetime.
///
/// # Example
///
/// ```rust
/// use rate_gate::{new_limiter, Algorithm, Limit};
///
/// let limiter = new_limiter(Algorithm::SlidingWindow, Limit::per_minute(60.0), 10);
/// assert_eq!(limiter.algorithm(), Algorithm::SlidingWindow);
/// assert_eq!(limiter.burst(), 10);
/// ```
pub fn new_limiter(algorithm: Algorithm, limit: Limit, burst: u64) -> Arc<dyn RateLimiter> {
    match algorithm {
        Algorithm::TokenBucket => TokenBucketLimiter::new(limit, burst),
        Algorithm::LeakyBucket => LeakyBucketLimiter::new(limit, burst),
        Algorithm::SlidingWindow => SlidingWindowLimiter::new(limit, burst),
        Algorithm::FixedWindow => FixedWindowLimiter::new(limit, burst),
    }
}

/// Configuration for constructing a limiter.
///
/// Convertible straight into a limiter via `From`/`Into`:
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate::{Algorithm, Limit, LimiterConfig, RateLimiter};
///
/// let limiter: Arc<dyn RateLimiter> = LimiterConfig {
///     algorithm: Algorithm::FixedWindow,
///     limit: Limit::per_second(50.0),
///     burst: 25,
/// }
/// .into();
///
/// assert_eq!(limiter.burst(), 25);
/// ```
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Which accounting algorithm to construct.
    pub algorithm: Algorithm,
    /// Admission rate.
    pub limit: Limit,
    /// Burst / capacity bound.
    pub burst: u64,
}

impl LimiterConfig {
    /// Creates a new configuration instance.
    pub fn new(algorithm: Algorithm, limit: Limit, burst: u64) -> Self {
        Self {
            algorithm,
            limit,
            burst,
        }
    }
}

impl From<LimiterConfig> for Arc<dyn RateLimiter> {
    fn from(config: LimiterConfig) -> Self {
        new_limiter(config.algorithm, config.limit, config.burst)
    }
}

//! Error and result types for admission operations.

use thiserror::Error;

/// Errors produced by blocking and reserving admission operations.
///
/// Instantaneous checks ([`allow_n`](crate::RateLimiter::allow_n)) report
/// denial through their boolean return; only `wait`-style operations can
/// fail with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// The request asked for more units than the configured burst can ever
    /// hold, so no amount of waiting would admit it. Reported synchronously
    /// and never retried internally.
    #[error("requested {acquiring} unit(s) exceeds the configured capacity of {capacity}")]
    BeyondCapacity {
        /// Units the caller asked for.
        acquiring: u64,
        /// The burst/capacity configured at the time of the request.
        capacity: u64,
    },

    /// The caller's cancellation signal fired while the wait was suspended.
    ///
    /// Capacity already committed for the wait (via its reservation) may
    /// remain consumed; see [`Reservation::cancel`](crate::Reservation::cancel).
    #[error("wait cancelled before admission")]
    Cancelled,
}

/// Result type for `wait`-style admission operations.
pub type WaitResult = Result<(), RateLimitError>;

//! Algorithm tags and per-algorithm capability descriptors.

use core::fmt;

/// Selects which accounting algorithm a limiter uses.
///
/// The tag is fixed at construction time; a limiter is never re-tagged.
/// Pass it to [`new_limiter`](crate::new_limiter) to build the matching
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Fractional token pool refilled continuously at the configured rate.
    TokenBucket,
    /// Queue of admitted units draining at the configured rate.
    LeakyBucket,
    /// Log of admission timestamps within a rolling window.
    SlidingWindow,
    /// Counter over globally aligned fixed windows.
    FixedWindow,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::TokenBucket => write!(f, "TokenBucket"),
            Algorithm::LeakyBucket => write!(f, "LeakyBucket"),
            Algorithm::SlidingWindow => write!(f, "SlidingWindow"),
            Algorithm::FixedWindow => write!(f, "FixedWindow"),
        }
    }
}

/// Static description of what a limiter algorithm can report and predict.
///
/// Pure data; query it via [`RateLimiter::capabilities`](crate::RateLimiter::capabilities)
/// to decide whether `tokens`/`reserve` results are exact for the algorithm
/// at hand or only approximations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `tokens()` reports an exact fractional token count rather than an
    /// approximate count of unused slots.
    pub supports_tokens: bool,
    /// The burst value bounds instantaneously admissible units exactly.
    pub supports_burst: bool,
    /// `reserve()` computes a true future admission delay instead of
    /// degenerating to an immediate try-admit.
    pub supports_reservation: bool,
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{RateLimitError, WaitResult};
use crate::limit::Limit;
use crate::rate_limiter::RateLimiter;
use crate::reservation::Reservation;
use crate::types::{Algorithm, Capabilities};

/// Pushes a computed admission instant just past the point where the
/// capacity is technically still short.
const RESERVE_EPSILON: Duration = Duration::from_nanos(1);

/// Token bucket limiter.
///
/// The bucket holds up to `burst` fractional tokens and is refilled
/// continuously at the configured rate. Each admission consumes one token
/// per unit; if insufficient tokens are available the request is denied.
/// Unused tokens accumulate up to the burst, allowing short bursts while
/// maintaining the average rate.
///
/// # Algorithm behavior
///
/// - The bucket starts full with `burst` tokens.
/// - On every operation, `rate × elapsed` tokens are added, capped at the
///   burst. An unlimited rate saturates the bucket to full instead.
/// - `allow_n` succeeds iff at least `n` tokens are available, then
///   subtracts `n`.
/// - `reserve_n` fails only when `n` exceeds the burst; otherwise it
///   computes the wait until `n` tokens accrue and deducts them up front.
///   The deduction is optimistic, so the token count can go negative: a
///   reservation is a promise against future refill, and later `allow_n`
///   calls see the reduced availability immediately.
///
/// This is the only algorithm with all three [`Capabilities`] flags set.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use rate_gate::rate_limiters::TokenBucketLimiter;
/// use rate_gate::{Limit, RateLimiter};
///
/// let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
/// let now = Instant::now();
///
/// // The bucket starts full.
/// assert!(bucket.allow_n(now, 5));
///
/// // Same instant, nothing accrued: denied.
/// assert!(!bucket.allow_n(now, 1));
///
/// // Half a second later, 5 tokens have accrued.
/// assert!(bucket.allow_n(now + Duration::from_millis(500), 5));
/// ```
pub struct TokenBucketLimiter {
    /// Handed to reservations so cancellation finds its way back here.
    weak_self: Weak<TokenBucketLimiter>,
    /// Accounting state, guarded for the full advance-decide-mutate section.
    state: Mutex<TokenBucketState>,
}

/// Internal state of the token bucket.
struct TokenBucketState {
    limit: Limit,
    burst: u64,
    /// Current token balance; negative after deficit-spending reservations.
    tokens: f64,
    /// Instant the balance was last brought up to date.
    last_update: Instant,
}

impl TokenBucketLimiter {
    /// Creates a token bucket admitting `limit` units per second with a
    /// burst of `burst`, starting full.
    pub fn new(limit: Limit, burst: u64) -> Arc<Self> {
        Arc::new_cyclic(|weak| TokenBucketLimiter {
            weak_self: weak.clone(),
            state: Mutex::new(TokenBucketState {
                limit,
                burst,
                tokens: burst as f64,
                last_update: Instant::now(),
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, TokenBucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Brings the token balance up to `at`. Historical instants accrue
    /// nothing; the balance never rewinds.
    fn advance(state: &mut TokenBucketState, at: Instant) {
        let elapsed = at.saturating_duration_since(state.last_update);
        match state.limit {
            Limit::Unlimited => {
                // Saturate rather than grow-then-cap: no arithmetic on a
                // sentinel value.
                state.tokens = state.burst as f64;
            }
            Limit::Finite(rate) if rate > 0.0 => {
                if !elapsed.is_zero() {
                    state.tokens =
                        (state.tokens + rate * elapsed.as_secs_f64()).min(state.burst as f64);
                }
            }
            // Non-positive rate: the balance never replenishes.
            Limit::Finite(_) => {}
        }
        if !elapsed.is_zero() {
            state.last_update = at;
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    fn allow_n(&self, at: Instant, n: u64) -> bool {
        let mut state = self.lock_state();
        Self::advance(&mut state, at);
        if state.tokens >= n as f64 {
            state.tokens -= n as f64;
            true
        } else {
            false
        }
    }

    async fn wait_n(&self, cancel: &CancellationToken, n: u64) -> WaitResult {
        let reservation = self.reserve_n(Instant::now(), n);
        let Some(delay) = reservation.delay() else {
            return Err(RateLimitError::BeyondCapacity {
                acquiring: n,
                capacity: self.burst(),
            });
        };
        if delay.is_zero() {
            return Ok(());
        }
        trace!(units = n, delay_us = delay.as_micros() as u64, "tokens short, suspending");
        tokio::select! {
            _ = sleep(delay) => Ok(()),
            _ = cancel.cancelled() => {
                reservation.cancel();
                Err(RateLimitError::Cancelled)
            }
        }
    }

    /// Reserves `n` tokens, deducting them immediately.
    ///
    /// Fails only when `n` exceeds the burst. With tokens short and a
    /// positive rate, the grant's time to act is `(n - tokens) / rate`
    /// seconds out; with no replenishment there is no future instant to
    /// name, so the grant is immediate.
    fn reserve_n(&self, at: Instant, n: u64) -> Reservation {
        let mut state = self.lock_state();
        Self::advance(&mut state, at);

        if n > state.burst {
            return Reservation::denied(n, state.limit);
        }

        let mut wait = Duration::ZERO;
        if state.tokens < n as f64 {
            if let Some(rate) = state.limit.replenish_rate() {
                let needed = n as f64 - state.tokens;
                wait = Duration::from_secs_f64(needed / rate) + RESERVE_EPSILON;
            }
        }

        state.tokens -= n as f64;

        Reservation::granted(self.weak_self.clone(), n, at + wait, state.limit)
    }

    fn tokens_at(&self, at: Instant) -> f64 {
        let mut state = self.lock_state();
        Self::advance(&mut state, at);
        state.tokens
    }

    fn limit(&self) -> Limit {
        self.lock_state().limit
    }

    fn set_limit_at(&self, at: Instant, new_limit: Limit) {
        let mut state = self.lock_state();
        Self::advance(&mut state, at);
        trace!(%new_limit, "token bucket rate changed");
        state.limit = new_limit;
    }

    fn burst(&self) -> u64 {
        self.lock_state().burst
    }

    fn set_burst_at(&self, at: Instant, new_burst: u64) {
        let mut state = self.lock_state();
        Self::advance(&mut state, at);
        state.burst = new_burst;
        state.tokens = state.tokens.min(new_burst as f64);
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::TokenBucket
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_tokens: true,
            supports_burst: true,
            supports_reservation: true,
        }
    }
}

use std::collections::VecDeque;
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

/// Keeps a computed admission instant strictly after the point where the
/// overflowing unit is technically still queued.
const RESERVE_EPSILON: Duration = Duration::from_nanos(1);

/// Leaky bucket limiter.
///
/// Admitted units queue in the bucket and drain ("leak") at the configured
/// rate, oldest first. A request is admitted only if it fits in the
/// remaining queue capacity, which smooths traffic to the leak rate while
/// tolerating short bursts up to the capacity.
///
/// # Algorithm behavior
///
/// - The queue starts empty; every admission appends one timestamp per unit.
/// - On every operation, the units that would have drained since the last
///   leak are removed from the front. Only whole units drain; the fractional
///   remainder is carried forward so rapid polling cannot stall draining.
/// - `allow_n` succeeds iff `queued + n ≤ capacity`.
/// - `reserve_n` fails only when `n` exceeds the capacity; an overflowing
///   request is granted with a delay of `overflow / rate`, and its units are
///   queued immediately.
///
/// Capacity introspection reports remaining queue slots, an approximation
/// rather than an exact token count.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use rate_gate::rate_limiters::LeakyBucketLimiter;
/// use rate_gate::{Limit, RateLimiter};
///
/// let bucket = LeakyBucketLimiter::new(Limit::per_second(1.0), 2);
/// let now = Instant::now();
///
/// assert!(bucket.allow_n(now, 2));
/// assert!(!bucket.allow_n(now, 1));
///
/// // One unit has leaked a second later.
/// assert!(bucket.allow_n(now + Duration::from_secs(1), 1));
/// ```
pub struct LeakyBucketLimiter {
    weak_self: Weak<LeakyBucketLimiter>,
    state: Mutex<LeakyBucketState>,
}

/// Internal state of the leaky bucket.
struct LeakyBucketState {
    limit: Limit,
    capacity: u64,
    /// Queue timestamps for admitted-but-not-yet-drained units, oldest first.
    queue: VecDeque<Instant>,
    /// Instant up to which whole-unit draining has been accounted.
    last_leak: Instant,
}

impl LeakyBucketLimiter {
    /// Creates a leaky bucket draining `limit` units per second with room
    /// for `capacity` queued units, starting empty.
    pub fn new(limit: Limit, capacity: u64) -> Arc<Self> {
        Arc::new_cyclic(|weak| LeakyBucketLimiter {
            weak_self: weak.clone(),
            state: Mutex::new(LeakyBucketState {
                limit,
                capacity,
                queue: VecDeque::with_capacity(capacity.min(1024) as usize),
                last_leak: Instant::now(),
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, LeakyBucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drains the units that leaked out between `last_leak` and `at`.
    ///
    /// `last_leak` advances only by the drain time of whole units, so the
    /// fraction of the next unit already drained survives across calls.
    fn leak(state: &mut LeakyBucketState, at: Instant) {
        match state.limit {
            Limit::Unlimited => {
                state.queue.clear();
                if at > state.last_leak {
                    state.last_leak = at;
                }
            }
            Limit::Finite(rate) if rate > 0.0 => {
                if state.queue.is_empty() {
                    // Nothing to drain; do not bank idle time.
                    if at > state.last_leak {
                        state.last_leak = at;
                    }
                    return;
                }
                let elapsed = at.saturating_duration_since(state.last_leak);
                let drained = (rate * elapsed.as_secs_f64()) as u64;
                if drained == 0 {
                    return;
                }
                if drained >= state.queue.len() as u64 {
                    state.queue.clear();
                    state.last_leak = at;
                } else {
                    state.queue.drain(..drained as usize);
                    state.last_leak += Duration::from_secs_f64(drained as f64 / rate);
                }
            }
            // Non-positive rate: the queue never drains.
            Limit::Finite(_) => {
                if at > state.last_leak {
                    state.last_leak = at;
                }
            }
        }
    }
}

#[async_trait]
impl RateLimiter for LeakyBucketLimiter {
    fn allow_n(&self, at: Instant, n: u64) -> bool {
        let mut state = self.lock_state();
        Self::leak(&mut state, at);
        if (state.queue.len() as u64).saturating_add(n) <= state.capacity {
            for _ in 0..n {
                state.queue.push_back(at);
            }
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
        trace!(units = n, delay_us = delay.as_micros() as u64, "bucket full, suspending");
        tokio::select! {
            _ = sleep(delay) => Ok(()),
            _ = cancel.cancelled() => {
                reservation.cancel();
                Err(RateLimitError::Cancelled)
            }
        }
    }

    /// Reserves `n` units, queueing them immediately.
    ///
    /// Fails only when `n` exceeds the capacity. Units that overflow the
    /// queue are granted with a delay of `overflow / rate` seconds, the time
    /// for the excess to drain.
    fn reserve_n(&self, at: Instant, n: u64) -> Reservation {
        let mut state = self.lock_state();
        Self::leak(&mut state, at);

        if n > state.capacity {
            return Reservation::denied(n, state.limit);
        }

        let mut wait = Duration::ZERO;
        let overflow = (state.queue.len() as u64).saturating_add(n).saturating_sub(state.capacity);
        if overflow > 0 {
            if let Some(rate) = state.limit.replenish_rate() {
                wait = Duration::from_secs_f64(overflow as f64 / rate) + RESERVE_EPSILON;
            }
        }

        for _ in 0..n {
            state.queue.push_back(at);
        }

        Reservation::granted(self.weak_self.clone(), n, at + wait, state.limit)
    }

    /// Remaining queue slots, not true tokens.
    fn tokens_at(&self, at: Instant) -> f64 {
        let mut state = self.lock_state();
        Self::leak(&mut state, at);
        state.capacity.saturating_sub(state.queue.len() as u64) as f64
    }

    fn limit(&self) -> Limit {
        self.lock_state().limit
    }

    fn set_limit_at(&self, at: Instant, new_limit: Limit) {
        let mut state = self.lock_state();
        Self::leak(&mut state, at);
        trace!(%new_limit, "leaky bucket rate changed");
        state.limit = new_limit;
    }

    fn burst(&self) -> u64 {
        self.lock_state().capacity
    }

    fn set_burst_at(&self, at: Instant, new_burst: u64) {
        let mut state = self.lock_state();
        Self::leak(&mut state, at);
        state.capacity = new_burst;
        // Shrinking drops the newest queued units beyond the new bound.
        state.queue.truncate(new_burst as usize);
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::LeakyBucket
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_tokens: false,
            supports_burst: false,
            supports_reservation: true,
        }
    }
}

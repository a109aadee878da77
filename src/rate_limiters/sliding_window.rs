use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{RateLimitError, WaitResult};
use crate::limit::Limit;
use crate::rate_limiter::RateLimiter;
use crate::reservation::Reservation;
use crate::types::{Algorithm, Capabilities};

/// Woken waiters re-check slightly after the oldest entry expires, so the
/// retry never lands on the exact expiry instant.
const RETRY_MARGIN: Duration = Duration::from_millis(1);

/// Sliding window limiter.
///
/// Keeps the timestamps of admissions within a trailing window of
/// `burst / rate` seconds. A request is admitted only if the window still
/// has room, so no trailing interval of one window length ever contains
/// more than `burst` admissions.
///
/// Future admissibility depends on which logged timestamps will have aged
/// out, not on a closed-form delay, so reservations degenerate to an
/// immediate try-admit and [`Capabilities::supports_reservation`] is false.
/// [`wait_n`](RateLimiter::wait_n) instead sleeps until enough of the oldest
/// entries expire and re-validates in a loop.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use rate_gate::rate_limiters::SlidingWindowLimiter;
/// use rate_gate::{Limit, RateLimiter};
///
/// // Window of 2 seconds (burst 2 at 1 unit/s).
/// let limiter = SlidingWindowLimiter::new(Limit::per_second(1.0), 2);
/// let now = Instant::now();
///
/// assert!(limiter.allow_n(now, 2));
/// assert!(!limiter.allow_n(now + Duration::from_secs(1), 1));
///
/// // The first two entries have aged out of the window.
/// assert!(limiter.allow_n(now + Duration::from_millis(2500), 1));
/// ```
pub struct SlidingWindowLimiter {
    weak_self: Weak<SlidingWindowLimiter>,
    state: Mutex<SlidingWindowState>,
}

/// Internal state of the sliding window.
struct SlidingWindowState {
    limit: Limit,
    burst: u64,
    /// Trailing window length; `None` when history never ages out
    /// (non-positive rate).
    window: Option<Duration>,
    /// Admission timestamps inside the window, ascending.
    timestamps: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    /// Creates a sliding window limiter admitting at most `burst` units per
    /// trailing window of `burst / limit` seconds.
    pub fn new(limit: Limit, burst: u64) -> Arc<Self> {
        Arc::new_cyclic(|weak| SlidingWindowLimiter {
            weak_self: weak.clone(),
            state: Mutex::new(SlidingWindowState {
                limit,
                burst,
                window: limit.window(burst),
                timestamps: VecDeque::with_capacity(burst.min(1024) as usize),
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, SlidingWindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops timestamps that have aged out of the trailing window ending at
    /// `at`.
    fn cleanup(state: &mut SlidingWindowState, at: Instant) {
        if state.limit.is_unlimited() {
            state.timestamps.clear();
            return;
        }
        let Some(window) = state.window else {
            return;
        };
        let Some(cutoff) = at.checked_sub(window) else {
            return;
        };
        while let Some(&oldest) = state.timestamps.front() {
            if oldest >= cutoff {
                break;
            }
            state.timestamps.pop_front();
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    fn allow_n(&self, at: Instant, n: u64) -> bool {
        let mut state = self.lock_state();
        Self::cleanup(&mut state, at);
        if (state.timestamps.len() as u64).saturating_add(n) <= state.burst {
            for _ in 0..n {
                state.timestamps.push_back(at);
            }
            true
        } else {
            false
        }
    }

    async fn wait_n(&self, cancel: &CancellationToken, n: u64) -> WaitResult {
        // Explicit loop: the re-check after sleeping must validate against
        // entries that may have changed while suspended.
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }
            let now = Instant::now();
            let deadline = {
                let mut state = self.lock_state();
                Self::cleanup(&mut state, now);
                if n > state.burst {
                    return Err(RateLimitError::BeyondCapacity {
                        acquiring: n,
                        capacity: state.burst,
                    });
                }
                if (state.timestamps.len() as u64).saturating_add(n) <= state.burst {
                    for _ in 0..n {
                        state.timestamps.push_back(now);
                    }
                    return Ok(());
                }
                // The request fits once enough of the oldest entries expire.
                state.window.map(|window| {
                    let need = ((state.timestamps.len() as u64).saturating_add(n) - state.burst)
                        .min(state.timestamps.len() as u64) as usize;
                    state.timestamps[need - 1] + window + RETRY_MARGIN
                })
            };
            match deadline {
                Some(deadline) => {
                    trace!(units = n, "window full, suspending until entries expire");
                    tokio::select! {
                        _ = sleep_until(deadline.into()) => {}
                        _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                    }
                }
                // Nothing ever ages out at a non-positive rate; only
                // cancellation can end this wait.
                None => {
                    cancel.cancelled().await;
                    return Err(RateLimitError::Cancelled);
                }
            }
        }
    }

    /// Degenerates to an immediate try-admit: a grant acting at `at`, or a
    /// denied reservation if the window is full. Promising a future slot
    /// would be unsound, since concurrent admissions can change which
    /// entries expire first.
    fn reserve_n(&self, at: Instant, n: u64) -> Reservation {
        if self.allow_n(at, n) {
            Reservation::granted(self.weak_self.clone(), n, at, self.limit())
        } else {
            Reservation::denied(n, self.limit())
        }
    }

    /// Slots not yet used in the current window, an approximation.
    fn tokens_at(&self, at: Instant) -> f64 {
        let mut state = self.lock_state();
        Self::cleanup(&mut state, at);
        state.burst.saturating_sub(state.timestamps.len() as u64) as f64
    }

    fn limit(&self) -> Limit {
        self.lock_state().limit
    }

    fn set_limit_at(&self, at: Instant, new_limit: Limit) {
        let mut state = self.lock_state();
        Self::cleanup(&mut state, at);
        trace!(%new_limit, "sliding window rate changed");
        state.limit = new_limit;
        state.window = new_limit.window(state.burst);
    }

    fn burst(&self) -> u64 {
        self.lock_state().burst
    }

    fn set_burst_at(&self, at: Instant, new_burst: u64) {
        let mut state = self.lock_state();
        Self::cleanup(&mut state, at);
        state.burst = new_burst;
        state.window = state.limit.window(new_burst);
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindow
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_tokens: false,
            supports_burst: false,
            supports_reservation: false,
        }
    }
}

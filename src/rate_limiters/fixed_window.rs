use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::clock;
use crate::error::{RateLimitError, WaitResult};
use crate::limit::Limit;
use crate::rate_limiter::RateLimiter;
use crate::reservation::Reservation;
use crate::types::{Algorithm, Capabilities};

/// Fixed window limiter.
///
/// Counts admissions per window of `burst / rate` seconds and resets the
/// counter at each boundary. Boundaries fall on whole multiples of the
/// window after [`window_origin`](crate::window_origin), not at first-use
/// instants, so all fixed-window limiters in a process share one boundary
/// grid.
///
/// Up to `2 × burst` units can be admitted in quick succession across a
/// boundary (a full window just before it, a fresh window just after).
/// That is the classic fixed-window artifact and intentional algorithm
/// semantics, not a defect of this implementation.
///
/// Reservations degenerate to an immediate try-admit, as for
/// [`SlidingWindowLimiter`](crate::rate_limiters::SlidingWindowLimiter);
/// `wait_n` sleeps until the next boundary and re-checks in a loop.
pub struct FixedWindowLimiter {
    weak_self: Weak<FixedWindowLimiter>,
    state: Mutex<FixedWindowState>,
}

/// Internal state of the fixed window counter.
struct FixedWindowState {
    limit: Limit,
    burst: u64,
    /// Window length; `None` when the counter never resets (non-positive rate).
    window: Option<Duration>,
    /// Units admitted in the current window.
    count: u64,
    /// Start of the current window, boundary-aligned.
    window_start: Instant,
}

impl FixedWindowLimiter {
    /// Creates a fixed window limiter admitting at most `burst` units per
    /// aligned window of `burst / limit` seconds.
    pub fn new(limit: Limit, burst: u64) -> Arc<Self> {
        let now = Instant::now();
        let window = limit.window(burst);
        Arc::new_cyclic(|weak| FixedWindowLimiter {
            weak_self: weak.clone(),
            state: Mutex::new(FixedWindowState {
                limit,
                burst,
                window,
                count: 0,
                window_start: match window {
                    Some(window) => clock::align_to_window(now, window),
                    None => now,
                },
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, FixedWindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets the counter when `at` has crossed into a new window.
    fn roll_window(state: &mut FixedWindowState, at: Instant) {
        if state.limit.is_unlimited() {
            state.count = 0;
            return;
        }
        let Some(window) = state.window else {
            return;
        };
        if at.saturating_duration_since(state.window_start) >= window {
            state.count = 0;
            state.window_start = clock::align_to_window(at, window);
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    fn allow_n(&self, at: Instant, n: u64) -> bool {
        let mut state = self.lock_state();
        Self::roll_window(&mut state, at);
        if state.count.saturating_add(n) <= state.burst {
            state.count += n;
            true
        } else {
            false
        }
    }

    async fn wait_n(&self, cancel: &CancellationToken, n: u64) -> WaitResult {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }
            let now = Instant::now();
            let deadline = {
                let mut state = self.lock_state();
                Self::roll_window(&mut state, now);
                if n > state.burst {
                    return Err(RateLimitError::BeyondCapacity {
                        acquiring: n,
                        capacity: state.burst,
                    });
                }
                if state.count.saturating_add(n) <= state.burst {
                    state.count += n;
                    return Ok(());
                }
                state.window.map(|window| state.window_start + window)
            };
            match deadline {
                Some(deadline) => {
                    trace!(units = n, "window exhausted, suspending until next boundary");
                    tokio::select! {
                        _ = sleep_until(deadline.into()) => {}
                        _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                    }
                }
                // The counter never resets at a non-positive rate; only
                // cancellation can end this wait.
                None => {
                    cancel.cancelled().await;
                    return Err(RateLimitError::Cancelled);
                }
            }
        }
    }

    /// Degenerates to an immediate try-admit; see
    /// [`SlidingWindowLimiter::reserve_n`](crate::rate_limiters::SlidingWindowLimiter).
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
        Self::roll_window(&mut state, at);
        state.burst.saturating_sub(state.count) as f64
    }

    fn limit(&self) -> Limit {
        self.lock_state().limit
    }

    fn set_limit_at(&self, at: Instant, new_limit: Limit) {
        let mut state = self.lock_state();
        Self::roll_window(&mut state, at);
        trace!(%new_limit, "fixed window rate changed");
        state.limit = new_limit;
        state.window = new_limit.window(state.burst);
    }

    fn burst(&self) -> u64 {
        self.lock_state().burst
    }

    fn set_burst_at(&self, at: Instant, new_burst: u64) {
        let mut state = self.lock_state();
        Self::roll_window(&mut state, at);
        state.burst = new_burst;
        state.window = state.limit.window(new_burst);
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_tokens: false,
            supports_burst: false,
            supports_reservation: false,
        }
    }
}

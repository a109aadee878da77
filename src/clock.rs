//! Process-wide time origin for fixed-window boundary alignment.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

static WINDOW_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// The instant all fixed-window boundaries in this process are measured from.
///
/// Window boundaries fall on whole multiples of the window duration after
/// this origin, so every fixed-window limiter in the process shares the same
/// boundary grid regardless of when it was constructed. The origin is pinned
/// on first use and never moves.
pub fn window_origin() -> Instant {
    *WINDOW_ORIGIN
}

/// Truncates `at` down to the nearest window boundary at or before it.
///
/// Instants before the origin truncate to the origin itself.
pub(crate) fn align_to_window(at: Instant, window: Duration) -> Instant {
    let origin = window_origin();
    if window.is_zero() {
        return at;
    }
    let elapsed = at.saturating_duration_since(origin);
    let periods = elapsed.as_nanos() / window.as_nanos();
    origin + Duration::from_nanos((periods * window.as_nanos()) as u64)
}

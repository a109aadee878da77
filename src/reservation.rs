//! Provisional grants of future admission.

use std::sync::Weak;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::limit::Limit;
use crate::rate_limiter::RateLimiter;

/// A provisional grant of `units` admissions at a computed future instant.
///
/// Produced by [`RateLimiter::reserve_n`]. A granted reservation has already
/// committed the owning limiter's state as if the units were consumed at the
/// computed instant; the caller's side of the bargain is to delay acting
/// until [`delay`](Reservation::delay) has elapsed.
///
/// A reservation that is not [`ok`](Reservation::ok) carries no grant: the
/// request could never be satisfied under the limiter's current capacity and
/// no state was mutated.
///
/// # Cancellation is best effort
///
/// [`cancel`](Reservation::cancel) routes a cancellation request back to the
/// owning limiter, but none of the shipped algorithms can return reserved
/// units to the pool, so the consumed capacity stays consumed. This is a
/// known limitation of the design, not an oversight.
#[derive(Debug)]
pub struct Reservation {
    units: u64,
    limit: Limit,
    grant: Option<Grant>,
}

#[derive(Debug)]
struct Grant {
    time_to_act: Instant,
    owner: Weak<dyn RateLimiter>,
}

impl Reservation {
    /// A reservation committed by its owner for `units` at `time_to_act`.
    pub(crate) fn granted(
        owner: Weak<dyn RateLimiter>,
        units: u64,
        time_to_act: Instant,
        limit: Limit,
    ) -> Self {
        Reservation {
            units,
            limit,
            grant: Some(Grant { time_to_act, owner }),
        }
    }

    /// A reservation that could never be satisfied; mutates nothing.
    pub(crate) fn denied(units: u64, limit: Limit) -> Self {
        Reservation {
            units,
            limit,
            grant: None,
        }
    }

    /// Whether the requested units were (or will be) granted.
    pub fn ok(&self) -> bool {
        self.grant.is_some()
    }

    /// The number of units this reservation asked for.
    pub fn units(&self) -> u64 {
        self.units
    }

    /// The rate in effect when the reservation was created.
    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// The instant at or after which the reserved units count as consumed,
    /// or `None` for a denied reservation.
    pub fn time_to_act(&self) -> Option<Instant> {
        self.grant.as_ref().map(|grant| grant.time_to_act)
    }

    /// How long to wait from now before acting; see
    /// [`delay_from`](Reservation::delay_from).
    pub fn delay(&self) -> Option<Duration> {
        self.delay_from(Instant::now())
    }

    /// How long to wait from `at` before acting on the reservation.
    ///
    /// Returns `Some(Duration::ZERO)` once the time to act has passed, and
    /// `None` for a denied reservation.
    pub fn delay_from(&self, at: Instant) -> Option<Duration> {
        self.grant
            .as_ref()
            .map(|grant| grant.time_to_act.saturating_duration_since(at))
    }

    /// Cancels the reservation as of now; see
    /// [`cancel_at`](Reservation::cancel_at).
    pub fn cancel(&self) {
        self.cancel_at(Instant::now());
    }

    /// Best-effort cancellation of the reservation as of `at`.
    ///
    /// The request is routed back to the owning limiter if it is still
    /// alive. Consumed capacity is not restored (see the type-level note),
    /// so callers must not rely on cancellation to free up admissions.
    pub fn cancel_at(&self, at: Instant) {
        let Some(grant) = self.grant.as_ref() else {
            return;
        };
        let Some(owner) = grant.owner.upgrade() else {
            return;
        };
        trace!(units = self.units, "cancelling reservation (best effort)");
        owner.cancel_reservation(at, self.units);
    }
}

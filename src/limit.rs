//! Rate representation shared by all limiter algorithms.

use core::fmt;
use std::time::Duration;

/// The admission rate of a limiter, in units per second.
///
/// A limit is either a finite number of units per second or [`Limit::Unlimited`].
/// The unlimited case is a distinct variant rather than a floating-point
/// sentinel, so it can be matched on before any rate arithmetic happens.
///
/// A finite rate of zero (or below) is valid and means the limiter never
/// replenishes: once the initial burst is spent, nothing more is admitted.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use rate_gate::Limit;
///
/// assert_eq!(Limit::per_minute(120.0), Limit::per_second(2.0));
/// assert_eq!(Limit::every(Duration::from_millis(250)), Limit::per_second(4.0));
/// assert!(Limit::every(Duration::ZERO).is_unlimited());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    /// A finite rate in admission units per second.
    Finite(f64),
    /// No rate limit: every advance saturates the limiter back to full capacity.
    Unlimited,
}

impl Limit {
    /// Converts a minimum interval between admissions into a rate.
    ///
    /// A zero interval yields [`Limit::Unlimited`].
    pub fn every(interval: Duration) -> Limit {
        if interval.is_zero() {
            return Limit::Unlimited;
        }
        Limit::Finite(1.0 / interval.as_secs_f64())
    }

    /// A rate of `n` admissions per second.
    pub fn per_second(n: f64) -> Limit {
        Limit::Finite(n)
    }

    /// A rate of `n` admissions per minute.
    pub fn per_minute(n: f64) -> Limit {
        Limit::Finite(n / 60.0)
    }

    /// A rate of `n` admissions per hour.
    pub fn per_hour(n: f64) -> Limit {
        Limit::Finite(n / 3600.0)
    }

    /// Returns whether this limit is [`Limit::Unlimited`].
    pub fn is_unlimited(self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// The positive replenishment rate, if there is one.
    ///
    /// Unlimited and non-positive rates return `None`: neither has a
    /// meaningful units-per-second value to divide by.
    pub(crate) fn replenish_rate(self) -> Option<f64> {
        match self {
            Limit::Finite(rate) if rate > 0.0 => Some(rate),
            _ => None,
        }
    }

    /// The accounting window implied by this rate and a burst of `burst`
    /// units, `burst / rate` seconds.
    ///
    /// `None` when the window is boundless: an unlimited rate never needs
    /// one, and a non-positive rate means history never ages out.
    pub(crate) fn window(self, burst: u64) -> Option<Duration> {
        self.replenish_rate()
            .map(|rate| Duration::from_secs_f64(burst as f64 / rate))
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Finite(rate) => write!(f, "{} units/s", rate),
            Limit::Unlimited => write!(f, "unlimited"),
        }
    }
}

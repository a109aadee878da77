use std::time::{Duration, Instant};

use rate_gate::rate_limiters::TokenBucketLimiter;
use rate_gate::{Limit, RateLimiter};

#[test]
fn starts_full_and_bounds_burst() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
    let t0 = Instant::now();

    // Bucket starts full: exactly 5 single-unit admissions at one instant.
    for _ in 0..5 {
        assert!(bucket.allow_n(t0, 1));
    }
    assert!(!bucket.allow_n(t0, 1));
}

#[test]
fn burst_bound_holds_with_zero_rate() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(0.0), 3);
    let t0 = Instant::now();

    // With no replenishment even spread-out calls only get the initial burst.
    assert!(bucket.allow_n(t0, 1));
    assert!(bucket.allow_n(t0 + Duration::from_secs(10), 1));
    assert!(bucket.allow_n(t0 + Duration::from_secs(20), 1));
    assert!(!bucket.allow_n(t0 + Duration::from_secs(3600), 1));
    assert_eq!(bucket.tokens_at(t0 + Duration::from_secs(3600)), 0.0);
}

#[test]
fn replenishes_at_rate() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
    let t0 = Instant::now();

    assert!(bucket.allow_n(t0, 5));

    // After half a second at 10 units/s, 5 tokens have accrued.
    let tokens = bucket.tokens_at(t0 + Duration::from_millis(500));
    assert!((tokens - 5.0).abs() < 1e-9, "tokens = {}", tokens);
}

#[test]
fn replenishment_caps_at_burst() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
    let t0 = Instant::now();

    assert!(bucket.allow_n(t0, 5));

    // A long idle stretch refills to the burst, no further.
    let tokens = bucket.tokens_at(t0 + Duration::from_secs(120));
    assert!((tokens - 5.0).abs() < 1e-9, "tokens = {}", tokens);
}

#[test]
fn fractional_tokens_accumulate() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(2.0), 4);
    let t0 = Instant::now();

    assert!(bucket.allow_n(t0, 4));

    // 0.5 tokens after 250ms: not enough for a unit.
    assert!(!bucket.allow_n(t0 + Duration::from_millis(250), 1));

    // The fraction carries: 250ms later the full token is there.
    assert!(bucket.allow_n(t0 + Duration::from_millis(500), 1));
}

#[test]
fn reserve_spends_into_deficit() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
    let t0 = Instant::now();

    assert!(bucket.allow_n(t0, 5));

    let reservation = bucket.reserve_n(t0, 3);
    assert!(reservation.ok());

    // 3 tokens at 10/s: 300ms (plus the epsilon nudge).
    let delay = reservation.delay_from(t0).unwrap();
    assert!(delay >= Duration::from_millis(300));
    assert!(delay < Duration::from_millis(301));

    // The reservation deducted immediately: the balance is negative and
    // later admissions see the deficit.
    assert_eq!(bucket.tokens_at(t0), -3.0);
    assert!(!bucket.allow_n(t0, 1));
}

#[test]
fn reserve_beyond_burst_is_denied_without_mutation() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
    let t0 = Instant::now();

    let reservation = bucket.reserve_n(t0, 6);
    assert!(!reservation.ok());
    assert_eq!(reservation.delay_from(t0), None);
    assert_eq!(reservation.time_to_act(), None);

    // Nothing was committed.
    assert_eq!(bucket.tokens_at(t0), 5.0);
}

#[test]
fn reserve_with_tokens_available_is_immediate() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(10.0), 5);
    let t0 = Instant::now();

    let reservation = bucket.reserve_n(t0, 2);
    assert!(reservation.ok());
    assert_eq!(reservation.delay_from(t0), Some(Duration::ZERO));
    assert_eq!(bucket.tokens_at(t0), 3.0);
}

#[test]
fn reservation_delay_predicts_admission() {
    // Twin limiters with identical history: the delay computed by a
    // reservation on one names the instant at which a fresh admission on
    // the other succeeds.
    let reserved = TokenBucketLimiter::new(Limit::per_second(100.0), 10);
    let untouched = TokenBucketLimiter::new(Limit::per_second(100.0), 10);
    let t0 = Instant::now();

    assert!(reserved.allow_n(t0, 10));
    assert!(untouched.allow_n(t0, 10));

    let reservation = reserved.reserve_n(t0, 4);
    assert!(reservation.ok());
    let delay = reservation.delay_from(t0).unwrap();
    assert!(delay > Duration::ZERO);

    assert!(untouched.allow_n(t0 + delay, 4));
}

#[test]
fn set_limit_preserves_accrued_history() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(5.0), 10);
    let t0 = Instant::now();

    assert!(bucket.allow_n(t0, 10));

    // One second at the old rate accrues 5 tokens before the new rate
    // takes effect.
    bucket.set_limit_at(t0 + Duration::from_secs(1), Limit::per_second(10.0));
    assert_eq!(bucket.limit(), Limit::per_second(10.0));

    // 5 + 10 * 0.5, capped at the burst of 10.
    let tokens = bucket.tokens_at(t0 + Duration::from_millis(1500));
    assert!((tokens - 10.0).abs() < 1e-9, "tokens = {}", tokens);
}

#[test]
fn set_burst_clamps_balance() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(0.0), 10);
    let t0 = Instant::now();

    bucket.set_burst_at(t0, 4);
    assert_eq!(bucket.burst(), 4);
    assert_eq!(bucket.tokens_at(t0), 4.0);
    assert!(!bucket.allow_n(t0, 5));
    assert!(bucket.allow_n(t0, 4));
}

#[test]
fn unlimited_rate_always_admits() {
    let bucket = TokenBucketLimiter::new(Limit::Unlimited, 1);
    let t0 = Instant::now();

    for _ in 0..1000 {
        assert!(bucket.allow_n(t0, 1));
    }
    assert_eq!(bucket.tokens_at(t0), 1.0);
}

#[test]
fn historical_timestamps_never_rewind_accounting() {
    let bucket = TokenBucketLimiter::new(Limit::per_second(1.0), 5);
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(1);

    assert!(bucket.allow_n(t1, 5));

    // An older timestamp neither re-accrues nor rewinds: the balance stays
    // where the newest operation left it.
    assert_eq!(bucket.tokens_at(t0), 0.0);
    assert!(!bucket.allow_n(t0, 1));
}

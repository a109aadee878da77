//! Blocking-wait, cancellation, and reservation behavior across algorithms.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use rate_gate::{new_limiter, Algorithm, Limit, RateLimitError, RateLimiter};

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::TokenBucket,
    Algorithm::LeakyBucket,
    Algorithm::SlidingWindow,
    Algorithm::FixedWindow,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rate_gate=trace".into()),
        )
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn wait_returns_immediately_with_capacity_available() {
    for algorithm in ALGORITHMS {
        let limiter = new_limiter(algorithm, Limit::per_second(10.0), 5);
        let cancel = CancellationToken::new();

        let started = Instant::now();
        limiter.wait(&cancel).await.unwrap_or_else(|err| {
            panic!("{algorithm}: unexpected wait error: {err}");
        });
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "{algorithm}: immediate wait took {:?}",
            started.elapsed()
        );
    }
}

#[tokio::test]
async fn wait_admits_after_short_delay() {
    init_tracing();
    for algorithm in ALGORITHMS {
        // Burst 1 at 100/s: one admission, then roughly 10ms until the next.
        let limiter = new_limiter(algorithm, Limit::per_second(100.0), 1);
        let cancel = CancellationToken::new();

        assert!(limiter.allow(), "{algorithm}: first admission denied");

        let started = Instant::now();
        limiter.wait(&cancel).await.unwrap_or_else(|err| {
            panic!("{algorithm}: unexpected wait error: {err}");
        });
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "{algorithm}: wait took {:?}",
            started.elapsed()
        );
    }
}

#[tokio::test]
async fn wait_with_cancelled_token_reports_cancellation() {
    for algorithm in ALGORITHMS {
        let limiter = new_limiter(algorithm, Limit::per_second(1.0), 1);
        assert!(limiter.allow(), "{algorithm}");

        // The signal fired before the wait even started: the error must be
        // cancellation, not a capacity or timing failure.
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = limiter.wait(&cancel).await.unwrap_err();
        assert_eq!(err, RateLimitError::Cancelled, "{algorithm}");
    }
}

#[tokio::test]
async fn cancellation_interrupts_a_long_wait() {
    for algorithm in ALGORITHMS {
        // One admission per hour: the wait would be far longer than the test.
        let limiter = new_limiter(algorithm, Limit::per_hour(1.0), 1);
        assert!(limiter.allow(), "{algorithm}");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = limiter.wait(&cancel).await.unwrap_err();
        assert_eq!(err, RateLimitError::Cancelled, "{algorithm}");
        assert!(
            started.elapsed() >= Duration::from_millis(40),
            "{algorithm}: returned before the cancel fired"
        );
    }
}

#[tokio::test]
async fn wait_n_beyond_capacity_fails_fast() {
    for algorithm in ALGORITHMS {
        let limiter = new_limiter(algorithm, Limit::per_second(10.0), 5);
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let err = limiter.wait_n(&cancel, 6).await.unwrap_err();
        assert_eq!(
            err,
            RateLimitError::BeyondCapacity {
                acquiring: 6,
                capacity: 5
            },
            "{algorithm}"
        );
        // Synchronous denial: no wait happened.
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "{algorithm}: capacity error was not immediate"
        );
    }
}

#[tokio::test]
async fn zero_rate_wait_only_ends_by_cancellation() {
    // With nothing ever aging out, the window algorithms cannot admit a
    // waiter; the wait must park until the caller gives up.
    for algorithm in [Algorithm::SlidingWindow, Algorithm::FixedWindow] {
        let limiter = new_limiter(algorithm, Limit::per_second(0.0), 1);
        assert!(limiter.allow(), "{algorithm}");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = limiter.wait(&cancel).await.unwrap_err();
        assert_eq!(err, RateLimitError::Cancelled, "{algorithm}");
    }
}

#[tokio::test]
async fn wait_commits_the_admitted_capacity() {
    init_tracing();
    // Burst 1 at 10/s: the waiter's admission consumes the token that
    // accrues during its 100ms sleep.
    let limiter = new_limiter(Algorithm::TokenBucket, Limit::per_second(10.0), 1);
    let cancel = CancellationToken::new();

    assert!(limiter.allow());
    limiter.wait(&cancel).await.expect("waiter admitted");

    // Immediately afterwards the bucket is spent again.
    assert!(!limiter.allow());
}

#[tokio::test]
async fn concurrent_waiters_are_each_admitted() {
    let limiter = new_limiter(Algorithm::TokenBucket, Limit::per_second(100.0), 1);
    let cancel = CancellationToken::new();

    assert!(limiter.allow());

    // Each waiter reserves its own slot up front; all three are admitted
    // at roughly 10ms spacing without coordinating.
    let (a, b, c) = tokio::join!(
        limiter.wait(&cancel),
        limiter.wait(&cancel),
        limiter.wait(&cancel),
    );
    assert_eq!((a, b, c), (Ok(()), Ok(()), Ok(())));
}

#[tokio::test]
async fn cancelling_a_reservation_does_not_restore_capacity() {
    let limiter = new_limiter(Algorithm::TokenBucket, Limit::per_second(0.0), 2);
    let t0 = Instant::now();

    assert!(limiter.allow_n(t0, 2));

    let reservation = limiter.reserve_n(t0, 1);
    assert!(reservation.ok());
    assert_eq!(limiter.tokens_at(t0), -1.0);

    // Best-effort cancellation: the spent unit stays spent.
    reservation.cancel_at(t0);
    assert_eq!(limiter.tokens_at(t0), -1.0);
}

#[tokio::test]
async fn leaky_bucket_wait_drains_in_arrival_order() {
    // Capacity 1 at 100/s. The first wait queues its unit with ~10ms of
    // drain delay and is admitted after sleeping it off.
    let limiter = new_limiter(Algorithm::LeakyBucket, Limit::per_second(100.0), 1);
    let cancel = CancellationToken::new();

    assert!(limiter.allow());

    let started = Instant::now();
    limiter.wait(&cancel).await.expect("waiter admitted");
    assert!(
        started.elapsed() >= Duration::from_millis(5),
        "wait returned before the queued unit drained"
    );
}

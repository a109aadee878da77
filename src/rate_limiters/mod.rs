//! Limiter algorithm implementations.
//!
//! Each engine owns its private, mutex-guarded accounting state and
//! implements the full [`RateLimiter`](crate::RateLimiter) contract. Pick
//! one directly, or go through [`new_limiter`](crate::new_limiter) to select
//! by [`Algorithm`](crate::Algorithm) tag.
//!
//! # Algorithm Comparison
//!
//! | Algorithm | State | Burst Handling | Reservation | Use Case |
//! |-----------|-------|----------------|-------------|----------|
//! | Token Bucket | fractional token count | allows bursts | true future delay | bursty traffic |
//! | Leaky Bucket | queued admission timestamps | smooths to rate | true future delay | steady draining |
//! | Sliding Window | timestamp log | smooth bound | immediate only | accurate trailing limit |
//! | Fixed Window | aligned counter | boundary bursts | immediate only | simple counting |
//!
//! # Thread Safety
//!
//! All engines are safe for concurrent use; admission decisions are
//! linearized by each engine's internal lock. Only `wait`/`wait_n` suspend,
//! and never while holding the lock.

pub mod token_bucket;
pub use token_bucket::TokenBucketLimiter;

pub mod leaky_bucket;
pub use leaky_bucket::LeakyBucketLimiter;

pub mod sliding_window;
pub use sliding_window::SlidingWindowLimiter;

pub mod fixed_window;
pub use fixed_window::FixedWindowLimiter;

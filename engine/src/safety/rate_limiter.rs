//! Fixed-window rate limiter
//!
//! `capacity` calls are available per window. Tokens are restored to full
//! capacity only once the whole window has elapsed since the last refill; there
//! is no gradual leak.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::SafetyRejection;

#[derive(Debug)]
struct Bucket {
    available: u32,
    window_start: Instant,
}

impl Bucket {
    fn window_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }
}

/// Fixed-window token counter
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_start(config, Instant::now())
    }

    /// Limiter whose first window starts at `start`
    pub fn with_start(config: &RateLimitConfig, start: Instant) -> Self {
        Self {
            capacity: config.max_calls,
            window: config.interval(),
            bucket: Mutex::new(Bucket {
                available: config.max_calls,
                window_start: start,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Tokens that a call at `now` would see
    pub fn available_tokens(&self) -> u32 {
        self.available_tokens_at(Instant::now())
    }

    pub fn available_tokens_at(&self, now: Instant) -> u32 {
        let bucket = self.bucket.lock();
        if bucket.window_expired(self.window, now) {
            self.capacity
        } else {
            bucket.available
        }
    }

    /// Whether a call would be allowed now. Does not consume a token.
    pub fn check(&self) -> Result<(), SafetyRejection> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Result<(), SafetyRejection> {
        if self.available_tokens_at(now) > 0 {
            Ok(())
        } else {
            let bucket = self.bucket.lock();
            Err(self.rejection(&bucket, now))
        }
    }

    /// Consume one token
    pub fn try_acquire(&self) -> Result<(), SafetyRejection> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<(), SafetyRejection> {
        let mut bucket = self.bucket.lock();
        if bucket.window_expired(self.window, now) {
            bucket.available = self.capacity;
            bucket.window_start = now;
        }
        if bucket.available == 0 {
            let rejection = self.rejection(&bucket, now);
            tracing::warn!("Rate limit reached: {}", rejection);
            return Err(rejection);
        }
        bucket.available -= 1;
        Ok(())
    }

    /// Refill immediately and start a new window
    pub fn reset(&self) {
        let mut bucket = self.bucket.lock();
        bucket.available = self.capacity;
        bucket.window_start = Instant::now();
    }

    fn rejection(&self, bucket: &Bucket, now: Instant) -> SafetyRejection {
        let elapsed = now.saturating_duration_since(bucket.window_start);
        SafetyRejection::RateLimited {
            capacity: self.capacity,
            window: self.window,
            retry_in: self.window.saturating_sub(elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_calls: u32, interval_ms: u64, start: Instant) -> RateLimiter {
        RateLimiter::with_start(&RateLimitConfig { max_calls, interval_ms }, start)
    }

    #[test]
    fn test_five_per_second_then_full_reset() {
        let t0 = Instant::now();
        let rl = limiter(5, 1000, t0);
        for i in 0..5 {
            rl.try_acquire_at(t0 + Duration::from_millis(i * 100)).unwrap();
        }
        let denied = rl.try_acquire_at(t0 + Duration::from_millis(500));
        assert!(matches!(denied, Err(SafetyRejection::RateLimited { capacity: 5, .. })));

        // window boundary itself is not past the window
        assert!(rl.try_acquire_at(t0 + Duration::from_millis(1000)).is_err());

        let after = t0 + Duration::from_millis(1001);
        assert_eq!(rl.available_tokens_at(after), 5);
        rl.try_acquire_at(after).unwrap();
        assert_eq!(rl.available_tokens_at(after), 4);
    }

    #[test]
    fn test_no_gradual_refill() {
        let t0 = Instant::now();
        let rl = limiter(2, 1000, t0);
        rl.try_acquire_at(t0).unwrap();
        rl.try_acquire_at(t0).unwrap();
        // most of the window gone, still nothing back
        assert_eq!(rl.available_tokens_at(t0 + Duration::from_millis(900)), 0);
        match rl.check_at(t0 + Duration::from_millis(900)) {
            Err(SafetyRejection::RateLimited { retry_in, .. }) => assert_eq!(retry_in, Duration::from_millis(100)),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_new_window_starts_at_refill() {
        let t0 = Instant::now();
        let rl = limiter(1, 1000, t0);
        rl.try_acquire_at(t0).unwrap();
        let t1 = t0 + Duration::from_millis(1500);
        rl.try_acquire_at(t1).unwrap();
        // 1000ms from t0 has passed but not from the refill at t1
        assert!(rl.try_acquire_at(t0 + Duration::from_millis(2100)).is_err());
        assert!(rl.try_acquire_at(t1 + Duration::from_millis(1001)).is_ok());
    }

    #[test]
    fn test_check_does_not_consume() {
        let rl = limiter(1, 60_000, Instant::now());
        rl.check().unwrap();
        rl.check().unwrap();
        assert_eq!(rl.available_tokens(), 1);
        rl.try_acquire().unwrap();
        assert!(rl.check().is_err());
        rl.reset();
        assert_eq!(rl.available_tokens(), 1);
    }
}

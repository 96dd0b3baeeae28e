use crate::limiter::{per, RateLimiter};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::time::Duration;

/// Elementary limiter backed by a `governor` token bucket
///
/// Permits `events` per `period`, spread evenly with a burst of one.
pub struct GovernorLimiter {
    inner: DefaultDirectRateLimiter,
    rate: f64,
}

impl GovernorLimiter {
    /// Returns `None` when `events` or `period` is zero
    pub fn new(events: u32, period: Duration) -> Option<Self> {
        let events = NonZeroU32::new(events)?;
        let quota = Quota::with_period(period / events.get())?;

        Some(Self {
            inner: DefaultDirectRateLimiter::direct(quota),
            rate: per(events.get(), period),
        })
    }
}

#[async_trait]
impl RateLimiter for GovernorLimiter {
    async fn wait(&self) {
        self.inner.until_ready().await;
    }

    fn limit(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_rejects_zero() {
        assert!(GovernorLimiter::new(0, Duration::from_secs(1)).is_none());
        assert!(GovernorLimiter::new(1, Duration::ZERO).is_none());
    }

    #[test]
    fn test_limit() {
        let limiter = GovernorLimiter::new(2, Duration::from_secs(1)).unwrap();
        assert_eq!(limiter.limit(), 2.0);
    }

    #[tokio::test]
    async fn test_second_event_is_delayed() {
        let limiter = GovernorLimiter::new(2, Duration::from_secs(1)).unwrap();

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}

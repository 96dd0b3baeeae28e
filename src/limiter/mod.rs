//! Rate limiting for task fetches
//!
//! A task may carry a limiter that gates how fast its requests are fetched.
//! Limiters report their rate in events per second so that several of them can
//! be composed with [`MultiLimiter`].

mod governed;
mod multi;

pub use governed::GovernorLimiter;
pub use multi::MultiLimiter;

use async_trait::async_trait;
use std::time::Duration;

/// An elementary or composite rate limiter
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Waits until one more event is permitted
    async fn wait(&self);

    /// Permitted events per second; `f64::INFINITY` means unlimited
    fn limit(&self) -> f64;
}

/// Converts `events` per `period` into a rate in events per second
///
/// A zero period yields an unlimited rate.
pub fn per(events: u32, period: Duration) -> f64 {
    if period.is_zero() {
        return f64::INFINITY;
    }
    f64::from(events) / period.as_secs_f64()
}

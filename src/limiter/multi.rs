use crate::limiter::RateLimiter;
use async_trait::async_trait;
use std::sync::Arc;

/// Composite limiter made of several elementary limiters
///
/// Constituents are kept from most permissive to strictest. `wait` goes
/// through them in that order, so the tightest limiter is satisfied last, and
/// `limit` reports the strictest rate.
pub struct MultiLimiter {
    limiters: Vec<Arc<dyn RateLimiter>>,
}

impl MultiLimiter {
    pub fn new(mut limiters: Vec<Arc<dyn RateLimiter>>) -> Self {
        limiters.sort_by(|a, b| b.limit().total_cmp(&a.limit()));
        Self { limiters }
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

#[async_trait]
impl RateLimiter for MultiLimiter {
    async fn wait(&self) {
        for limiter in &self.limiters {
            limiter.wait().await;
        }
    }

    fn limit(&self) -> f64 {
        self.limiters
            .last()
            .map_or(f64::INFINITY, |strictest| strictest.limit())
    }
}

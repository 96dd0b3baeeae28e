//! Tasks built from configuration
//!
//! The engine itself is task-agnostic; this module provides the link-following
//! task the binary runs for each `[[task]]` entry.

mod html;
mod links;

pub use html::{parse_html, resolve_link, ParsedPage};
pub use links::{link_task, ORIGIN_KEY, PAGE_RULE};

use crate::config::{Config, RateLimitEntry};
use crate::limiter::{GovernorLimiter, MultiLimiter, RateLimiter};
use crate::spider::Task;
use crate::{ConfigError, SpindleError};
use std::sync::Arc;
use std::time::Duration;

/// Builds one link task per configured `[[task]]`
pub fn from_config(config: &Config) -> Result<Vec<Task>, SpindleError> {
    config.tasks.iter().map(link_task).collect()
}

/// Combines rate-limit entries into one limiter
///
/// Returns `None` when no entries are configured.
pub fn build_limiter(
    entries: &[RateLimitEntry],
) -> Result<Option<Arc<dyn RateLimiter>>, ConfigError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let limiters = entries
        .iter()
        .map(|entry| {
            GovernorLimiter::new(entry.events, Duration::from_secs(entry.per_secs))
                .map(|limiter| Arc::new(limiter) as Arc<dyn RateLimiter>)
                .ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "Invalid rate limit of {} per {}s",
                        entry.events, entry.per_secs
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Arc::new(MultiLimiter::new(limiters))))
}

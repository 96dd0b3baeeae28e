//! Crawl engine
//!
//! This module contains the core crawling machinery, including:
//! - The scheduler that hands queued requests to workers
//! - The shared frontier: deduplication, failure retry and drain detection
//! - HTTP fetching
//! - The worker pool and overall coordination

mod coordinator;
mod fetcher;
mod frontier;
mod scheduler;
mod worker;

pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use scheduler::{Scheduler, SchedulerError, SchedulerLoop};

//! Output module for reporting crawl results
//!
//! This module handles:
//! - Run statistics collected from the engine counters
//! - Console summaries of stored items

pub mod stats;

pub use stats::{print_statistics, print_table_counts, CrawlStatistics};

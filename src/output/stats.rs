//! Run statistics and their console rendering

use serde::Serialize;

/// Counters collected over one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStatistics {
    /// Successful fetches with a body long enough to parse
    pub fetched: u64,

    /// Fetch errors and short bodies
    pub fetch_failures: u64,

    /// Failed requests that were requeued once
    pub retries: u64,

    /// Failed requests dropped after their retry
    pub abandoned: u64,

    /// Requests dropped for exceeding the task depth
    pub depth_exceeded: u64,

    /// Requests dropped because they were already visited
    pub duplicates: u64,

    /// Parse errors and unknown rules
    pub parse_failures: u64,

    /// Requests produced by parse rules
    pub discovered: u64,

    /// Items produced by parse rules and handed to the aggregator
    pub items: u64,

    /// Items lost to sink failures
    pub items_dropped: u64,

    /// Workers that exited after a panic
    pub worker_faults: u64,
}

impl CrawlStatistics {
    /// Total fetch attempts, successful or not
    pub fn attempts(&self) -> u64 {
        self.fetched + self.fetch_failures
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Fetching:");
    println!("  Pages fetched: {}", stats.fetched);
    println!("  Fetch failures: {}", stats.fetch_failures);
    println!("  Retried: {}", stats.retries);
    println!("  Abandoned: {}", stats.abandoned);
    println!();

    println!("Scheduling:");
    println!("  Requests discovered: {}", stats.discovered);
    println!("  Duplicates skipped: {}", stats.duplicates);
    println!("  Depth exceeded: {}", stats.depth_exceeded);
    println!();

    println!("Output:");
    println!("  Items collected: {}", stats.items);
    if stats.items_dropped > 0 {
        println!("  Items dropped by sink: {}", stats.items_dropped);
    }
    println!("  Parse failures: {}", stats.parse_failures);
    if stats.worker_faults > 0 {
        println!("  Worker faults: {}", stats.worker_faults);
    }
    println!();

    let success_rate = if stats.attempts() > 0 {
        (stats.fetched as f64 / stats.attempts() as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} fetch attempts)",
        success_rate,
        stats.fetched,
        stats.attempts()
    );
}

/// Prints stored item counts per table
pub fn print_table_counts(counts: &[(String, u64)]) {
    println!("=== Stored Items ===\n");

    if counts.is_empty() {
        println!("  (no items stored)");
        return;
    }

    for (table, count) in counts {
        println!("  {}: {}", table, count);
    }

    let total: u64 = counts.iter().map(|(_, count)| count).sum();
    println!("\nTotal: {}", total);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts() {
        let stats = CrawlStatistics {
            fetched: 8,
            fetch_failures: 2,
            ..Default::default()
        };
        assert_eq!(stats.attempts(), 10);
    }

    #[test]
    fn test_serializes() {
        let stats = CrawlStatistics {
            items: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["items"], 3);
        assert_eq!(json["fetched"], 0);
    }
}

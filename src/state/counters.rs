use crate::output::CrawlStatistics;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free run counters updated by workers and the aggregator
#[derive(Debug, Default)]
pub struct Counters {
    pub(crate) fetched: AtomicU64,
    pub(crate) fetch_failures: AtomicU64,
    pub(crate) retries: AtomicU64,
    pub(crate) abandoned: AtomicU64,
    pub(crate) depth_exceeded: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) parse_failures: AtomicU64,
    pub(crate) discovered: AtomicU64,
    pub(crate) items: AtomicU64,
    pub(crate) items_dropped: AtomicU64,
    pub(crate) worker_faults: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CrawlStatistics {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CrawlStatistics {
            fetched: load(&self.fetched),
            fetch_failures: load(&self.fetch_failures),
            retries: load(&self.retries),
            abandoned: load(&self.abandoned),
            depth_exceeded: load(&self.depth_exceeded),
            duplicates: load(&self.duplicates),
            parse_failures: load(&self.parse_failures),
            discovered: load(&self.discovered),
            items: load(&self.items),
            items_dropped: load(&self.items_dropped),
            worker_faults: load(&self.worker_faults),
        }
    }
}

//! Crawl coordinator - engine lifecycle and orchestration
//!
//! This module wires the engine together:
//! - Starting the scheduler loop and a fixed pool of workers
//! - Loading every seed task's root requests
//! - Aggregating extracted items into the storage sink
//! - Drain detection, shutdown and joining

use crate::config::{EngineConfig, FetcherConfig};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::scheduler::{Scheduler, SchedulerLoop};
use crate::crawler::worker::Worker;
use crate::output::CrawlStatistics;
use crate::spider::{Item, Task};
use crate::state::Counters;
use crate::storage::Storage;
use crate::SpindleError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    config: EngineConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    storage: Option<Box<dyn Storage>>,
    seeds: Vec<Arc<Task>>,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            fetcher: None,
            storage: None,
            seeds: Vec::new(),
        }
    }

    /// Replaces worker count, minimum body length and result buffer at once
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.config.worker_count = worker_count;
        self
    }

    /// Bodies shorter than this count as failed fetches; 0 disables the check
    pub fn min_body_len(mut self, min_body_len: usize) -> Self {
        self.config.min_body_length = min_body_len;
        self
    }

    pub fn result_buffer(mut self, result_buffer: usize) -> Self {
        self.config.result_buffer = result_buffer;
        self
    }

    /// Fetcher used by tasks without their own override
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sink for extracted items; without one, items are counted and discarded
    pub fn storage<S: Storage + 'static>(mut self, storage: S) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn seed(mut self, task: Task) -> Self {
        self.seeds.push(Arc::new(task));
        self
    }

    pub fn seeds<I: IntoIterator<Item = Task>>(mut self, tasks: I) -> Self {
        self.seeds.extend(tasks.into_iter().map(Arc::new));
        self
    }

    /// Builds the coordinator, creating the default HTTP fetcher if needed
    pub fn build(self) -> Result<Coordinator, SpindleError> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&FetcherConfig::default())?),
        };

        let (scheduler, scheduler_loop) = Scheduler::new();

        Ok(Coordinator {
            config: self.config,
            fetcher,
            storage: self.storage,
            seeds: self.seeds,
            frontier: Arc::new(Frontier::new(scheduler)),
            scheduler_loop: Some(scheduler_loop),
            workers: JoinSet::new(),
            background: Vec::new(),
        })
    }
}

/// Crawl engine
///
/// Owns the scheduler, the worker pool and the shared frontier for one run.
/// Must be used from within a Tokio runtime.
pub struct Coordinator {
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
    storage: Option<Box<dyn Storage>>,
    seeds: Vec<Arc<Task>>,
    frontier: Arc<Frontier>,
    scheduler_loop: Option<SchedulerLoop>,
    workers: JoinSet<()>,
    /// Seed loader, aggregator and scheduler loop, joined in that order
    /// after the workers
    background: Vec<(&'static str, JoinHandle<()>)>,
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Starts the engine
    ///
    /// Spawns the scheduler loop, the workers, the seed loader and the result
    /// aggregator, then returns without waiting for the crawl. Fails if the
    /// engine was already started.
    pub fn run(&mut self) -> Result<(), SpindleError> {
        let scheduler_loop = self
            .scheduler_loop
            .take()
            .ok_or(SpindleError::AlreadyRunning)?;

        let worker_count = self.config.worker_count.max(1);
        tracing::info!(
            "Starting crawl engine with {} workers and {} tasks",
            worker_count,
            self.seeds.len()
        );

        let scheduler_task = tokio::spawn(scheduler_loop.run());

        let (results_tx, results_rx) = mpsc::channel(self.config.result_buffer.max(1));
        self.frontier.workers_started(worker_count);
        for id in 0..worker_count {
            let worker = Worker::new(
                id,
                Arc::clone(&self.frontier),
                Arc::clone(&self.fetcher),
                results_tx.clone(),
                self.config.min_body_length,
            );
            self.workers.spawn(worker.run());
        }
        // Workers hold the only senders; the aggregator ends once they all exit
        drop(results_tx);

        let seeds = std::mem::take(&mut self.seeds);
        self.background.push((
            "seed loader",
            tokio::spawn(load_seeds(seeds, Arc::clone(&self.frontier))),
        ));
        self.background.push((
            "aggregator",
            tokio::spawn(aggregate(
                results_rx,
                self.storage.take(),
                Arc::clone(&self.frontier),
            )),
        ));
        self.background.push(("scheduler", scheduler_task));

        Ok(())
    }

    /// Closes the scheduler
    ///
    /// Idle workers return immediately and busy workers finish their current
    /// request. Queued requests are discarded. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.frontier.scheduler().is_closed() {
            tracing::info!(
                "Shutting down crawl engine with {} requests outstanding",
                self.frontier.outstanding()
            );
        }
        self.frontier.scheduler().close();
    }

    /// Waits for every worker and background task to finish
    ///
    /// Only returns after [`shutdown`](Self::shutdown); the final storage
    /// flush has happened once it does.
    pub async fn join(&mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        for (name, handle) in self.background.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("{} task failed: {}", name, e);
            }
        }

        tracing::info!("Crawl engine stopped");
    }

    /// Waits until seeding finished and no request is queued or in flight
    ///
    /// Also returns once every worker has exited, in which case the scheduler
    /// is already closed and queued requests were discarded. Never returns if
    /// the engine was not started.
    pub async fn wait_until_idle(&self) {
        self.frontier.wait_until_idle().await;
    }

    /// Starts the engine, waits for it to drain, then shuts down and joins
    pub async fn run_to_completion(&mut self) -> Result<CrawlStatistics, SpindleError> {
        self.run()?;
        self.wait_until_idle().await;
        self.shutdown();
        self.join().await;
        Ok(self.stats())
    }

    /// Snapshot of the run counters
    pub fn stats(&self) -> CrawlStatistics {
        self.frontier.counters().snapshot()
    }

    /// Number of request identities claimed so far
    pub fn visited_count(&self) -> usize {
        self.frontier.visited().len()
    }

    /// URLs that failed at least once, sorted
    pub fn failed_urls(&self) -> Vec<String> {
        self.frontier.failures().urls()
    }
}

/// Runs every task's root generator and queues the results
///
/// A failing or panicking root generator skips its task only. Requests naming
/// a rule the task does not have are dropped.
async fn load_seeds(tasks: Vec<Arc<Task>>, frontier: Arc<Frontier>) {
    for task in tasks {
        let requests = match catch_unwind(AssertUnwindSafe(|| task.root_requests())) {
            Ok(Ok(requests)) => requests,
            Ok(Err(e)) => {
                tracing::error!(task = %task.name, "Root generator failed: {:#}", e);
                continue;
            }
            Err(_) => {
                tracing::error!(task = %task.name, "Root generator panicked");
                continue;
            }
        };

        let mut accepted = Vec::with_capacity(requests.len());
        for mut req in requests {
            if !task.rules().has_rule(&req.rule_name) {
                tracing::warn!(
                    task = %task.name,
                    rule = %req.rule_name,
                    url = %req.url,
                    "Seed request names an unknown rule"
                );
                continue;
            }
            req.stamp(Arc::clone(&task));
            accepted.push(req);
        }

        tracing::info!(task = %task.name, "Seeded {} requests", accepted.len());
        frontier.enqueue(accepted);
    }

    frontier.seeding_done();
}

/// Forwards item batches to the sink until every worker has exited
async fn aggregate(
    mut results: mpsc::Receiver<Vec<Item>>,
    mut storage: Option<Box<dyn Storage>>,
    frontier: Arc<Frontier>,
) {
    let counters = frontier.counters();

    while let Some(items) = results.recv().await {
        let count = items.len();
        Counters::add(&counters.items, count);

        let Some(sink) = storage.as_mut() else {
            tracing::trace!("No storage configured, discarding {} items", count);
            continue;
        };
        if let Err(e) = sink.save(items) {
            let dropped = e.dropped_items().unwrap_or(count);
            Counters::add(&counters.items_dropped, dropped);
            tracing::error!("Failed to save items, dropped {}: {}", dropped, e);
        }
    }

    if let Some(sink) = storage.as_mut() {
        if let Err(e) = sink.flush() {
            let dropped = e.dropped_items().unwrap_or(0);
            Counters::add(&counters.items_dropped, dropped);
            tracing::error!("Final storage flush failed, dropped {}: {}", dropped, e);
        }
    }
    tracing::debug!("Result aggregation finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchError;
    use crate::spider::{ParseResult, Request};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Echo;

    #[async_trait]
    impl Fetcher for Echo {
        async fn get(&self, req: &Request) -> Result<Vec<u8>, FetchError> {
            Ok(req.url.clone().into_bytes())
        }
    }

    fn echo_task(urls: &'static [&'static str]) -> Task {
        Task::builder("echo")
            .wait_time(Duration::ZERO)
            .root(move || Ok(urls.iter().map(|url| Request::new(*url, "page")).collect()))
            .rule("page", |ctx| {
                Ok(ParseResult::new(
                    Vec::new(),
                    vec![ctx.output(serde_json::json!({ "body": ctx.text() }))],
                ))
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_twice_is_error() {
        let mut engine = Coordinator::builder()
            .fetcher(Arc::new(Echo))
            .worker_count(1)
            .build()
            .unwrap();

        engine.run().unwrap();
        assert!(matches!(engine.run(), Err(SpindleError::AlreadyRunning)));

        engine.shutdown();
        timeout(Duration::from_secs(5), engine.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_items_reach_storage_and_flush() {
        let storage = MemoryStorage::new();
        let mut engine = Coordinator::builder()
            .fetcher(Arc::new(Echo))
            .worker_count(2)
            .min_body_len(0)
            .storage(storage.clone())
            .seed(echo_task(&["https://a.test/1", "https://a.test/2"]))
            .build()
            .unwrap();

        let stats = timeout(Duration::from_secs(5), engine.run_to_completion())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.items, 2);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.flush_count(), 1);
        assert!(storage.items().iter().all(|item| item.table == "echo"));
    }

    #[tokio::test]
    async fn test_no_seeds_drains_immediately() {
        let mut engine = Coordinator::builder()
            .fetcher(Arc::new(Echo))
            .worker_count(1)
            .build()
            .unwrap();

        let stats = timeout(Duration::from_secs(5), engine.run_to_completion())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, CrawlStatistics::default());
    }

    #[tokio::test]
    async fn test_unknown_seed_rule_is_skipped() {
        let task = Task::builder("mixed")
            .wait_time(Duration::ZERO)
            .root(|| {
                Ok(vec![
                    Request::new("https://a.test/ok", "page"),
                    Request::new("https://a.test/bad", "missing"),
                ])
            })
            .rule("page", |_| Ok(ParseResult::default()))
            .build()
            .unwrap();

        let mut engine = Coordinator::builder()
            .fetcher(Arc::new(Echo))
            .worker_count(1)
            .min_body_len(0)
            .seed(task)
            .build()
            .unwrap();

        let stats = timeout(Duration::from_secs(5), engine.run_to_completion())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.fetched, 1);
        assert_eq!(engine.visited_count(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_loop_is_joined_last() {
        let mut engine = Coordinator::builder()
            .fetcher(Arc::new(Echo))
            .worker_count(1)
            .build()
            .unwrap();

        engine.run().unwrap();
        let order: Vec<&str> = engine.background.iter().map(|(name, _)| *name).collect();
        assert_eq!(order, vec!["seed loader", "aggregator", "scheduler"]);

        engine.shutdown();
        timeout(Duration::from_secs(5), engine.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let mut engine = Coordinator::builder()
            .fetcher(Arc::new(Echo))
            .worker_count(3)
            .build()
            .unwrap();

        engine.run().unwrap();
        engine.shutdown();
        engine.shutdown();
        timeout(Duration::from_secs(5), engine.join()).await.unwrap();
    }
}

//! Worker loop: pull, filter, fetch, parse, dispatch

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::spider::{Context, Item, ParseResult, Request, Task};
use crate::state::Counters;
use futures::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) struct Worker {
    id: usize,
    frontier: Arc<Frontier>,
    fetcher: Arc<dyn Fetcher>,
    results: mpsc::Sender<Vec<Item>>,
    min_body_len: usize,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        frontier: Arc<Frontier>,
        fetcher: Arc<dyn Fetcher>,
        results: mpsc::Sender<Vec<Item>>,
        min_body_len: usize,
    ) -> Self {
        Self {
            id,
            frontier,
            fetcher,
            results,
            min_body_len,
        }
    }

    /// Processes requests until the scheduler closes
    ///
    /// A panic while processing one request is caught and logged, and ends
    /// this worker only. The other workers keep running. Every exit is
    /// reported to the frontier, which stops the crawl after the last one.
    /// The caller registers the worker with `Frontier::workers_started`.
    pub(crate) async fn run(self) {
        tracing::debug!(worker = self.id, "Worker started");

        while let Some(req) = self.frontier.scheduler().pull().await {
            let url = req.url.clone();
            let outcome = AssertUnwindSafe(self.process(req)).catch_unwind().await;
            self.frontier.finish();

            if let Err(panic) = outcome {
                Counters::bump(&self.frontier.counters().worker_faults);
                tracing::error!(
                    worker = self.id,
                    url = %url,
                    "Worker panicked, stopping it: {}",
                    panic_message(panic.as_ref())
                );
                break;
            }
        }

        self.frontier.worker_exited();
        tracing::debug!(worker = self.id, "Worker stopped");
    }

    async fn process(&self, req: Request) {
        let Some(task) = req.task().cloned() else {
            tracing::warn!(url = %req.url, "Dropping request without a task");
            return;
        };
        let counters = self.frontier.counters();

        if req.depth > task.max_depth {
            Counters::bump(&counters.depth_exceeded);
            tracing::debug!(
                task = %task.name,
                url = %req.url,
                depth = req.depth,
                max_depth = task.max_depth,
                "Depth limit exceeded"
            );
            return;
        }

        if !self.frontier.mark_if_unvisited(&req) {
            Counters::bump(&counters.duplicates);
            tracing::trace!(task = %task.name, url = %req.url, "Already visited");
            return;
        }

        let body = match self.fetch(&task, &req).await {
            Ok(body) if body.len() >= self.min_body_len => body,
            Ok(body) => {
                Counters::bump(&counters.fetch_failures);
                tracing::warn!(
                    task = %task.name,
                    url = %req.url,
                    "Body of {} bytes is shorter than {}",
                    body.len(),
                    self.min_body_len
                );
                self.frontier.register_failure(&req);
                return;
            }
            Err(e) => {
                Counters::bump(&counters.fetch_failures);
                tracing::error!(task = %task.name, url = %req.url, "Fetch failed: {}", e);
                self.frontier.register_failure(&req);
                return;
            }
        };
        Counters::bump(&counters.fetched);

        let Some(ParseResult { mut requests, items }) = self.parse(&task, &req, &body) else {
            Counters::bump(&counters.parse_failures);
            return;
        };

        if !requests.is_empty() {
            for child in &mut requests {
                child.adopt(&req);
            }
            Counters::add(&counters.discovered, requests.len());
            tracing::debug!(
                task = %task.name,
                url = %req.url,
                "Discovered {} requests",
                requests.len()
            );
            self.frontier.enqueue(requests);
        }

        if !items.is_empty() {
            let count = items.len();
            if self.results.send(items).await.is_err() {
                Counters::add(&counters.items_dropped, count);
                tracing::warn!(task = %task.name, "Result channel closed, dropped {} items", count);
            }
        }
    }

    async fn fetch(&self, task: &Task, req: &Request) -> Result<Vec<u8>, FetchError> {
        if let Some(limiter) = task.limiter() {
            limiter.wait().await;
        }

        let delay = jitter(task.wait_time);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fetcher = task.fetcher().unwrap_or(&self.fetcher);
        fetcher.get(req).await
    }

    fn parse(&self, task: &Task, req: &Request, body: &[u8]) -> Option<ParseResult> {
        let Some(rule) = task.rules().rule(&req.rule_name) else {
            tracing::error!(
                task = %task.name,
                rule = %req.rule_name,
                url = %req.url,
                "No such rule"
            );
            return None;
        };

        match (rule.parse)(&Context::new(body, req)) {
            Ok(result) => {
                for item in &result.items {
                    let missing = rule.missing_fields(item);
                    if !missing.is_empty() {
                        tracing::warn!(
                            task = %task.name,
                            rule = %req.rule_name,
                            url = %req.url,
                            "Item is missing declared fields: {}",
                            missing.join(", ")
                        );
                    }
                }
                Some(result)
            }
            Err(e) => {
                tracing::error!(
                    task = %task.name,
                    rule = %req.rule_name,
                    url = %req.url,
                    "Parse failed: {:#}",
                    e
                );
                None
            }
        }
    }
}

/// Uniform random delay in `[0, bound]` at millisecond resolution
fn jitter(bound: Duration) -> Duration {
    let max_ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_zero_bound() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_jitter_within_bound() {
        let bound = Duration::from_millis(50);
        for _ in 0..100 {
            assert!(jitter(bound) <= bound);
        }
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}

//! Shared crawl frontier
//!
//! Wraps the scheduler with the per-run visited and failure sets, the run
//! counters and the outstanding-work count used to detect a drained crawl.
//! It also tracks live workers: once the last one exits the scheduler is
//! closed and anyone waiting for the crawl to drain is released.

use crate::crawler::scheduler::Scheduler;
use crate::spider::Request;
use crate::state::{Counters, FailureSet, VisitedSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

pub(crate) struct Frontier {
    scheduler: Scheduler,
    visited: VisitedSet,
    failures: FailureSet,
    counters: Counters,
    /// Requests pushed but not yet finished by a worker
    outstanding: AtomicUsize,
    seeded: AtomicBool,
    /// Workers that have not exited yet
    live_workers: AtomicUsize,
    workers_gone: AtomicBool,
    idle: Notify,
}

impl Frontier {
    pub(crate) fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            visited: VisitedSet::new(),
            failures: FailureSet::new(),
            counters: Counters::new(),
            outstanding: AtomicUsize::new(0),
            seeded: AtomicBool::new(false),
            live_workers: AtomicUsize::new(0),
            workers_gone: AtomicBool::new(false),
            idle: Notify::new(),
        }
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub(crate) fn failures(&self) -> &FailureSet {
        &self.failures
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Pushes requests into the scheduler, counting them as outstanding
    ///
    /// Returns false if the scheduler is closed and the requests were dropped.
    pub(crate) fn enqueue(&self, requests: Vec<Request>) -> bool {
        let n = requests.len();
        if n == 0 {
            return true;
        }

        // Count first so a worker finishing concurrently never sees zero early
        self.outstanding.fetch_add(n, Ordering::SeqCst);
        match self.scheduler.push(requests) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Dropping {} requests: {}", n, e);
                self.release(n);
                false
            }
        }
    }

    /// Claims a request for fetching; false if it was already visited
    pub(crate) fn mark_if_unvisited(&self, req: &Request) -> bool {
        self.visited.mark_if_unvisited(req)
    }

    /// Handles a failed fetch
    ///
    /// The first failure of an identity unmarks it and requeues the request
    /// once. A later failure leaves it visited so it is never fetched again.
    pub(crate) fn register_failure(&self, req: &Request) {
        if self.failures.record(req) {
            self.visited.unmark(req);
            Counters::bump(&self.counters.retries);
            tracing::info!(task = %req.task_name(), url = %req.url, "Requeueing failed request");
            self.enqueue(vec![req.clone()]);
        } else {
            Counters::bump(&self.counters.abandoned);
            tracing::warn!(
                task = %req.task_name(),
                url = %req.url,
                "Request failed again, giving up"
            );
        }
    }

    /// Marks one pulled request as fully processed
    pub(crate) fn finish(&self) {
        self.release(1);
    }

    /// Signals that every root generator has run
    pub(crate) fn seeding_done(&self) {
        self.seeded.store(true, Ordering::SeqCst);
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }

    /// True once seeding finished and no request is queued or in flight
    pub(crate) fn is_idle(&self) -> bool {
        self.seeded.load(Ordering::SeqCst) && self.outstanding.load(Ordering::SeqCst) == 0
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Registers `n` workers about to be spawned
    pub(crate) fn workers_started(&self, n: usize) {
        self.live_workers.fetch_add(n, Ordering::SeqCst);
    }

    /// Records one worker exit
    ///
    /// The last exit closes the scheduler and wakes every idle waiter, since
    /// nothing is left to drain the queue.
    pub(crate) fn worker_exited(&self) {
        let before = self.live_workers.fetch_sub(1, Ordering::SeqCst);
        if before != 1 {
            return;
        }

        if !self.scheduler.is_closed() {
            tracing::warn!(
                "All workers exited with {} requests outstanding, stopping the crawl",
                self.outstanding()
            );
            self.scheduler.close();
        }
        self.workers_gone.store(true, Ordering::SeqCst);
        self.idle.notify_waiters();
    }

    /// True once every started worker has exited
    pub(crate) fn workers_gone(&self) -> bool {
        self.workers_gone.load(Ordering::SeqCst)
    }

    /// Waits until the crawl has drained or every worker has exited
    pub(crate) async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent notify is not missed
            notified.as_mut().enable();

            if self.is_idle() || self.workers_gone() {
                return;
            }
            notified.await;
        }
    }

    fn release(&self, n: usize) {
        let before = self.outstanding.fetch_sub(n, Ordering::SeqCst);
        if before == n && self.seeded.load(Ordering::SeqCst) {
            self.idle.notify_waiters();
        }
    }
}

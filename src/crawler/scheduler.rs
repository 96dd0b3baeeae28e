//! Scheduler for handing queued requests to workers
//!
//! This module handles:
//! - An unbounded FIFO queue of pending requests
//! - Matching waiting workers with queued requests, one request per worker
//! - Closing, which releases every waiting worker
//!
//! The queue is owned by a single arbitration task ([`SchedulerLoop`]). Every
//! other task talks to it through channels via the cloneable [`Scheduler`]
//! handle, so the queue itself needs no lock.

use crate::spider::Request;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

/// Errors returned by the scheduler handle
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is closed")]
    Closed,
}

type Reply = oneshot::Sender<Request>;

/// Handle used by producers and workers
#[derive(Clone)]
pub struct Scheduler {
    push_tx: mpsc::UnboundedSender<Request>,
    pull_tx: mpsc::UnboundedSender<Reply>,
    close_tx: Arc<watch::Sender<bool>>,
}

impl Scheduler {
    /// Creates a scheduler handle and the loop that serves it
    ///
    /// Nothing is delivered until [`SchedulerLoop::run`] is polled, usually on
    /// its own task.
    pub fn new() -> (Self, SchedulerLoop) {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (pull_tx, pull_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);

        let handle = Self {
            push_tx,
            pull_tx,
            close_tx: Arc::new(close_tx),
        };
        let arbiter = SchedulerLoop {
            push_rx,
            pull_rx,
            close_rx,
            queue: VecDeque::new(),
            waiting: VecDeque::new(),
        };

        (handle, arbiter)
    }

    /// Enqueues requests in iteration order
    ///
    /// Never blocks. Once the scheduler is closed the requests are rejected
    /// and not delivered.
    pub fn push<I>(&self, requests: I) -> Result<(), SchedulerError>
    where
        I: IntoIterator<Item = Request>,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        for request in requests {
            self.push_tx
                .send(request)
                .map_err(|_| SchedulerError::Closed)?;
        }
        Ok(())
    }

    /// Waits for the next request
    ///
    /// Returns `None` once the scheduler is closed. Dropping a pending pull
    /// right as a request is handed over can lose that request, so workers
    /// should not race `pull` against other futures.
    pub async fn pull(&self) -> Option<Request> {
        if self.is_closed() {
            return None;
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pull_tx.send(reply_tx).ok()?;
        reply_rx.await.ok()
    }

    /// Stops serving pushes and pulls; every waiting `pull` returns `None`
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.close_tx.borrow()
    }
}

/// Arbitration loop that exclusively owns the request queue
pub struct SchedulerLoop {
    push_rx: mpsc::UnboundedReceiver<Request>,
    pull_rx: mpsc::UnboundedReceiver<Reply>,
    close_rx: watch::Receiver<bool>,
    queue: VecDeque<Request>,
    waiting: VecDeque<Reply>,
}

impl SchedulerLoop {
    /// Serves pushes and pulls until the scheduler is closed
    pub async fn run(mut self) {
        tracing::debug!("Scheduler loop started");

        loop {
            self.dispatch();

            tokio::select! {
                biased;

                changed = self.close_rx.changed() => {
                    if changed.is_err() || *self.close_rx.borrow() {
                        break;
                    }
                }
                Some(reply) = self.pull_rx.recv() => {
                    self.waiting.push_back(reply);
                }
                Some(request) = self.push_rx.recv() => {
                    tracing::trace!("Queued request: {}", request.url);
                    self.queue.push_back(request);
                }
                else => break,
            }
        }

        // Dropping the reply slots answers every waiting pull with `None`
        let waiting = self.waiting.len();
        self.waiting.clear();
        self.push_rx.close();
        self.pull_rx.close();

        if self.queue.is_empty() {
            tracing::debug!("Scheduler closed, released {} waiting workers", waiting);
        } else {
            tracing::info!(
                "Scheduler closed with {} queued requests discarded, released {} waiting workers",
                self.queue.len(),
                waiting
            );
        }
    }

    /// Hands queued requests to waiting workers, head first
    fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(reply) = self.waiting.pop_front() else {
                break;
            };
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            if let Err(request) = reply.send(request) {
                // The worker stopped waiting; keep the request at the head
                self.queue.push_front(request);
            }
        }
    }
}

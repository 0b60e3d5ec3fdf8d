//! Bounded FIFO queue of admitted jobs.
//!
//! Built on a bounded crossbeam channel: the channel bound enforces the
//! capacity invariant, the channel order gives FIFO claim order, and the
//! cloneable receiver lets each worker block on the same queue.

use crate::queue::job::Job;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::time::Duration;

/// Bounded, ordered, thread-safe queue of admitted jobs.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    capacity: usize,
}

impl JobQueue {
    /// Creates a queue that holds at most `capacity` not-yet-claimed jobs.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Number of queued jobs not yet claimed by a worker.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Configured capacity limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Enqueues a job, handing it back if the queue is at capacity.
    pub fn try_enqueue(&self, job: Job) -> Result<(), Job> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => Err(job),
        }
    }

    /// Consumer endpoint for workers. Each call to `recv` on any clone
    /// claims the oldest queued job.
    pub fn consumer(&self) -> JobConsumer {
        JobConsumer {
            rx: self.rx.clone(),
        }
    }
}

/// Worker-side endpoint of the job queue.
#[derive(Debug, Clone)]
pub struct JobConsumer {
    rx: Receiver<Job>,
}

impl JobConsumer {
    /// Blocks up to `timeout` waiting for the next job.
    ///
    /// Returns `None` on timeout or when the queue has shut down; callers
    /// re-check their shutdown flag and try again.
    pub fn claim(&self, timeout: Duration) -> Option<Job> {
        self.rx.recv_timeout(timeout).ok()
    }
}

//! Composition root: wires the gate, queue, worker pool, and dispatcher
//! into one running service.
//!
//! `submit` is the single entry point for new audio: validation first (an
//! invalid item never touches queue or quota), then atomic admission.
//! Each rejection carries exactly one user-facing explanation.

use crate::audio::{self, AudioItem, ValidationLimits};
use crate::defaults;
use crate::dispatch::{DispatchStats, ResultDispatcher, WorkerOutput};
use crate::error::{Result, ScribeqError};
use crate::pool::WorkerPool;
use crate::queue::admission::{Admission, AdmissionGate};
use crate::queue::job::{JobId, UserId};
use crate::queue::job_queue::JobQueue;
use crate::queue::rate_limiter::RateLimiter;
use crate::report::{ErrorReporter, LogReporter};
use crate::stt::engine::EngineFactory;
use crate::transport::Transport;
use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Runtime knobs for a service instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Total jobs the queue holds before rejecting new work.
    pub queue_capacity: usize,
    /// Jobs one user may have queued or running at once.
    pub max_jobs_per_user: u32,
    /// Number of worker threads (one engine each).
    pub worker_count: usize,
    /// Character limit per outbound message.
    pub chunk_chars: usize,
    /// Payload validation limits.
    pub limits: ValidationLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            max_jobs_per_user: defaults::MAX_JOBS_PER_USER,
            worker_count: defaults::WORKER_COUNT,
            chunk_chars: defaults::CHUNK_CHARS,
            limits: ValidationLimits::default(),
        }
    }
}

/// Why a submission was turned away.
#[derive(Debug)]
pub enum RejectReason {
    /// The global queue is at capacity.
    Capacity,
    /// The user is at their per-user limit.
    UserQuota { limit: u32, in_queue: u32 },
    /// The audio failed validation before admission.
    Invalid(ScribeqError),
}

/// Result of `Service::submit`.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Job accepted; `position` is its 1-based place in the queue.
    Admitted { job_id: JobId, position: usize },
    Rejected(RejectReason),
}

impl SubmitOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, SubmitOutcome::Admitted { .. })
    }

    /// The one message the user sees for this outcome.
    pub fn user_message(&self) -> String {
        match self {
            SubmitOutcome::Admitted { position, .. } => {
                format!("Added to the queue. Position: {position}.")
            }
            SubmitOutcome::Rejected(reason) => reason.user_message(),
        }
    }
}

impl RejectReason {
    pub fn user_message(&self) -> String {
        match self {
            RejectReason::Capacity => {
                "The processing queue is full right now. Please try again in a few minutes."
                    .to_string()
            }
            RejectReason::UserQuota { limit, in_queue } => format!(
                "You have reached the maximum limit of {limit} audio files in the queue. \
                 Currently in queue: {in_queue}. Please wait for them to finish processing."
            ),
            RejectReason::Invalid(error) => match error {
                ScribeqError::PayloadTooLarge { limit, .. } => format!(
                    "Sorry, this file is too large. The maximum supported size is {} MB.",
                    limit / (1024 * 1024)
                ),
                ScribeqError::EmptyPayload => {
                    "Sorry, this audio file is empty.".to_string()
                }
                ScribeqError::UnsupportedFormat { format } => format!(
                    "Sorry, '{format}' files are not supported. Supported formats: \
                     ogg, opus, mp3, m4a, wav, flac, aac, webm."
                ),
                ScribeqError::UnreadableAudio { .. } => {
                    "Sorry, this audio file cannot be processed. It may be too short, \
                     corrupted, or in an unsupported format."
                        .to_string()
                }
                other => format!("Sorry, your file was rejected: {other}"),
            },
        }
    }
}

/// A running transcription service.
pub struct Service {
    gate: AdmissionGate,
    limiter: Arc<RateLimiter>,
    dispatcher: Arc<ResultDispatcher>,
    pool: Option<WorkerPool>,
    dispatch_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    limits: ValidationLimits,
}

impl Service {
    /// Starts the service: queue, admission gate, `worker_count` workers
    /// (one engine each, loaded up front), and the dispatcher thread.
    pub fn start(
        config: ServiceConfig,
        factory: Arc<dyn EngineFactory>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Self::start_with_reporter(config, factory, transport, Arc::new(LogReporter))
    }

    pub fn start_with_reporter(
        config: ServiceConfig,
        factory: Arc<dyn EngineFactory>,
        transport: Arc<dyn Transport>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(ScribeqError::ConfigInvalidValue {
                key: "queue.capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        // A chunk must fit the reply header plus at least one character of
        // transcription, or chunking can never make progress.
        if config.chunk_chars <= defaults::RESULT_HEADER.chars().count() {
            return Err(ScribeqError::ConfigInvalidValue {
                key: "transport.chunk_chars".to_string(),
                message: format!(
                    "must exceed the {}-character reply header",
                    defaults::RESULT_HEADER.chars().count()
                ),
            });
        }

        let running = Arc::new(AtomicBool::new(true));
        let queue = JobQueue::new(config.queue_capacity);
        let limiter = Arc::new(RateLimiter::new());
        let gate = AdmissionGate::new(queue.clone(), limiter.clone(), config.max_jobs_per_user);

        let (outputs_tx, outputs_rx) = unbounded::<WorkerOutput>();
        let dispatcher = Arc::new(ResultDispatcher::new(
            transport,
            reporter.clone(),
            config.chunk_chars,
        ));
        let dispatch_handle = dispatcher.clone().spawn(outputs_rx, running.clone());

        let pool = match WorkerPool::start(
            config.worker_count,
            factory,
            queue.consumer(),
            outputs_tx,
            reporter,
            running.clone(),
        ) {
            Ok(pool) => pool,
            Err(e) => {
                // Tear the dispatcher back down before reporting the error.
                running.store(false, Ordering::SeqCst);
                if dispatch_handle.join().is_err() {
                    eprintln!("scribeq: dispatcher thread panicked");
                }
                return Err(e);
            }
        };

        Ok(Self {
            gate,
            limiter,
            dispatcher,
            pool: Some(pool),
            dispatch_handle: Some(dispatch_handle),
            running,
            limits: config.limits,
        })
    }

    /// Submits one audio item for `user`.
    ///
    /// Validation runs before admission, so a rejected item never counts
    /// against the user's quota or a queue slot.
    pub fn submit(&self, user: UserId, item: AudioItem) -> SubmitOutcome {
        let format = match audio::validate(&item, &self.limits) {
            Ok(format) => format,
            Err(error) => return SubmitOutcome::Rejected(RejectReason::Invalid(error)),
        };

        match self.gate.try_admit(user, item, format) {
            Admission::Admitted { job_id, position } => {
                SubmitOutcome::Admitted { job_id, position }
            }
            Admission::RejectedCapacity => SubmitOutcome::Rejected(RejectReason::Capacity),
            Admission::RejectedUserQuota { in_queue } => {
                SubmitOutcome::Rejected(RejectReason::UserQuota {
                    limit: self.gate.max_per_user(),
                    in_queue,
                })
            }
        }
    }

    /// Jobs queued and not yet claimed by a worker.
    pub fn queue_len(&self) -> usize {
        self.gate.queue_len()
    }

    /// Jobs `user` currently has queued or running.
    pub fn user_in_flight(&self, user: UserId) -> u32 {
        self.limiter.current_count(user)
    }

    pub fn stats(&self) -> &DispatchStats {
        self.dispatcher.stats()
    }

    /// Waits until the queue is empty and no user holds a quota slot, or
    /// `timeout` elapses. Returns true when drained.
    ///
    /// A quota slot is released when a worker hands the finished job to
    /// the dispatcher, so the last deliveries may still be in flight when
    /// this returns. `shutdown` joins the dispatcher and completes them.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.queue_len() == 0 && self.limiter.active_users() == 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(defaults::POLL_INTERVAL_MS));
        }
        self.queue_len() == 0 && self.limiter.active_users() == 0
    }

    /// Stops the service: signals shutdown, then joins workers and the
    /// dispatcher with a deadline. In-queue jobs that no worker claimed
    /// before the signal are dropped; their quota guards release on drop.
    ///
    /// Returns the final `(delivered, failed)` counters, read after the
    /// dispatcher has finished its last deliveries.
    pub fn shutdown(mut self) -> (u64, u64) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
        if let Some(handle) = self.dispatch_handle.take()
            && handle.join().is_err()
        {
            eprintln!("scribeq: dispatcher thread panicked");
        }
        let stats = self.dispatcher.stats();
        (stats.delivered(), stats.failed())
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        // Covers the no-explicit-shutdown path; threads exit via polling.
        self.running.store(false, Ordering::SeqCst);
    }
}

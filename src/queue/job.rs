//! Job data model and status state machine.

use crate::audio::{AudioFormat, AudioItem};
use crate::queue::rate_limiter::QuotaGuard;
use std::fmt;
use std::time::Instant;

/// Unique identifier for an admitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Identifier of the user (chat) that owns a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

/// Job lifecycle: `Queued → Running → {Completed, Failed}`.
///
/// Validation short-circuits may go `Queued → Failed` directly. Terminal
/// states never transition further; there are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// One transcription request, owned by the queue until a worker claims it
/// and exclusively by that worker thereafter.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub user: UserId,
    pub audio: AudioItem,
    pub format: AudioFormat,
    pub enqueued_at: Instant,
    status: JobStatus,
    quota: QuotaGuard,
}

impl Job {
    /// Creates a newly admitted job in the `Queued` state.
    pub(crate) fn new(
        id: JobId,
        user: UserId,
        audio: AudioItem,
        format: AudioFormat,
        quota: QuotaGuard,
    ) -> Self {
        Self {
            id,
            user,
            audio,
            format,
            enqueued_at: Instant::now(),
            status: JobStatus::Queued,
            quota,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Marks the job as claimed by a worker.
    pub fn start(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Queued, "start() from {:?}", self.status);
        self.status = JobStatus::Running;
    }

    /// Marks the job as successfully transcribed.
    pub fn complete(&mut self) {
        debug_assert_eq!(
            self.status,
            JobStatus::Running,
            "complete() from {:?}",
            self.status
        );
        self.status = JobStatus::Completed;
    }

    /// Marks the job as failed. Reachable from `Queued` (validation
    /// short-circuit) and `Running` (engine failure).
    pub fn fail(&mut self) {
        debug_assert!(
            matches!(self.status, JobStatus::Queued | JobStatus::Running),
            "fail() from {:?}",
            self.status
        );
        self.status = JobStatus::Failed;
    }

    /// Releases this job's slot in the owner's per-user quota.
    ///
    /// Idempotent; the slot is released at most once even if the job is
    /// also dropped afterwards.
    pub fn release_quota(&self) {
        self.quota.release();
    }
}

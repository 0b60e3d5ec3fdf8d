//! Admission, queueing, and per-user fairness.
//!
//! A bounded FIFO queue of admitted jobs, a per-user in-flight counter, and
//! the admission gate that combines both checks into one atomic operation.

pub mod admission;
pub mod job;
pub mod job_queue;
pub mod rate_limiter;

pub use admission::{Admission, AdmissionGate};
pub use job::{Job, JobId, JobStatus, UserId};
pub use job_queue::{JobConsumer, JobQueue};
pub use rate_limiter::{QuotaGuard, RateLimiter};

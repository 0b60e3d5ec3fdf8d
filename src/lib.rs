//! scribeq - Concurrent audio transcription service
//!
//! Bounded FIFO queueing with per-user fairness, a fixed pool of workers
//! each owning one speech-to-text engine, and chunked result delivery.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod queue;
pub mod report;
pub mod service;
pub mod stt;
pub mod transport;

// Core traits (validate → admit → transcribe → deliver)
pub use stt::engine::{EngineFactory, SpeechEngine};
pub use transport::{StdoutTransport, Transport};

// Service surface
pub use service::{RejectReason, Service, ServiceConfig, SubmitOutcome};

// Queue primitives
pub use queue::{Admission, AdmissionGate, JobId, JobQueue, RateLimiter, UserId};

// Error handling
pub use error::{Result, ScribeqError};

// Config
pub use config::Config;

// Reporting
pub use report::{ErrorReporter, WorkerError};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

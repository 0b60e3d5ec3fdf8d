//! Error reporting for worker and dispatcher threads.

use std::fmt;

/// Errors surfaced from a worker's processing loop.
#[derive(Debug, Clone)]
pub enum WorkerError {
    /// Job-scoped error; the worker keeps running.
    Recoverable(String),
    /// The worker's engine is unusable; the worker will be replaced.
    Fatal(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            WorkerError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for WorkerError {}

/// Trait for reporting errors from pool and dispatcher threads.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from the named component.
    fn report(&self, component: &str, error: &WorkerError);
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, error: &WorkerError) {
        eprintln!("scribeq: [{}] {}", component, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Reporter that collects reports for assertions.
    #[derive(Debug, Clone, Default)]
    pub struct CollectingReporter {
        pub reports: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, component: &str, error: &WorkerError) {
            if let Ok(mut guard) = self.reports.lock() {
                guard.push((component.to_string(), error.to_string()));
            }
        }
    }

    #[test]
    fn test_worker_error_display() {
        let recoverable = WorkerError::Recoverable("temporary failure".to_string());
        assert_eq!(
            recoverable.to_string(),
            "Recoverable error: temporary failure"
        );

        let fatal = WorkerError::Fatal("engine corrupted".to_string());
        assert_eq!(fatal.to_string(), "Fatal error: engine corrupted");
    }

    #[test]
    fn test_log_reporter() {
        let reporter = LogReporter;
        let error = WorkerError::Recoverable("test error".to_string());
        // Just ensure it doesn't panic
        reporter.report("worker-0", &error);
    }

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        reporter.report("worker-1", &WorkerError::Fatal("gone".to_string()));
        let reports = reporter.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "worker-1");
    }
}

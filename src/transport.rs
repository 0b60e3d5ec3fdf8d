//! Outbound transport seam.
//!
//! The inbound message transport is an external collaborator; the service
//! only needs its "send text to user" operation. The mock records sends and
//! can fail from a scripted index onward, for delivery-failure tests.

use crate::error::{Result, ScribeqError};
use crate::queue::job::UserId;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for delivering text replies to users.
pub trait Transport: Send + Sync {
    /// Send one message to the user. Failure is job-scoped; the caller
    /// decides how to react.
    fn send_text(&self, user: UserId, text: &str) -> Result<()>;
}

/// Transport that prints replies to stdout, used by the CLI binary.
#[derive(Debug, Default)]
pub struct StdoutTransport;

impl Transport for StdoutTransport {
    fn send_text(&self, user: UserId, text: &str) -> Result<()> {
        println!("[{user}] {text}");
        Ok(())
    }
}

/// Mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(UserId, String)>>,
    send_count: AtomicUsize,
    fail_from: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock so the `fail_from`-th send (0-based) and every
    /// later one fail.
    pub fn with_failure_from(mut self, fail_from: usize) -> Self {
        self.fail_from = Some(fail_from);
        self
    }

    /// Configure the mock so every send fails.
    pub fn with_failure(self) -> Self {
        self.with_failure_from(0)
    }

    /// All successfully sent messages, in order.
    pub fn sent(&self) -> Vec<(UserId, String)> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages successfully sent to one user, in order.
    pub fn sent_to(&self, user: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, text)| text)
            .collect()
    }

    /// Total send attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn send_text(&self, user: UserId, text: &str) -> Result<()> {
        let attempt = self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Some(fail_from) = self.fail_from
            && attempt >= fail_from
        {
            return Err(ScribeqError::Delivery {
                chunks_sent: 0,
                message: "mock transport failure".to_string(),
            });
        }

        match self.sent.lock() {
            Ok(mut guard) => guard.push((user, text.to_string())),
            Err(poisoned) => poisoned.into_inner().push((user, text.to_string())),
        }
        Ok(())
    }
}

//! Result delivery: chunking and the dispatcher loop.
//!
//! The dispatcher is the single consumer of the worker-output channel and
//! the only writer to the transport. Long transcriptions are split into
//! ordered chunks under the transport's per-message limit; a failed chunk
//! stops further sends for that job and is recorded, never escalated.

use crate::defaults;
use crate::error::ScribeqError;
use crate::queue::job::{JobId, UserId};
use crate::report::{ErrorReporter, WorkerError};
use crate::transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A worker's finished job, handed to the dispatcher.
#[derive(Debug)]
pub struct WorkerOutput {
    pub job_id: JobId,
    pub user: UserId,
    /// Transcribed text on success, the engine/validation error otherwise.
    pub outcome: Result<String, ScribeqError>,
}

/// Outcome of delivering one job's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// All chunks sent, in order.
    Delivered { chunks: usize },
    /// A chunk failed; later chunks were never attempted.
    Failed { chunks_sent: usize },
}

/// Split a transcription into transport-sized messages.
///
/// Each returned message is `header` plus a slice of the text, at most
/// `chunk_limit` characters in total. Splits happen on `char` boundaries
/// only, so no multi-unit scalar is ever cut in half. Counting is in
/// Unicode scalar values to match the transport's character limit.
pub fn chunk_text(text: &str, chunk_limit: usize, header: &str) -> Vec<String> {
    let header_chars = header.chars().count();
    debug_assert!(chunk_limit > header_chars, "chunk limit smaller than header");
    let budget = chunk_limit.saturating_sub(header_chars).max(1);

    let mut chunks = Vec::new();
    let mut current = String::from(header);
    let mut count = 0usize;

    for ch in text.chars() {
        if count == budget {
            chunks.push(std::mem::replace(&mut current, String::from(header)));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if count > 0 {
        chunks.push(current);
    }
    chunks
}

/// Per-process delivery counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Delivers worker results to users through the transport.
pub struct ResultDispatcher {
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn ErrorReporter>,
    chunk_chars: usize,
    stats: DispatchStats,
}

impl ResultDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        reporter: Arc<dyn ErrorReporter>,
        chunk_chars: usize,
    ) -> Self {
        Self {
            transport,
            reporter,
            chunk_chars,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Deliver one job's transcription, chunked if needed.
    ///
    /// Stops at the first failed chunk; transcription work is never redone.
    pub fn deliver(&self, user: UserId, job_id: JobId, text: &str) -> Delivery {
        let messages = if text.trim().is_empty() {
            vec!["The audio contained no detectable speech.".to_string()]
        } else {
            chunk_text(text, self.chunk_chars, defaults::RESULT_HEADER)
        };

        let mut chunks_sent = 0;
        for message in &messages {
            if let Err(e) = self.transport.send_text(user, message) {
                self.reporter.report(
                    "dispatcher",
                    &WorkerError::Recoverable(format!(
                        "{job_id}: delivery failed after {chunks_sent} chunk(s): {e}"
                    )),
                );
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                return Delivery::Failed { chunks_sent };
            }
            chunks_sent += 1;
        }

        self.stats.delivered.fetch_add(1, Ordering::SeqCst);
        Delivery::Delivered {
            chunks: chunks_sent,
        }
    }

    /// Send exactly one best-effort explanatory message for a failed job.
    ///
    /// If even the notification fails, that too is only logged.
    pub fn notify_failure(&self, user: UserId, job_id: JobId, error: &ScribeqError) {
        self.stats.failed.fetch_add(1, Ordering::SeqCst);
        let message = failure_message(error);
        if let Err(notify_error) = self.transport.send_text(user, message) {
            self.reporter.report(
                "dispatcher",
                &WorkerError::Recoverable(format!(
                    "{job_id}: could not notify {user} about failure: {notify_error}"
                )),
            );
        }
    }

    /// Handle one worker output end to end.
    ///
    /// A failed delivery still owes the user one explanatory message; the
    /// notice is best-effort since the transport just failed.
    pub fn handle(&self, output: WorkerOutput) {
        match output.outcome {
            Ok(text) => {
                if let Delivery::Failed { chunks_sent } =
                    self.deliver(output.user, output.job_id, &text)
                {
                    self.notify_delivery_failure(output.user, output.job_id, chunks_sent);
                }
            }
            Err(error) => self.notify_failure(output.user, output.job_id, &error),
        }
    }

    /// One best-effort notice after a partial or failed delivery.
    ///
    /// `deliver` already counted the failure; this sends the explanation
    /// only, and a failure of the notice itself is just logged.
    fn notify_delivery_failure(&self, user: UserId, job_id: JobId, chunks_sent: usize) {
        let message =
            "Sorry, an error occurred while sending your transcription. It may have arrived incomplete.";
        if let Err(e) = self.transport.send_text(user, message) {
            self.reporter.report(
                "dispatcher",
                &WorkerError::Recoverable(format!(
                    "{job_id}: could not notify {user} after {chunks_sent} delivered chunk(s): {e}"
                )),
            );
        }
    }

    /// Spawn the dispatcher loop on its own thread.
    ///
    /// Runs until the shutdown flag drops and the channel is drained, or
    /// every worker sender is gone.
    pub fn spawn(
        self: Arc<Self>,
        outputs: Receiver<WorkerOutput>,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let poll = Duration::from_millis(defaults::POLL_INTERVAL_MS);
            loop {
                match outputs.recv_timeout(poll) {
                    Ok(output) => self.handle(output),
                    Err(RecvTimeoutError::Timeout) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }
}

/// Map an error to the single user-facing explanation for it.
fn failure_message(error: &ScribeqError) -> &'static str {
    match error {
        ScribeqError::UnreadableAudio { .. } => {
            "Sorry, this audio file cannot be processed. It may be too short, corrupted, or in an unsupported format."
        }
        ScribeqError::Transcription { .. } => {
            "Sorry, failed to transcribe your audio. The file may be corrupted or in an unsupported format."
        }
        ScribeqError::EngineUnavailable { .. } | ScribeqError::ModelNotFound { .. } => {
            "Sorry, the transcription service is temporarily unavailable. Please try again later."
        }
        _ => "Sorry, an error occurred while processing your file.",
    }
}

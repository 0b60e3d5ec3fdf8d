//! Fixed worker pool with per-worker engine ownership.
//!
//! Each worker thread owns exactly one engine instance for its lifetime and
//! processes one job at a time: claim from the queue, run the engine, hand
//! the outcome to the dispatcher, release the user's quota. Engine errors
//! are contained to the job; an engine that reports not-ready afterwards
//! ends that worker, and a supervisor thread replaces it with a freshly
//! loaded engine without touching the other workers.

use crate::defaults;
use crate::dispatch::WorkerOutput;
use crate::error::{Result, ScribeqError};
use crate::queue::job_queue::JobConsumer;
use crate::report::{ErrorReporter, WorkerError};
use crate::stt::engine::{EngineFactory, SpeechEngine};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pool of N long-lived transcription workers.
pub struct WorkerPool {
    supervisor: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `count` workers, loading one engine per worker up front.
    ///
    /// Fails if any initial engine load fails: a pool that cannot reach its
    /// configured size should not come up half-staffed at startup.
    pub fn start(
        count: usize,
        factory: Arc<dyn EngineFactory>,
        jobs: JobConsumer,
        outputs: Sender<WorkerOutput>,
        reporter: Arc<dyn ErrorReporter>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        if count == 0 {
            return Err(ScribeqError::ConfigInvalidValue {
                key: "worker.count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let mut slots: Vec<Option<JoinHandle<()>>> = Vec::with_capacity(count);
        for index in 0..count {
            let engine = match factory.load() {
                Ok(engine) => engine,
                Err(e) => {
                    // Workers spawned for earlier slots see the flag drop
                    // and exit on their next poll.
                    running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
            slots.push(Some(spawn_worker(
                index,
                engine,
                jobs.clone(),
                outputs.clone(),
                reporter.clone(),
                running.clone(),
            )));
        }

        let supervisor = {
            let running = running.clone();
            thread::spawn(move || {
                supervise(slots, factory, jobs, outputs, reporter, running);
            })
        };

        Ok(Self {
            supervisor: Some(supervisor),
            running,
        })
    }

    /// Returns true until shutdown has been signalled.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signals shutdown and waits for the supervisor (and thus all
    /// workers) to finish.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.supervisor.take()
            && handle.join().is_err()
        {
            eprintln!("scribeq: worker pool supervisor panicked");
        }
    }
}

/// Supervisor loop: replaces finished workers with fresh engines while the
/// pool is running, then joins all workers with a deadline on shutdown.
fn supervise(
    mut slots: Vec<Option<JoinHandle<()>>>,
    factory: Arc<dyn EngineFactory>,
    jobs: JobConsumer,
    outputs: Sender<WorkerOutput>,
    reporter: Arc<dyn ErrorReporter>,
    running: Arc<AtomicBool>,
) {
    let poll = Duration::from_millis(defaults::POLL_INTERVAL_MS);

    while running.load(Ordering::SeqCst) {
        for index in 0..slots.len() {
            if slots[index].as_ref().is_some_and(|h| h.is_finished())
                && let Some(handle) = slots[index].take()
            {
                join_and_log(index, handle);
            }

            if slots[index].is_none() && running.load(Ordering::SeqCst) {
                match factory.load() {
                    Ok(engine) => {
                        reporter.report(
                            &format!("worker-{index}"),
                            &WorkerError::Recoverable("restarted with a fresh engine".to_string()),
                        );
                        slots[index] = Some(spawn_worker(
                            index,
                            engine,
                            jobs.clone(),
                            outputs.clone(),
                            reporter.clone(),
                            running.clone(),
                        ));
                    }
                    Err(e) => {
                        // Slot stays empty; retried on the next sweep.
                        reporter.report(
                            &format!("worker-{index}"),
                            &WorkerError::Fatal(format!("engine reload failed: {e}")),
                        );
                    }
                }
            }
        }
        thread::sleep(poll);
    }

    // Shutdown: join workers, detach any that outlive the deadline.
    let deadline = Instant::now() + Duration::from_secs(defaults::SHUTDOWN_DEADLINE_SECS);
    loop {
        let mut remaining = 0;
        for index in 0..slots.len() {
            if slots[index].as_ref().is_some_and(|h| h.is_finished()) {
                if let Some(handle) = slots[index].take() {
                    join_and_log(index, handle);
                }
            } else if slots[index].is_some() {
                remaining += 1;
            }
        }

        if remaining == 0 {
            break;
        }
        if Instant::now() >= deadline {
            eprintln!("scribeq: shutdown timeout, {remaining} worker(s) still running, detaching");
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn join_and_log(index: usize, handle: JoinHandle<()>) {
    if let Err(panic_info) = handle.join() {
        let msg = panic_info
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");
        eprintln!("scribeq: worker-{index} panicked: {msg}");
    }
}

fn spawn_worker(
    index: usize,
    engine: Box<dyn SpeechEngine>,
    jobs: JobConsumer,
    outputs: Sender<WorkerOutput>,
    reporter: Arc<dyn ErrorReporter>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("scribeq-worker-{index}"))
        .spawn(move || run_worker(index, engine, jobs, outputs, reporter, running))
        .unwrap_or_else(|e| {
            // Thread spawn only fails on resource exhaustion; nothing
            // sensible to do but die loudly.
            panic!("failed to spawn worker thread: {e}")
        })
}

/// One worker's processing loop.
fn run_worker(
    index: usize,
    engine: Box<dyn SpeechEngine>,
    jobs: JobConsumer,
    outputs: Sender<WorkerOutput>,
    reporter: Arc<dyn ErrorReporter>,
    running: Arc<AtomicBool>,
) {
    let name = format!("worker-{index}");
    let poll = Duration::from_millis(defaults::POLL_INTERVAL_MS);

    while running.load(Ordering::SeqCst) {
        let Some(mut job) = jobs.claim(poll) else {
            continue;
        };

        job.start();
        let outcome = match engine.transcribe(&job.audio.payload, job.format) {
            Ok(text) => {
                job.complete();
                Ok(text)
            }
            Err(e) => {
                job.fail();
                reporter.report(
                    &name,
                    &WorkerError::Recoverable(format!("{}: {e}", job.id)),
                );
                Err(e)
            }
        };

        let failed = outcome.is_err();
        let output = WorkerOutput {
            job_id: job.id,
            user: job.user,
            outcome,
        };
        if outputs.send(output).is_err() {
            reporter.report(
                &name,
                &WorkerError::Recoverable(format!("{}: dispatcher gone, result dropped", job.id)),
            );
        }
        job.release_quota();

        // A failure that leaves the engine unusable ends this worker; the
        // supervisor brings up a replacement with a fresh engine.
        if failed && !engine.is_ready() {
            reporter.report(
                &name,
                &WorkerError::Fatal(format!(
                    "engine '{}' is no longer usable",
                    engine.engine_name()
                )),
            );
            break;
        }
    }
}

//! Default configuration constants for scribeq.
//!
//! This module provides shared constants used across the configuration and
//! service types to ensure consistency and eliminate duplication.

/// Default global job queue capacity.
///
/// Jobs admitted beyond this bound are rejected with a capacity rejection.
/// 100 gives plenty of headroom for bursts while keeping worst-case memory
/// for queued payloads bounded.
pub const QUEUE_CAPACITY: usize = 100;

/// Default maximum number of jobs a single user may have queued or running.
///
/// Keeps one chatty user from monopolizing the queue. 2 allows a follow-up
/// submission while the first is still processing.
pub const MAX_JOBS_PER_USER: u32 = 2;

/// Default number of transcription workers.
///
/// Each worker owns one engine instance, and engines are expensive to load
/// and hold substantial memory, so the pool is small and fixed.
pub const WORKER_COUNT: usize = 2;

/// Default maximum accepted audio payload size in bytes (20 MiB).
pub const MAX_PAYLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Default outbound message chunk size in characters.
///
/// Matches the transport's hard per-message limit. Transcriptions longer
/// than this are split into ordered chunks.
pub const CHUNK_CHARS: usize = 4096;

/// Header prepended to every outbound transcription chunk.
pub const RESULT_HEADER: &str = "Transcription:\n\n";

/// Default speech model name.
///
/// "base" (multilingual) supports auto-detection of any language.
/// Use "base.en" explicitly for English-only optimized transcription.
pub const DEFAULT_MODEL: &str = "base";

/// Default language code for transcription.
///
/// "auto" lets the engine detect the spoken language automatically.
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// How long a blocked worker or dispatcher waits on its channel before
/// re-checking the shutdown flag.
pub const POLL_INTERVAL_MS: u64 = 100;

/// How long shutdown waits for in-flight work before detaching threads.
pub const SHUTDOWN_DEADLINE_SECS: u64 = 5;

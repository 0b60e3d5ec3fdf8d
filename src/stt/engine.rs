//! Speech engine seam.
//!
//! Each worker exclusively owns one engine instance for its whole lifetime,
//! so the trait requires `Send` but not `Sync`; engines never need to be
//! safe for concurrent use. Engines are expensive to load, which is why
//! construction goes through [`EngineFactory`] and instances are reused for
//! the life of a worker.

use crate::audio::AudioFormat;
use crate::error::{Result, ScribeqError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for speech-to-text engines.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait SpeechEngine: Send {
    /// Transcribe an audio payload to text.
    ///
    /// Synchronous and potentially slow; the calling worker is dedicated to
    /// this job for the duration.
    fn transcribe(&self, payload: &[u8], format: AudioFormat) -> Result<String>;

    /// Name of the loaded model, for logging.
    fn engine_name(&self) -> &str;

    /// Whether the engine is still usable. A worker whose engine reports
    /// not-ready after a failure is replaced with a freshly loaded one.
    fn is_ready(&self) -> bool;
}

/// Builds engine instances, one per worker slot.
pub trait EngineFactory: Send + Sync {
    /// Load a fresh engine instance. Expensive; called once per worker at
    /// startup and again when a worker is replaced.
    fn load(&self) -> Result<Box<dyn SpeechEngine>>;
}

/// Mock engine for testing.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    name: String,
    response: String,
    fail_always: bool,
    // Become not-ready after this many failed calls (fatal simulation).
    fatal_after_failures: Option<usize>,
    failures: Arc<AtomicUsize>,
    delay: Option<Duration>,
    call_log: Option<Arc<Mutex<Vec<Vec<u8>>>>>,
}

impl MockEngine {
    /// Create a new mock engine with default settings.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: "mock transcription".to_string(),
            ..Default::default()
        }
    }

    /// Configure the mock to return a specific transcription.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail every transcription.
    pub fn with_failure(mut self) -> Self {
        self.fail_always = true;
        self
    }

    /// Configure the mock to report not-ready once it has failed `n` times.
    pub fn with_fatal_after(mut self, n: usize) -> Self {
        self.fatal_after_failures = Some(n);
        self
    }

    /// Configure the mock to sleep before answering, to simulate slow
    /// inference.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Record every transcribed payload into the shared log, so tests can
    /// assert claim order across workers.
    pub fn with_call_log(mut self, log: Arc<Mutex<Vec<Vec<u8>>>>) -> Self {
        self.call_log = Some(log);
        self
    }
}

impl SpeechEngine for MockEngine {
    fn transcribe(&self, payload: &[u8], _format: AudioFormat) -> Result<String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(log) = &self.call_log {
            match log.lock() {
                Ok(mut guard) => guard.push(payload.to_vec()),
                Err(poisoned) => poisoned.into_inner().push(payload.to_vec()),
            }
        }
        if self.fail_always {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(ScribeqError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        Ok(self.response.clone())
    }

    fn engine_name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        match self.fatal_after_failures {
            Some(n) => self.failures.load(Ordering::SeqCst) < n,
            None => true,
        }
    }
}

/// Factory that produces clones of a template mock engine.
#[derive(Debug, Clone)]
pub struct MockEngineFactory {
    template: MockEngine,
    loads: Arc<AtomicUsize>,
    fail_loads: bool,
}

impl MockEngineFactory {
    pub fn new(template: MockEngine) -> Self {
        Self {
            template,
            loads: Arc::new(AtomicUsize::new(0)),
            fail_loads: false,
        }
    }

    /// Configure the factory to fail every load.
    pub fn with_load_failure(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    /// Number of engines loaded so far (worker replacements show up here).
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EngineFactory for MockEngineFactory {
    fn load(&self) -> Result<Box<dyn SpeechEngine>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads {
            return Err(ScribeqError::EngineUnavailable {
                message: "mock load failure".to_string(),
            });
        }
        // Each load gets an independent failure counter, like a fresh
        // engine instance would.
        let mut engine = self.template.clone();
        engine.failures = Arc::new(AtomicUsize::new(0));
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_engine_returns_response() {
        let engine = MockEngine::new("test-model").with_response("hello world");
        let result = engine.transcribe(&[0u8; 16], AudioFormat::Ogg);
        assert_eq!(result.unwrap(), "hello world");
    }

    #[test]
    fn test_mock_engine_failure() {
        let engine = MockEngine::new("test-model").with_failure();
        let result = engine.transcribe(&[0u8; 16], AudioFormat::Ogg);
        assert!(matches!(
            result,
            Err(ScribeqError::Transcription { .. })
        ));
        // Plain failure does not make the engine unusable.
        assert!(engine.is_ready());
    }

    #[test]
    fn test_mock_engine_fatal_after_failures() {
        let engine = MockEngine::new("test-model").with_failure().with_fatal_after(2);
        assert!(engine.is_ready());
        let _ = engine.transcribe(&[], AudioFormat::Ogg);
        assert!(engine.is_ready());
        let _ = engine.transcribe(&[], AudioFormat::Ogg);
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_mock_engine_call_log_records_payloads() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = MockEngine::new("test-model").with_call_log(log.clone());
        engine.transcribe(b"one", AudioFormat::Ogg).unwrap();
        engine.transcribe(b"two", AudioFormat::Ogg).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_factory_counts_loads() {
        let factory = MockEngineFactory::new(MockEngine::new("test-model"));
        assert_eq!(factory.loads(), 0);
        let engine = factory.load().unwrap();
        assert_eq!(factory.loads(), 1);
        assert_eq!(engine.engine_name(), "test-model");
    }

    #[test]
    fn test_factory_load_failure() {
        let factory = MockEngineFactory::new(MockEngine::new("x")).with_load_failure();
        assert!(factory.load().is_err());
        assert_eq!(factory.loads(), 1);
    }

    #[test]
    fn test_fresh_loads_get_fresh_failure_counters() {
        let factory =
            MockEngineFactory::new(MockEngine::new("x").with_failure().with_fatal_after(1));
        let first = factory.load().unwrap();
        let _ = first.transcribe(&[], AudioFormat::Ogg);
        assert!(!first.is_ready());

        let second = factory.load().unwrap();
        assert!(second.is_ready(), "replacement engine starts healthy");
    }

    #[test]
    fn test_engine_trait_is_object_safe() {
        let engine: Box<dyn SpeechEngine> = Box::new(MockEngine::new("boxed"));
        assert_eq!(engine.engine_name(), "boxed");
        assert!(engine.is_ready());
    }
}

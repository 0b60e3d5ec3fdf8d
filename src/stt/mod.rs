//! Speech-to-text engines.

pub mod engine;
pub mod whisper;

pub use engine::{EngineFactory, MockEngine, MockEngineFactory, SpeechEngine};
pub use whisper::{WhisperConfig, WhisperEngine, WhisperEngineFactory};

//! Whisper-based speech engine.
//!
//! Implements [`SpeechEngine`] on top of whisper-rs. Each engine instance
//! holds its own `WhisperContext`; instances are never shared between
//! workers, so no locking is needed around inference.
//!
//! # Feature Gate
//!
//! Real transcription requires the `whisper` feature (and cmake to build):
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! Without the feature a stub type is provided that fails at load time.

use crate::audio::AudioFormat;
use crate::defaults;
use crate::error::{Result, ScribeqError};
use crate::stt::engine::{EngineFactory, SpeechEngine};
use std::io::Cursor;
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file.
    pub model_path: PathBuf,
    /// Language code (e.g. "en", "de") or "auto" for detection.
    pub language: String,
    /// Number of inference threads (None = whisper default).
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Whisper engine implementation.
///
/// # Feature Gate
///
/// Only functional when the `whisper` feature is enabled.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: WhisperContext,
    config: WhisperConfig,
    model_name: String,
}

/// Whisper engine placeholder (without the whisper feature).
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

fn model_name_from_path(path: &std::path::Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Decode a WAV payload into mono f32 samples normalized to [-1.0, 1.0].
///
/// Multi-channel input is averaged down to mono. Whisper expects 16kHz;
/// payloads at other rates fail here rather than producing garbage text.
pub fn decode_wav(payload: &[u8]) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::new(Cursor::new(payload)).map_err(|e| ScribeqError::UnreadableAudio {
            message: e.to_string(),
        })?;
    let spec = reader.spec();

    if spec.sample_rate != 16000 {
        return Err(ScribeqError::UnreadableAudio {
            message: format!("expected 16kHz audio, got {}Hz", spec.sample_rate),
        });
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ScribeqError::UnreadableAudio {
                message: e.to_string(),
            })?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ScribeqError::UnreadableAudio {
                message: e.to_string(),
            })?,
    };

    if spec.channels <= 1 {
        return Ok(samples);
    }

    let channels = spec.channels as usize;
    Ok(samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect())
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Load a Whisper engine from the configured model file.
    ///
    /// # Errors
    /// Returns `ScribeqError::ModelNotFound` if the model file doesn't exist
    /// and `ScribeqError::EngineUnavailable` if loading fails.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(ScribeqError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);

        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| ScribeqError::EngineUnavailable {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| ScribeqError::EngineUnavailable {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context,
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, payload: &[u8], format: AudioFormat) -> Result<String> {
        // Container decoding is limited to WAV; other accepted formats need
        // a transcoding front-end upstream of the service.
        if format != AudioFormat::Wav {
            return Err(ScribeqError::Transcription {
                message: format!("whisper engine cannot decode '{}' payloads", format),
            });
        }

        let audio = decode_wav(payload)?;
        if audio.is_empty() {
            return Err(ScribeqError::UnreadableAudio {
                message: "audio contains no samples".to_string(),
            });
        }

        let mut state =
            self.context
                .create_state()
                .map_err(|e| ScribeqError::Transcription {
                    message: format!("Failed to create Whisper state: {}", e),
                })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio)
            .map_err(|e| ScribeqError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut transcription = String::new();
        for segment in state.as_iter() {
            transcription.push_str(&segment.to_string());
        }
        Ok(transcription.trim().to_string())
    }

    fn engine_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Create a Whisper engine (stub implementation).
    ///
    /// Still checks the model path so configuration mistakes surface the
    /// same way; every transcription then fails with an engine-unavailable
    /// error naming the missing feature.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(ScribeqError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }
        let model_name = model_name_from_path(&config.model_path);
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, _payload: &[u8], _format: AudioFormat) -> Result<String> {
        Err(ScribeqError::EngineUnavailable {
            message: "scribeq was built without the 'whisper' feature".to_string(),
        })
    }

    fn engine_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}

/// Factory that loads one Whisper engine per worker slot.
#[derive(Debug, Clone)]
pub struct WhisperEngineFactory {
    config: WhisperConfig,
}

impl WhisperEngineFactory {
    pub fn new(config: WhisperConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for WhisperEngineFactory {
    fn load(&self) -> Result<Box<dyn SpeechEngine>> {
        Ok(Box::new(WhisperEngine::new(self.config.clone())?))
    }
}

//! Error types for scribeq.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeqError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Validation errors (rejected before a worker is occupied)
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio payload is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Audio payload is empty")]
    EmptyPayload,

    #[error("Unreadable audio: {message}")]
    UnreadableAudio { message: String },

    // Engine errors
    #[error("Speech model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Speech engine unavailable: {message}")]
    EngineUnavailable { message: String },

    // Result delivery errors
    #[error("Delivery failed after {chunks_sent} chunk(s): {message}")]
    Delivery { chunks_sent: usize, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeqError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = ScribeqError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = ScribeqError::ConfigInvalidValue {
            key: "queue.capacity".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for queue.capacity: must be positive"
        );
    }

    #[test]
    fn test_unsupported_format_display() {
        let error = ScribeqError::UnsupportedFormat {
            format: "video/mp4".to_string(),
        };
        assert_eq!(error.to_string(), "Unsupported audio format: video/mp4");
    }

    #[test]
    fn test_payload_too_large_display() {
        let error = ScribeqError::PayloadTooLarge {
            size: 30_000_000,
            limit: 20_971_520,
        };
        assert_eq!(
            error.to_string(),
            "Audio payload is 30000000 bytes, limit is 20971520 bytes"
        );
    }

    #[test]
    fn test_empty_payload_display() {
        assert_eq!(
            ScribeqError::EmptyPayload.to_string(),
            "Audio payload is empty"
        );
    }

    #[test]
    fn test_unreadable_audio_display() {
        let error = ScribeqError::UnreadableAudio {
            message: "truncated RIFF header".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unreadable audio: truncated RIFF header"
        );
    }

    #[test]
    fn test_model_not_found_display() {
        let error = ScribeqError::ModelNotFound {
            path: "/models/ggml-base.bin".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speech model not found at /models/ggml-base.bin"
        );
    }

    #[test]
    fn test_transcription_display() {
        let error = ScribeqError::Transcription {
            message: "inference failed".to_string(),
        };
        assert_eq!(error.to_string(), "Transcription failed: inference failed");
    }

    #[test]
    fn test_engine_unavailable_display() {
        let error = ScribeqError::EngineUnavailable {
            message: "context corrupted".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speech engine unavailable: context corrupted"
        );
    }

    #[test]
    fn test_delivery_display() {
        let error = ScribeqError::Delivery {
            chunks_sent: 1,
            message: "connection reset".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Delivery failed after 1 chunk(s): connection reset"
        );
    }

    #[test]
    fn test_other_display() {
        let error = ScribeqError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: ScribeqError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: ScribeqError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ScribeqError>();
        assert_sync::<ScribeqError>();
    }
}

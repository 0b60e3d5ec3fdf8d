use crate::audio::ValidationLimits;
use crate::defaults;
use crate::service::ServiceConfig;
use crate::stt::whisper::WhisperConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub limits: LimitsConfig,
    pub transport: TransportConfig,
}

/// Queue and admission configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub max_jobs_per_user: u32,
}

/// Worker pool and engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub count: usize,
    pub model: String,
    pub language: String,
    pub threads: Option<usize>,
}

/// Payload validation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_payload_bytes: u64,
    /// Accepted file extensions; empty means the built-in format list.
    pub accepted_extensions: Vec<String>,
}

/// Outbound message configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub chunk_chars: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::QUEUE_CAPACITY,
            max_jobs_per_user: defaults::MAX_JOBS_PER_USER,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: defaults::WORKER_COUNT,
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: defaults::MAX_PAYLOAD_BYTES,
            accepted_extensions: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_chars: defaults::CHUNK_CHARS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIBEQ_MODEL → worker.model
    /// - SCRIBEQ_LANGUAGE → worker.language
    /// - SCRIBEQ_WORKERS → worker.count
    /// - SCRIBEQ_QUEUE_CAPACITY → queue.capacity
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("SCRIBEQ_MODEL")
            && !model.is_empty()
        {
            self.worker.model = model;
        }

        if let Ok(language) = std::env::var("SCRIBEQ_LANGUAGE")
            && !language.is_empty()
        {
            self.worker.language = language;
        }

        if let Ok(workers) = std::env::var("SCRIBEQ_WORKERS")
            && let Ok(count) = workers.parse::<usize>()
            && count > 0
        {
            self.worker.count = count;
        }

        if let Ok(capacity) = std::env::var("SCRIBEQ_QUEUE_CAPACITY")
            && let Ok(capacity) = capacity.parse::<usize>()
            && capacity > 0
        {
            self.queue.capacity = capacity;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scribeq/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("scribeq")
            .join("config.toml")
    }

    /// Validation limits derived from `[limits]`.
    pub fn validation_limits(&self) -> ValidationLimits {
        let mut limits = ValidationLimits {
            max_payload_bytes: self.limits.max_payload_bytes,
            ..Default::default()
        };
        if !self.limits.accepted_extensions.is_empty() {
            limits.accepted_extensions = self
                .limits
                .accepted_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect();
        }
        limits
    }

    /// Service wiring derived from the config sections.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            queue_capacity: self.queue.capacity,
            max_jobs_per_user: self.queue.max_jobs_per_user,
            worker_count: self.worker.count,
            chunk_chars: self.transport.chunk_chars,
            limits: self.validation_limits(),
        }
    }

    /// Engine settings derived from `[worker]`.
    pub fn whisper_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: PathBuf::from(&self.worker.model),
            language: self.worker.language.clone(),
            threads: self.worker.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_scribeq_env() {
        remove_env("SCRIBEQ_MODEL");
        remove_env("SCRIBEQ_LANGUAGE");
        remove_env("SCRIBEQ_WORKERS");
        remove_env("SCRIBEQ_QUEUE_CAPACITY");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.queue.max_jobs_per_user, 2);

        assert_eq!(config.worker.count, 2);
        assert_eq!(config.worker.model, "base");
        assert_eq!(config.worker.language, "auto");
        assert_eq!(config.worker.threads, None);

        assert_eq!(config.limits.max_payload_bytes, 20 * 1024 * 1024);
        assert!(config.limits.accepted_extensions.is_empty());

        assert_eq!(config.transport.chunk_chars, 4096);
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [queue]
            capacity = 50
            max_jobs_per_user = 3

            [worker]
            count = 4
            model = "models/ggml-large-v3.bin"
            language = "es"
            threads = 8

            [limits]
            max_payload_bytes = 10485760
            accepted_extensions = ["ogg", "mp3"]

            [transport]
            chunk_chars = 2048
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.queue.capacity, 50);
        assert_eq!(config.queue.max_jobs_per_user, 3);
        assert_eq!(config.worker.count, 4);
        assert_eq!(config.worker.model, "models/ggml-large-v3.bin");
        assert_eq!(config.worker.language, "es");
        assert_eq!(config.worker.threads, Some(8));
        assert_eq!(config.limits.max_payload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.accepted_extensions, vec!["ogg", "mp3"]);
        assert_eq!(config.transport.chunk_chars, 2048);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [worker]
            count = 1
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.worker.count, 1);

        // Everything else should be defaults
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.queue.max_jobs_per_user, 2);
        assert_eq!(config.worker.model, "base");
        assert_eq!(config.transport.chunk_chars, 4096);
    }

    #[test]
    fn test_env_override_model() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_scribeq_env();

        set_env("SCRIBEQ_MODEL", "models/ggml-tiny.bin");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.worker.model, "models/ggml-tiny.bin");
        assert_eq!(config.worker.language, "auto"); // Not overridden

        clear_scribeq_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_scribeq_env();

        set_env("SCRIBEQ_MODEL", "models/ggml-medium.bin");
        set_env("SCRIBEQ_LANGUAGE", "fr");
        set_env("SCRIBEQ_WORKERS", "6");
        set_env("SCRIBEQ_QUEUE_CAPACITY", "250");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.worker.model, "models/ggml-medium.bin");
        assert_eq!(config.worker.language, "fr");
        assert_eq!(config.worker.count, 6);
        assert_eq!(config.queue.capacity, 250);

        clear_scribeq_env();
    }

    #[test]
    fn test_env_override_empty_or_invalid_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_scribeq_env();

        set_env("SCRIBEQ_MODEL", "");
        set_env("SCRIBEQ_WORKERS", "zero");
        set_env("SCRIBEQ_QUEUE_CAPACITY", "0");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.worker.model, "base");
        assert_eq!(config.worker.count, 2);
        assert_eq!(config.queue.capacity, 100);

        clear_scribeq_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [queue
            capacity = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());

        assert!(result.is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("scribeq"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_scribeq_config_12345.toml");
        let config = Config::load_or_default(missing_path);

        assert_eq!(config, Config::default());
    }

    #[test]
    #[should_panic(expected = "Failed to load config")]
    fn test_load_or_default_panics_on_invalid_toml() {
        let invalid_toml = r#"
            [queue
            capacity = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        Config::load_or_default(temp_file.path());
    }

    #[test]
    fn test_validation_limits_fall_back_to_builtin_formats() {
        let config = Config::default();
        let limits = config.validation_limits();
        assert!(limits.accepted_extensions.contains(&"ogg".to_string()));
        assert!(limits.accepted_extensions.contains(&"wav".to_string()));

        let restricted = Config {
            limits: LimitsConfig {
                accepted_extensions: vec!["OGG".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            restricted.validation_limits().accepted_extensions,
            vec!["ogg"]
        );
    }

    #[test]
    fn test_service_config_mirrors_sections() {
        let config = Config {
            queue: QueueConfig {
                capacity: 7,
                max_jobs_per_user: 1,
            },
            worker: WorkerConfig {
                count: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let service = config.service_config();
        assert_eq!(service.queue_capacity, 7);
        assert_eq!(service.max_jobs_per_user, 1);
        assert_eq!(service.worker_count, 3);
        assert_eq!(service.chunk_chars, 4096);
    }
}

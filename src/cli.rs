//! Command-line interface for scribeq
//!
//! Provides argument parsing using clap derive macros.

use clap::Parser;
use std::path::PathBuf;

/// Transcribe audio files through the scribeq service
#[derive(Parser, Debug)]
#[command(
    name = "scribeq",
    version,
    about = "Concurrent audio transcription with bounded queueing"
)]
pub struct Cli {
    /// Audio files to transcribe
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Whisper model path (default: base, multilingual)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code for transcription (default: auto-detect). Examples: auto, en, de, es, fr
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Number of worker threads (one engine instance each)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Suppress queue-position and progress output
    #[arg(short, long)]
    pub quiet: bool,
}

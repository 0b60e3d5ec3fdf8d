use anyhow::{Context, Result};
use clap::Parser;
use scribeq::audio::{AudioFormat, AudioItem};
use scribeq::cli::Cli;
use scribeq::config::Config;
use scribeq::queue::UserId;
use scribeq::service::{RejectReason, Service, SubmitOutcome};
use scribeq::stt::whisper::WhisperEngineFactory;
use scribeq::transport::StdoutTransport;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.worker.model = model;
    }
    if let Some(language) = cli.language {
        config.worker.language = language;
    }
    if let Some(workers) = cli.workers {
        config.worker.count = workers;
    }

    let factory = Arc::new(WhisperEngineFactory::new(config.whisper_config()));
    let transport = Arc::new(StdoutTransport);
    let service = Service::start(config.service_config(), factory, transport)
        .context("failed to start transcription service")?;

    // All local files belong to one synthetic user, so per-user limits
    // apply to the batch; capacity and quota rejections are retried while
    // the workers drain the backlog.
    let user = UserId(0);
    let mut admitted = 0usize;
    for file in &cli.files {
        let item = match read_audio(file) {
            Ok(item) => item,
            Err(e) => {
                eprintln!("scribeq: skipping {}: {e}", file.display());
                continue;
            }
        };
        let outcome = submit_with_retry(&service, user, item, Duration::from_secs(3600));
        if outcome.is_admitted() {
            admitted += 1;
        }
        if !cli.quiet || !outcome.is_admitted() {
            eprintln!("scribeq: {}: {}", file.display(), outcome.user_message());
        }
    }

    if admitted > 0 && !service.drain(Duration::from_secs(3600)) {
        eprintln!("scribeq: timed out waiting for transcriptions to finish");
    }
    // Counters are read after shutdown joins the dispatcher, so the last
    // deliveries are included.
    let (delivered, failed) = service.shutdown();
    if !cli.quiet {
        eprintln!("scribeq: done, {delivered} delivered, {failed} failed");
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/scribeq/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
    };

    Ok(config.with_env_overrides())
}

/// Submit one item, retrying capacity and quota rejections until the
/// workers free up room or the deadline passes. Validation rejections are
/// final and returned immediately.
fn submit_with_retry(
    service: &Service,
    user: UserId,
    item: AudioItem,
    deadline: Duration,
) -> SubmitOutcome {
    let give_up = std::time::Instant::now() + deadline;
    loop {
        let outcome = service.submit(user, item.clone());
        let retryable = matches!(
            outcome,
            SubmitOutcome::Rejected(RejectReason::Capacity)
                | SubmitOutcome::Rejected(RejectReason::UserQuota { .. })
        );
        if !retryable || std::time::Instant::now() >= give_up {
            return outcome;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Read one audio file into a submission item, deriving the MIME type
/// from the file extension.
fn read_audio(path: &Path) -> Result<AudioItem> {
    let payload = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension)
        .map(|f| f.mime())
        .unwrap_or("application/octet-stream");
    let file_name = path.file_name().and_then(|n| n.to_str());
    Ok(AudioItem::new(payload, mime, file_name))
}

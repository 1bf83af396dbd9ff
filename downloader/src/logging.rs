/// Tracing setup: the run's single log sink.
///
/// Everything at INFO and above is appended to the log file with timestamps.
/// Only warnings and errors go to stderr, so they don't fight the progress bars.
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use harvest_shared::errors::{HarvestError, HarvestResult};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "harvest_downloader=info,harvest_shared=info";

/// Install the global subscriber. Call once, before anything logs.
pub fn init(log_file: &Path) -> HarvestResult<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr.with_max_level(Level::WARN)),
        )
        .try_init()
        .map_err(|e| HarvestError::Config(format!("Failed to initialize logging: {}", e)))
}

/// Fallback for failures before `init` has run: errors to stderr only.
///
/// A no-op if a global subscriber is already installed.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(Level::WARN)
        .with_writer(std::io::stderr)
        .try_init();
}

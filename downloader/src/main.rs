/// PDF Harvest - Main Entry Point
///
/// Scans a Telegram channel for PDF documents and archives them into a local
/// folder, several at a time, retrying failed downloads.
mod config;
mod coordinator;
mod logging;
mod progress;
mod resume;
mod scanner;
mod telegram;
#[cfg(test)]
mod testing;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use harvest_shared::gate::ConcurrencyGate;
use harvest_shared::models::{DownloadTask, RunSummary};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use config::Config;
use coordinator::{Coordinator, RetryPolicy, DEFAULT_BASE_DELAY};
use telegram::TelegramSource;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init_stderr();
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.log_file) {
        logging::init_stderr();
        error!("{}", e);
        std::process::exit(1);
    }

    let started = Utc::now();
    info!("=== PDF Harvest starting ===");

    let span = info_span!(
        "run",
        run_id = %uuid::Uuid::new_v4(),
        channel = %config.channel_username,
    );
    let result = run(&config).instrument(span).await;
    let elapsed = Utc::now() - started;
    let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;

    match result {
        Ok(summary) => {
            match serde_json::to_string(&summary) {
                Ok(json) => info!("Run summary: {}", json),
                Err(e) => warn!("Could not serialize run summary: {}", e),
            }
            info!("Total execution time: {:.1}s", elapsed_secs);
        }
        Err(e) => {
            error!("Fatal error: {:?}", e);
            info!("Total execution time: {:.1}s", elapsed_secs);
            std::process::exit(1);
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    info!("Starting download process...");
    tokio::fs::create_dir_all(&config.download_folder)
        .await
        .with_context(|| {
            format!(
                "Failed to create download folder {}",
                config.download_folder.display()
            )
        })?;

    // Login prompts run before the interrupt handler exists, so Ctrl-C there still kills the process.
    let source = Arc::new(
        TelegramSource::connect(config)
            .await
            .context("Failed to connect to Telegram")?,
    );

    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    let messages = scanner::scan(source.as_ref(), &config.channel_username, &cancel)
        .await
        .with_context(|| format!("Scan of @{} failed", config.channel_username))?;

    let tasks: Vec<DownloadTask> = messages
        .into_iter()
        .filter_map(|m| DownloadTask::for_message(m, &config.download_folder))
        .collect();

    let report = Coordinator::new(source.clone(), ConcurrencyGate::new(config.max_concurrent))
        .with_retry(RetryPolicy::new(config.retry_limit, DEFAULT_BASE_DELAY))
        .with_cancellation(cancel)
        .with_progress(std::io::stderr().is_terminal())
        .run(tasks)
        .await;

    if let Err(e) = source.save_session(&config.session_file) {
        warn!("{}", e);
    }

    Ok(report.summary)
}

/// First Ctrl-C cancels the run gracefully, a second one exits immediately.
async fn watch_interrupts(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupt received, letting in-flight downloads finish (Ctrl-C again to quit)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        error!("Second interrupt received, exiting now");
        std::process::exit(130);
    }
}

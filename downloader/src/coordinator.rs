/// Download coordinator.
///
/// Spawns one tokio task per `DownloadTask`. Each task checks the completion
/// key, takes a slot from the shared `ConcurrencyGate`, and runs up to
/// `RetryPolicy::max_attempts` sequential attempts with exponential backoff.
/// Failed attempts never leave a partial file behind. Per-task failures are
/// contained: the run always finishes with a `RunReport`.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use harvest_shared::errors::DownloadError;
use harvest_shared::gate::ConcurrencyGate;
use harvest_shared::models::{DownloadTask, RunSummary, TaskReport, TaskState};
use harvest_shared::source::MessageSource;
use indicatif::ProgressBar;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::progress::ProgressReporter;
use crate::resume::{CompletionCheck, FileExists};

pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Attempt budget and backoff schedule for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_LIMIT, DEFAULT_BASE_DELAY)
    }
}

/// Everything a finished run reports.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// In completion order.
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn task(&self, filename: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.filename == filename)
    }
}

#[derive(Clone)]
pub struct Coordinator {
    source: Arc<dyn MessageSource>,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
    completion: Arc<dyn CompletionCheck>,
    cancel: CancellationToken,
    show_progress: bool,
}

impl Coordinator {
    pub fn new(source: Arc<dyn MessageSource>, gate: ConcurrencyGate) -> Self {
        Self {
            source,
            gate,
            retry: RetryPolicy::default(),
            completion: Arc::new(FileExists),
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_completion_check(mut self, completion: Arc<dyn CompletionCheck>) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run every task to a terminal state and report.
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> RunReport {
        let total = tasks.len();
        info!(
            "Starting {} downloads (max {} concurrent, {} attempts each)",
            total,
            self.gate.limit(),
            self.retry.max_attempts
        );

        let progress = ProgressReporter::new(total as u64, self.show_progress);
        let mut set = JoinSet::new();
        for task in tasks {
            let worker = self.clone();
            let progress = progress.clone();
            let span = info_span!("download", message_id = task.message.id);
            set.spawn(async move { worker.process(task, &progress).await }.instrument(span));
        }

        let mut summary = RunSummary::default();
        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            progress.task_finished();
            match joined {
                Ok(report) => {
                    summary.record(report.state);
                    reports.push(report);
                }
                Err(e) => {
                    error!("Download task aborted: {}", e);
                    summary.record(TaskState::PermanentlyFailed);
                }
            }
        }
        progress.finish();
        debug!("{} of {} tasks reached a terminal state", progress.finished_count(), total);

        info!(
            "All downloads completed! downloaded={} skipped={} failed={} cancelled={}",
            summary.downloaded, summary.skipped, summary.failed, summary.cancelled
        );
        RunReport {
            summary,
            tasks: reports,
        }
    }

    async fn process(&self, task: DownloadTask, progress: &ProgressReporter) -> TaskReport {
        let mut report = TaskReport::new(&task);
        let name = task.filename().to_string();

        if self.completion.is_complete(&task.destination).await {
            info!("Skipping existing file: {}", name);
            report.state = TaskState::Skipped;
            return report;
        }

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.gate.acquire() => permit,
        };
        let Some(_permit) = permit else {
            info!("Not starting {}: run cancelled", name);
            report.state = TaskState::Cancelled;
            return report;
        };

        let bar = progress.file_bar(&name, task.size());
        let max = self.retry.max_attempts;

        for attempt in 1..=max {
            // A same-named sibling may have finished while this task waited.
            if self.completion.is_complete(&task.destination).await {
                info!("Skipping existing file: {}", name);
                report.state = TaskState::Skipped;
                bar.finish_and_clear();
                return report;
            }

            report.state = TaskState::Attempting(attempt);
            report.attempts = attempt;
            bar.set_position(0);
            info!("Downloading (attempt {}): {}", attempt, name);

            match self.attempt(&task, &bar).await {
                Ok(written) => {
                    report.bytes_written = written;
                    report.state = TaskState::Succeeded;
                    bar.finish_and_clear();
                    info!("Downloaded {} ({} bytes)", name, written);
                    return report;
                }
                Err(e) => {
                    error!("Attempt {} failed for {}: {}", attempt, name, e);
                    remove_partial(&task.destination).await;
                    report.last_error = Some(e.to_string());
                }
            }

            if attempt == max {
                break;
            }

            let delay = self.retry.delay_for(attempt);
            report.state = TaskState::RetryBackoff(attempt);
            debug!("Retrying {} in {:?}", name, delay);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("Run cancelled, no further attempts for {}", name);
                    report.state = TaskState::Cancelled;
                    bar.abandon();
                    return report;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            report.backoffs.push(delay);
        }

        report.state = TaskState::PermanentlyFailed;
        error!("Giving up on {} after {} attempts", name, report.attempts);
        bar.abandon_with_message(format!("{} (failed)", crate::progress::short_label(&name)));
        report
    }

    /// One full attempt: fresh file, whole stream.
    async fn attempt(&self, task: &DownloadTask, bar: &ProgressBar) -> Result<u64, DownloadError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&task.destination)
            .await?;

        let mut chunks = self.source.download(&task.message).await?;
        let mut written = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }
        file.flush().await?;

        Ok(written)
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial file {}: {}", path.display(), e),
    }
}

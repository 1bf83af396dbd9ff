/// Message scanner: one pass over a channel's history, keeping PDF documents.
use futures::StreamExt;
use harvest_shared::errors::{HarvestError, HarvestResult};
use harvest_shared::models::RemoteMessage;
use harvest_shared::source::MessageSource;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Matches between progress log lines.
pub const SCAN_LOG_INTERVAL: usize = 50;

/// Collect every PDF-carrying message of `channel`, in the source's order.
///
/// Any source error aborts the scan; a partial list is never returned.
pub async fn scan(
    source: &dyn MessageSource,
    channel: &str,
    cancel: &CancellationToken,
) -> HarvestResult<Vec<RemoteMessage>> {
    info!("Scanning channel @{} for PDFs", channel);

    let mut history = source.history(channel).await?;
    let mut pdfs = Vec::new();
    let mut seen = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
            next = history.next() => next,
        };
        let Some(message) = next else { break };
        let message = message?;
        seen += 1;

        if message.has_pdf() {
            pdfs.push(message);
            if should_log_progress(pdfs.len()) {
                info!("Collected {} PDFs so far...", pdfs.len());
            }
        }
    }

    info!("Total PDFs found: {} (out of {} messages)", pdfs.len(), seen);
    Ok(pdfs)
}

/// True when `found` matches warrant a "Collected N PDFs so far..." line.
fn should_log_progress(found: usize) -> bool {
    found > 0 && found % SCAN_LOG_INTERVAL == 0
}

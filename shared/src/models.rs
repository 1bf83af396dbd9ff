/// Data model shared across PDF Harvest crates.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mime type a document must carry to be archived.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Metadata about a file attached to a message, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub filename: String,
    pub size: u64,
    pub mime_type: Option<String>,
}

impl AttachmentDescriptor {
    /// Exact match on the declared mime type; no sniffing, no parameters.
    pub fn is_pdf(&self) -> bool {
        self.mime_type.as_deref() == Some(PDF_MIME_TYPE)
    }
}

/// A message as seen through the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: i32,
    pub attachment: Option<AttachmentDescriptor>,
}

impl RemoteMessage {
    pub fn has_pdf(&self) -> bool {
        self.attachment.as_ref().is_some_and(AttachmentDescriptor::is_pdf)
    }
}

/// One pending download: a message and where its attachment goes.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub message: RemoteMessage,
    pub destination: PathBuf,
}

impl DownloadTask {
    /// Build a task targeting `folder/<declared filename>`.
    ///
    /// The filename is used as-is. Two attachments with the same name map to
    /// the same destination. Returns `None` for messages without attachment.
    pub fn for_message(message: RemoteMessage, folder: &Path) -> Option<Self> {
        let destination = folder.join(&message.attachment.as_ref()?.filename);
        Some(Self { message, destination })
    }

    pub fn filename(&self) -> &str {
        self.message
            .attachment
            .as_ref()
            .map(|a| a.filename.as_str())
            .unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.message.attachment.as_ref().map(|a| a.size).unwrap_or(0)
    }
}

/// Lifecycle of a single download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    /// 1-based attempt number currently streaming.
    Attempting(u32),
    /// Waiting after the given failed attempt.
    RetryBackoff(u32),
    Succeeded,
    Skipped,
    PermanentlyFailed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded
                | TaskState::Skipped
                | TaskState::PermanentlyFailed
                | TaskState::Cancelled
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Attempting(k) => write!(f, "attempting({})", k),
            TaskState::RetryBackoff(k) => write!(f, "retry_backoff({})", k),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Skipped => write!(f, "skipped"),
            TaskState::PermanentlyFailed => write!(f, "permanently_failed"),
            TaskState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final record of one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub filename: String,
    pub destination: PathBuf,
    pub state: TaskState,
    /// Download attempts actually issued.
    pub attempts: u32,
    /// Backoff delays waited between attempts, in order.
    pub backoffs: Vec<Duration>,
    pub bytes_written: u64,
    pub last_error: Option<String>,
}

impl TaskReport {
    pub fn new(task: &DownloadTask) -> Self {
        Self {
            filename: task.filename().to_string(),
            destination: task.destination.clone(),
            state: TaskState::Pending,
            attempts: 0,
            backoffs: Vec::new(),
            bytes_written: 0,
            last_error: None,
        }
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RunSummary {
    /// Count one terminal state. Non-terminal states are ignored.
    pub fn record(&mut self, state: TaskState) {
        if !state.is_terminal() {
            return;
        }
        self.total += 1;
        match state {
            TaskState::Succeeded => self.downloaded += 1,
            TaskState::Skipped => self.skipped += 1,
            TaskState::PermanentlyFailed => self.failed += 1,
            TaskState::Cancelled => self.cancelled += 1,
            TaskState::Pending | TaskState::Attempting(_) | TaskState::RetryBackoff(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, mime: Option<&str>) -> RemoteMessage {
        RemoteMessage {
            id: 1,
            attachment: Some(AttachmentDescriptor {
                filename: name.to_string(),
                size: 10,
                mime_type: mime.map(String::from),
            }),
        }
    }

    #[test]
    fn test_pdf_match_is_exact() {
        assert!(doc("a.pdf", Some("application/pdf")).has_pdf());
        assert!(!doc("a.pdf", Some("application/PDF")).has_pdf());
        assert!(!doc("a.pdf", Some("application/pdf; charset=binary")).has_pdf());
        assert!(!doc("a.pdf", None).has_pdf());
        assert!(!RemoteMessage { id: 2, attachment: None }.has_pdf());
    }

    #[test]
    fn test_task_destination_uses_declared_filename() {
        let task = DownloadTask::for_message(doc("report.pdf", Some(PDF_MIME_TYPE)), Path::new("/tmp/out")).unwrap();
        assert_eq!(task.destination, PathBuf::from("/tmp/out/report.pdf"));
        assert_eq!(task.filename(), "report.pdf");
        assert_eq!(task.size(), 10);
    }

    #[test]
    fn test_task_requires_attachment() {
        let msg = RemoteMessage { id: 3, attachment: None };
        assert!(DownloadTask::for_message(msg, Path::new("/tmp")).is_none());
    }

    #[test]
    fn test_summary_counts_terminal_states_only() {
        let mut summary = RunSummary::default();
        summary.record(TaskState::Succeeded);
        summary.record(TaskState::Skipped);
        summary.record(TaskState::PermanentlyFailed);
        summary.record(TaskState::Attempting(1));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Skipped.is_terminal());
        assert!(!TaskState::RetryBackoff(1).is_terminal());
        assert_eq!(TaskState::Attempting(2).to_string(), "attempting(2)");
    }
}

/// Resume key: decides whether a destination already holds finished work.
use std::path::Path;

use async_trait::async_trait;

#[async_trait]
pub trait CompletionCheck: Send + Sync {
    async fn is_complete(&self, destination: &Path) -> bool;
}

/// A file at the destination path counts as done. Size and content are not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExists;

#[async_trait]
impl CompletionCheck for FileExists {
    async fn is_complete(&self, destination: &Path) -> bool {
        tokio::fs::try_exists(destination).await.unwrap_or(false)
    }
}

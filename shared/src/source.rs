/// Capability interface over the remote messaging API.
///
/// The scanner and coordinator only see this trait; the Telegram client is one
/// implementation, test doubles are another.
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::SourceError;
use crate::models::RemoteMessage;

/// Messages of a channel, in the provider's native order.
pub type MessageStream = BoxStream<'static, Result<RemoteMessage, SourceError>>;

/// Raw bytes of an attachment, in chunks.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, SourceError>>;

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Resolve `channel` and iterate its full history once.
    async fn history(&self, channel: &str) -> Result<MessageStream, SourceError>;

    /// Start streaming the attachment of `message`.
    async fn download(&self, message: &RemoteMessage) -> Result<ChunkStream, SourceError>;
}

//! Test doubles for the remote source.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use harvest_shared::errors::SourceError;
use harvest_shared::models::{AttachmentDescriptor, RemoteMessage};
use harvest_shared::source::{ChunkStream, MessageSource, MessageStream};

const CHUNK_SIZE: usize = 64;

/// How one download call for a message behaves.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Succeed,
    /// Refuse to start the stream.
    FailOpen,
    /// Yield one chunk, then break.
    FailMidStream,
}

pub fn message(id: i32, filename: &str, size: u64, mime: Option<&str>) -> RemoteMessage {
    RemoteMessage {
        id,
        attachment: Some(AttachmentDescriptor {
            filename: filename.to_string(),
            size,
            mime_type: mime.map(String::from),
        }),
    }
}

/// Deterministic bytes served for a message.
pub fn content_for(message: &RemoteMessage) -> Vec<u8> {
    let size = message.attachment.as_ref().map(|a| a.size).unwrap_or(0);
    (0..size)
        .map(|i| (i as u8).wrapping_add(message.id as u8))
        .collect()
}

pub struct MockSource {
    messages: Vec<RemoteMessage>,
    missing_channel: bool,
    history_error_after: Option<usize>,
    chunk_delay: Option<Duration>,
    scripts: Mutex<HashMap<i32, VecDeque<Script>>>,
    download_calls: AtomicUsize,
    calls_by_id: Mutex<HashMap<i32, u32>>,
}

impl MockSource {
    pub fn new(messages: Vec<RemoteMessage>) -> Self {
        Self {
            messages,
            missing_channel: false,
            history_error_after: None,
            chunk_delay: None,
            scripts: Mutex::new(HashMap::new()),
            download_calls: AtomicUsize::new(0),
            calls_by_id: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_missing_channel(mut self) -> Self {
        self.missing_channel = true;
        self
    }

    /// History yields `n` messages then a connection error.
    pub fn with_history_error_after(mut self, n: usize) -> Self {
        self.history_error_after = Some(n);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Per-attempt behaviour for message `id`; attempts past the script succeed.
    pub fn with_script(self, id: i32, script: Vec<Script>) -> Self {
        self.scripts.lock().unwrap().insert(id, script.into());
        self
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, id: i32) -> u32 {
        self.calls_by_id.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MessageSource for MockSource {
    async fn history(&self, channel: &str) -> Result<MessageStream, SourceError> {
        if self.missing_channel {
            return Err(SourceError::ChannelNotFound(channel.to_string()));
        }

        let mut items: Vec<Result<RemoteMessage, SourceError>> = match self.history_error_after {
            Some(n) => self.messages.iter().take(n).cloned().map(Ok).collect(),
            None => self.messages.iter().cloned().map(Ok).collect(),
        };
        if self.history_error_after.is_some() {
            items.push(Err(SourceError::Connection("connection lost".into())));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn download(&self, message: &RemoteMessage) -> Result<ChunkStream, SourceError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_id.lock().unwrap().entry(message.id).or_insert(0) += 1;

        if message.attachment.is_none() {
            return Err(SourceError::MissingAttachment(message.id));
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&message.id)
            .and_then(|s| s.pop_front())
            .unwrap_or(Script::Succeed);

        let content = content_for(message);
        let mut items: Vec<Result<Vec<u8>, SourceError>> = content
            .chunks(CHUNK_SIZE)
            .map(|c| Ok(c.to_vec()))
            .collect();

        match script {
            Script::Succeed => {}
            Script::FailOpen => {
                return Err(SourceError::Connection("flood wait".into()));
            }
            Script::FailMidStream => {
                items.truncate(1);
                items.push(Err(SourceError::Stream("connection reset".into())));
            }
        }

        let delay = self.chunk_delay;
        Ok(stream::iter(items)
            .then(move |item| async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                item
            })
            .boxed())
    }
}

/// Telegram implementation of `MessageSource` over an MTProto user session.
///
/// Bots cannot read channel history, so this signs in as a user. The first
/// run prompts for the login code (and 2FA password if set); the session file
/// keeps later runs non-interactive.
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use grammers_client::types::{Downloadable, Media, Message};
use grammers_client::{Client, Config as ClientConfig, InitParams, SignInError};
use grammers_session::Session;
use harvest_shared::errors::SourceError;
use harvest_shared::models::{AttachmentDescriptor, RemoteMessage};
use harvest_shared::source::{ChunkStream, MessageSource, MessageStream};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::config::Config;

pub struct TelegramSource {
    client: Client,
    /// Documents seen during the scan, by message id. Only PDFs are kept.
    documents: Arc<Mutex<HashMap<i32, Media>>>,
}

impl TelegramSource {
    /// Connect with the configured credentials and make sure the session is signed in.
    pub async fn connect(config: &Config) -> Result<Self, SourceError> {
        let session = Session::load_file_or_create(&config.session_file).map_err(|e| {
            SourceError::Connection(format!(
                "Cannot open session file {}: {}",
                config.session_file.display(),
                e
            ))
        })?;

        let client = Client::connect(ClientConfig {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams {
                catch_up: false,
                ..Default::default()
            },
        })
        .await
        .map_err(|e| SourceError::Connection(e.to_string()))?;
        info!("Connected to Telegram");

        let source = Self {
            client,
            documents: Arc::new(Mutex::new(HashMap::new())),
        };
        source.authorize(config).await?;
        Ok(source)
    }

    async fn authorize(&self, config: &Config) -> Result<(), SourceError> {
        let authorized = self
            .client
            .is_authorized()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        if authorized {
            debug!("Existing session is authorized");
            return Ok(());
        }

        info!("Session not authorized, starting login");
        let phone = match &config.phone {
            Some(phone) => phone.clone(),
            None => prompt("Phone number (international format): ").await?,
        };
        let token = self
            .client
            .request_login_code(&phone)
            .await
            .map_err(|e| SourceError::Auth(e.to_string()))?;
        let code = prompt("Login code: ").await?;

        match self.client.sign_in(&token, &code).await {
            Ok(_) => {}
            Err(SignInError::PasswordRequired(password_token)) => {
                let password = prompt("Two-step verification password: ").await?;
                self.client
                    .check_password(password_token, password.as_bytes())
                    .await
                    .map_err(|e| SourceError::Auth(e.to_string()))?;
            }
            Err(e) => return Err(SourceError::Auth(e.to_string())),
        }
        info!("Signed in to Telegram");

        self.save_session(&config.session_file)
    }

    /// Persist the session so later runs skip the login.
    pub fn save_session(&self, path: &Path) -> Result<(), SourceError> {
        self.client.session().save_to_file(path).map_err(|e| {
            SourceError::Connection(format!("Cannot save session to {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl MessageSource for TelegramSource {
    async fn history(&self, channel: &str) -> Result<MessageStream, SourceError> {
        let chat = self
            .client
            .resolve_username(channel)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?
            .ok_or_else(|| SourceError::ChannelNotFound(channel.to_string()))?;
        info!("Resolved @{} (id {})", channel, chat.id());

        let iter = self.client.iter_messages(chat.pack());
        let documents = self.documents.clone();
        let messages = stream::try_unfold(iter, move |mut iter| {
            let documents = documents.clone();
            async move {
                match iter.next().await {
                    Ok(Some(message)) => Ok(Some((describe(&message, &documents), iter))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(SourceError::Connection(e.to_string())),
                }
            }
        });
        Ok(messages.boxed())
    }

    async fn download(&self, message: &RemoteMessage) -> Result<ChunkStream, SourceError> {
        let media = self
            .documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(&message.id).cloned())
            .ok_or(SourceError::MissingAttachment(message.id))?;

        let iter = self.client.iter_download(&Downloadable::Media(media));
        let chunks = stream::try_unfold(iter, |mut iter| async move {
            match iter.next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, iter))),
                Ok(None) => Ok(None),
                Err(e) => Err(SourceError::Stream(e.to_string())),
            }
        });
        Ok(chunks.boxed())
    }
}

/// Map a Telegram message onto the archive's view of it, remembering PDF documents.
fn describe(message: &Message, documents: &Mutex<HashMap<i32, Media>>) -> RemoteMessage {
    let attachment = match message.media() {
        Some(Media::Document(document)) => {
            let filename = match document.name() {
                "" => format!("{}.pdf", message.id()),
                name => name.to_string(),
            };
            let descriptor = AttachmentDescriptor {
                filename,
                size: document.size().max(0) as u64,
                mime_type: document.mime_type().map(String::from),
            };
            if descriptor.is_pdf() {
                if let Ok(mut docs) = documents.lock() {
                    docs.insert(message.id(), Media::Document(document));
                }
            }
            Some(descriptor)
        }
        _ => None,
    };

    RemoteMessage {
        id: message.id(),
        attachment,
    }
}

async fn prompt(question: &str) -> Result<String, SourceError> {
    let prompt_failed = |e: std::io::Error| SourceError::Auth(format!("Cannot write prompt: {}", e));
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await.map_err(prompt_failed)?;
    stdout.flush().await.map_err(prompt_failed)?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| SourceError::Auth(format!("Cannot read input: {}", e)))?;

    let answer = line.trim().to_string();
    if answer.is_empty() {
        return Err(SourceError::Auth(format!("No answer given to {:?}", question.trim())));
    }
    Ok(answer)
}

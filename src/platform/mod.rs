pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Kind of chat a message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// Author of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    /// Handle without the leading `@`
    pub username: Option<String>,
    pub full_name: String,
}

impl Sender {
    /// Handle, falling back to the display name.
    pub fn label(&self) -> Option<&str> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.full_name.trim()).filter(|s| !s.is_empty()))
    }
}

/// Media attached to a message, with the metadata the task description uses.
/// Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Voice { duration: u32 },
    VideoNote { duration: u32 },
    Audio { duration: u32, file_name: Option<String> },
    Document { file_name: Option<String> },
    Photo,
    Video { duration: u32 },
    Animation,
    Sticker,
    /// Anything the bot does not classify (locations, polls, contacts, ...)
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Media {
        kind: MediaKind,
        caption: Option<String>,
    },
}

impl MessageContent {
    /// True when the message carries text, a caption or a supported media kind.
    pub fn is_recognized(&self) -> bool {
        match self {
            MessageContent::Text(text) => !text.trim().is_empty(),
            MessageContent::Media { caption: Some(c), .. } if !c.trim().is_empty() => true,
            MessageContent::Media { kind, .. } => !matches!(kind, MediaKind::Other),
        }
    }
}

/// A message received from the chat platform, stripped of platform types
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub chat_kind: ChatKind,
    pub chat_title: Option<String>,
    pub sender: Option<Sender>,
    pub date: DateTime<Utc>,
    pub content: Option<MessageContent>,
}

/// Sends the fixed-text reply for a processed message.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn reply(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()>;
}

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{MessageId, MessageKind, ReplyParameters};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::pipeline::{Outcome, Pipeline};
use crate::platform::{Acknowledger, ChatKind, InboundMessage, MediaKind, MessageContent, Sender};

/// Replies to the originating message, even if it has since been deleted
pub struct TelegramAcknowledger {
    bot: Bot,
}

impl TelegramAcknowledger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Acknowledger for TelegramAcknowledger {
    async fn reply(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_parameters(
                ReplyParameters::new(MessageId(message_id)).allow_sending_without_reply(),
            )
            .await
            .context("Failed to send Telegram reply")?;
        Ok(())
    }
}

/// Look up the bot's own user id. `None` if Telegram could not be reached.
pub async fn resolve_self_id(bot: &Bot) -> Option<u64> {
    match bot.get_me().await {
        Ok(me) => {
            info!("Bot info: @{} (id={})", me.username(), me.id);
            info!(
                "Bot can join groups: {}; can read all group messages: {}",
                me.can_join_groups, me.can_read_all_group_messages
            );
            Some(me.id.0)
        }
        Err(e) => {
            error!("Failed to get bot info: {}", e);
            None
        }
    }
}

/// Run the Telegram platform until the dispatcher stops
pub async fn run(bot: Bot, pipeline: Arc<Pipeline<TelegramAcknowledger>>) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![pipeline])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    msg: Message,
    pipeline: Arc<Pipeline<TelegramAcknowledger>>,
) -> ResponseResult<()> {
    let inbound = to_inbound(&msg);

    info!(
        "Received message from {} in chat {}",
        msg.from
            .as_ref()
            .and_then(|u| u.username.as_deref())
            .unwrap_or("unknown"),
        inbound.chat_id
    );

    spawn_pipeline(pipeline, inbound);

    Ok(())
}

/// Process one message on its own task. Submissions retry with backoff, so
/// the dispatcher must not wait for them before taking the next update.
pub fn spawn_pipeline<A>(
    pipeline: Arc<Pipeline<A>>,
    inbound: InboundMessage,
) -> JoinHandle<Outcome>
where
    A: Acknowledger + 'static,
{
    tokio::spawn(async move { pipeline.on_message(&inbound).await })
}

/// Convert a teloxide message into the platform-neutral form.
pub fn to_inbound(msg: &Message) -> InboundMessage {
    let chat = &msg.chat;
    let chat_kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_group() {
        ChatKind::Group
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Channel
    };

    InboundMessage {
        chat_id: chat.id.0,
        message_id: msg.id.0,
        chat_kind,
        chat_title: chat.title().map(str::to_string),
        sender: msg.from.as_ref().map(|user| Sender {
            id: user.id.0,
            username: user.username.clone(),
            full_name: user.full_name(),
        }),
        date: msg.date,
        content: content_of(msg),
    }
}

fn content_of(msg: &Message) -> Option<MessageContent> {
    if let Some(text) = msg.text() {
        return Some(MessageContent::Text(text.to_string()));
    }

    // Service messages (joins, pins, title changes, ...) carry no content
    if !matches!(msg.kind, MessageKind::Common(_)) {
        return None;
    }

    let kind = if let Some(voice) = msg.voice() {
        MediaKind::Voice {
            duration: voice.duration.seconds(),
        }
    } else if let Some(note) = msg.video_note() {
        MediaKind::VideoNote {
            duration: note.duration.seconds(),
        }
    } else if let Some(audio) = msg.audio() {
        MediaKind::Audio {
            duration: audio.duration.seconds(),
            file_name: audio.file_name.clone(),
        }
    } else if let Some(document) = msg.document() {
        MediaKind::Document {
            file_name: document.file_name.clone(),
        }
    } else if msg.photo().is_some() {
        MediaKind::Photo
    } else if let Some(video) = msg.video() {
        MediaKind::Video {
            duration: video.duration.seconds(),
        }
    } else if msg.animation().is_some() {
        MediaKind::Animation
    } else if msg.sticker().is_some() {
        MediaKind::Sticker
    } else {
        MediaKind::Other
    };

    Some(MessageContent::Media {
        kind,
        caption: msg.caption().map(str::to_string),
    })
}

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::platform::InboundMessage;

/// Why a message was not turned into a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAGroup,
    ChatNotAllowed,
    OwnMessage,
    NoContent,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAGroup => write!(f, "not a group chat"),
            Rejection::ChatNotAllowed => write!(f, "chat is not in the allow-list"),
            Rejection::OwnMessage => write!(f, "message was sent by the bot itself"),
            Rejection::NoContent => write!(f, "no recognized content"),
        }
    }
}

/// Run the eligibility rules in order and return the first one that fails.
///
/// `self_id` is the bot's own user id; `None` disables the self-message guard.
/// An empty `allowed_chat_ids` admits every group.
pub fn check(
    msg: &InboundMessage,
    self_id: Option<u64>,
    allowed_chat_ids: &HashSet<i64>,
) -> Result<(), Rejection> {
    if !msg.chat_kind.is_group() {
        return Err(Rejection::NotAGroup);
    }

    if !allowed_chat_ids.is_empty() && !allowed_chat_ids.contains(&msg.chat_id) {
        return Err(Rejection::ChatNotAllowed);
    }

    if let (Some(sender), Some(self_id)) = (&msg.sender, self_id) {
        if sender.id == self_id {
            return Err(Rejection::OwnMessage);
        }
    }

    match &msg.content {
        Some(content) if content.is_recognized() => Ok(()),
        _ => Err(Rejection::NoContent),
    }
}

/// Whether `msg` should become a task. Rejections are logged at debug level.
pub fn should_process(
    msg: &InboundMessage,
    self_id: Option<u64>,
    allowed_chat_ids: &HashSet<i64>,
) -> bool {
    match check(msg, self_id, allowed_chat_ids) {
        Ok(()) => true,
        Err(reason) => {
            debug!(
                "Skipping message {} in chat {}: {}",
                msg.message_id, msg.chat_id, reason
            );
            false
        }
    }
}

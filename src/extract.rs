use crate::platform::{InboundMessage, MediaKind, MessageContent};

/// Title candidate and description derived from a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title_source: String,
    pub description: String,
}

/// Derive task text from a message.
///
/// Text and captions are used as-is (trimmed) for both fields. Media without
/// a caption gets a synthesized title and a `key: value` description block.
pub fn extract(msg: &InboundMessage) -> ExtractedContent {
    let unknown = MediaKind::Other;
    let kind = match &msg.content {
        Some(MessageContent::Text(text)) if !text.trim().is_empty() => {
            return ExtractedContent::same(text.trim());
        }
        Some(MessageContent::Media {
            caption: Some(caption),
            ..
        }) if !caption.trim().is_empty() => {
            return ExtractedContent::same(caption.trim());
        }
        Some(MessageContent::Media { kind, .. }) => kind,
        Some(MessageContent::Text(_)) | None => &unknown,
    };

    let label = media_label(kind);
    let sender = msg
        .sender
        .as_ref()
        .and_then(|s| s.label())
        .unwrap_or("Unknown");

    let description = [
        format!("From: {}", sender),
        format!("Type: {}", label),
        format!("Chat: {}", msg.chat_title.as_deref().unwrap_or("Unknown")),
        format!("Time: {}", msg.date),
    ]
    .join("\n");

    ExtractedContent {
        title_source: format!("Message from {}: {}", sender, label),
        description,
    }
}

impl ExtractedContent {
    fn same(text: &str) -> Self {
        Self {
            title_source: text.to_string(),
            description: text.to_string(),
        }
    }
}

/// Short human-readable label for a media kind.
pub fn media_label(kind: &MediaKind) -> String {
    match kind {
        MediaKind::Voice { duration } => format!("Voice message ({}s)", duration),
        MediaKind::VideoNote { duration } => format!("Video note ({}s)", duration),
        MediaKind::Audio {
            duration,
            file_name,
        } => format!(
            "Audio ({}s) — {}",
            duration,
            file_name.as_deref().unwrap_or("unnamed")
        ),
        MediaKind::Document { file_name } => {
            format!("Document: {}", file_name.as_deref().unwrap_or("unnamed"))
        }
        MediaKind::Photo => "Photo".to_string(),
        MediaKind::Video { duration } => format!("Video ({}s)", duration),
        MediaKind::Animation => "Animation (GIF)".to_string(),
        MediaKind::Sticker => "Sticker".to_string(),
        MediaKind::Other => "Unknown content".to_string(),
    }
}

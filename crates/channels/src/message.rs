use crate::kind::ChannelKind;

/// Kind of attachment as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Document,
    Audio,
    Video,
}

/// A file carried by an inbound message.
///
/// Exactly one of `url` / `data` is expected to resolve to content; both
/// absent is a validation failure, not a transport error.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Platform-specific file reference.
    pub file_id: String,
    pub file_name: Option<String>,
    /// Declared size in bytes, when the platform reports one.
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    /// Remote URL the content can be fetched from.
    pub url: Option<String>,
    /// Inline content, when the transport already downloaded it.
    pub data: Option<Vec<u8>>,
}

/// A normalized message received from a platform.
///
/// Transient: constructed once per receipt and never persisted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel: ChannelKind,
    /// Platform chat identifier the message arrived on.
    pub chat_id: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
    /// Opaque platform payload, kept for diagnostics only.
    pub raw: serde_json::Value,
}

/// Content type recorded on a submitted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Url,
    Image,
    Audio,
    Video,
    File,
}

impl ContentType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Url => "url",
            ContentType::Image => "image",
            ContentType::Audio => "audio",
            ContentType::Video => "video",
            ContentType::File => "file",
        }
    }
}

impl InboundMessage {
    /// Infer the item content type: the first attachment wins, then an
    /// `http` prefix marks a URL, everything else is plain text.
    #[must_use]
    pub fn infer_content_type(&self) -> ContentType {
        if let Some(first) = self.attachments.first() {
            return match first.kind {
                AttachmentKind::Photo => ContentType::Image,
                AttachmentKind::Audio => ContentType::Audio,
                AttachmentKind::Video => ContentType::Video,
                AttachmentKind::Document => ContentType::File,
            };
        }
        if self.content.trim().starts_with("http") {
            ContentType::Url
        } else {
            ContentType::Text
        }
    }
}

/// Content of an outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageInput {
    Text { text: String },
    Media(MediaInput),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Audio,
}

impl MediaKind {
    /// Tag used in the host's message input map.
    pub fn as_tag(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "document" => Some(MediaKind::Document),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    /// Required MIME top-level type, if the kind restricts it.
    pub fn mime_top_level(self) -> Option<&'static str> {
        match self {
            MediaKind::Image => Some("image"),
            MediaKind::Video => Some("video"),
            MediaKind::Audio => Some("audio"),
            MediaKind::Document => None,
        }
    }
}

/// A media attachment referenced by URI (the engine does the upload).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaInput {
    pub kind: MediaKind,
    pub uri: String,
    pub mime_type: String,
    pub file_name: Option<String>,
    /// Audio only.
    pub duration_ms: Option<u64>,
}

/// Failure reported by the messaging engine.
///
/// `kind` is machine readable and forwarded to the host verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct MessagingError {
    pub kind: String,
    pub message: String,
}

impl MessagingError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

pub type MessagingResult<T> = std::result::Result<T, MessagingError>;

//! Message transport boundary
//!
//! Inbound events arrive from the messaging gateway; outbound texts and media
//! leave through a [`Transport`]. The protocol client itself is external.

mod webhook;

pub use webhook::{LogTransport, WebhookTransport};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send to {recipient} failed: {reason}")]
    Send { recipient: String, reason: String },
    #[error("Media download failed: {0}")]
    Download(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Kind of media carried by a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Attachment as delivered by the gateway: either a URL to fetch or inline base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub mime_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl MediaAttachment {
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            url: None,
            data: Some(BASE64.encode(bytes)),
        }
    }

    #[allow(dead_code)] // Constructor for API completeness
    pub fn remote(mime_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            url: Some(url.into()),
            data: None,
        }
    }

    /// Decode the inline payload, if any
    pub fn inline_bytes(&self) -> Option<TransportResult<Vec<u8>>> {
        self.data.as_ref().map(|data| {
            BASE64
                .decode(data.trim())
                .map_err(|e| TransportError::Download(format!("invalid base64 payload: {e}")))
        })
    }
}

/// An attachment together with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: MediaKind,
    pub media: MediaAttachment,
}

/// Inbound message event
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InboundMessage {
    /// Sender identifier (`+62...` or `62...@s.whatsapp.net`)
    pub sender: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Extended or quoted text, used when the plain body is empty
    #[serde(default)]
    pub quoted_text: Option<String>,
    #[serde(default)]
    pub image: Option<MediaAttachment>,
    #[serde(default)]
    pub video: Option<MediaAttachment>,
    /// Echo of a message this account sent itself
    #[serde(default)]
    pub from_me: bool,
}

impl InboundMessage {
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn image(sender: impl Into<String>, image: MediaAttachment) -> Self {
        Self {
            sender: sender.into(),
            image: Some(image),
            ..Self::default()
        }
    }

    pub fn video(sender: impl Into<String>, video: MediaAttachment) -> Self {
        Self {
            sender: sender.into(),
            video: Some(video),
            ..Self::default()
        }
    }

    /// The attachment, preferring video like the gateway does
    pub fn attachment(&self) -> Option<Attachment> {
        if let Some(video) = &self.video {
            return Some(Attachment {
                kind: MediaKind::Video,
                media: video.clone(),
            });
        }
        self.image.as_ref().map(|image| Attachment {
            kind: MediaKind::Image,
            media: image.clone(),
        })
    }
}

/// Binary media resolved from storage, ready to send
#[derive(Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPayload")
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Outbound send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        to: String,
        text: String,
    },
    Media {
        to: String,
        payload: MediaPayload,
        caption: String,
    },
}

impl OutboundMessage {
    pub fn text(to: impl Into<String>, text: impl Into<String>) -> Self {
        OutboundMessage::Text {
            to: to.into(),
            text: text.into(),
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            OutboundMessage::Text { to, .. } | OutboundMessage::Media { to, .. } => to,
        }
    }

    /// Text body or media caption
    pub fn body(&self) -> &str {
        match self {
            OutboundMessage::Text { text, .. } => text,
            OutboundMessage::Media { caption, .. } => caption,
        }
    }
}

/// Outbound side of the messaging channel
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> TransportResult<()>;

    /// Fetch the bytes of an inbound attachment
    async fn download(&self, attachment: &MediaAttachment) -> TransportResult<Vec<u8>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, message: &OutboundMessage) -> TransportResult<()> {
        (**self).send(message).await
    }

    async fn download(&self, attachment: &MediaAttachment) -> TransportResult<Vec<u8>> {
        (**self).download(attachment).await
    }
}

/// Canonical `+<digits>` form of a sender identifier
pub fn normalize_phone(raw: &str) -> String {
    let local = raw.split('@').next().unwrap_or(raw);
    // Device suffixes look like `62812:3`
    let local = local.split(':').next().unwrap_or(local).trim();
    if local.starts_with('+') {
        local.to_string()
    } else {
        format!("+{local}")
    }
}

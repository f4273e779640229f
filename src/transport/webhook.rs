//! Gateway adapters
//!
//! `WebhookTransport` talks to an HTTP messaging gateway; `LogTransport` is
//! the stand-in used when notifications are disabled.

use super::{MediaAttachment, OutboundMessage, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum GatewayMessage<'a> {
    Text {
        to: &'a str,
        text: &'a str,
    },
    Image {
        to: &'a str,
        caption: &'a str,
        file_name: &'a str,
        mime_type: &'a str,
        data: String,
    },
    Video {
        to: &'a str,
        caption: &'a str,
        file_name: &'a str,
        mime_type: &'a str,
        data: String,
    },
}

impl<'a> GatewayMessage<'a> {
    fn from_outbound(message: &'a OutboundMessage) -> Self {
        match message {
            OutboundMessage::Text { to, text } => GatewayMessage::Text { to, text },
            OutboundMessage::Media {
                to,
                payload,
                caption,
            } => {
                let data = BASE64.encode(&payload.data);
                match payload.kind {
                    super::MediaKind::Image => GatewayMessage::Image {
                        to,
                        caption,
                        file_name: &payload.file_name,
                        mime_type: &payload.mime_type,
                        data,
                    },
                    super::MediaKind::Video => GatewayMessage::Video {
                        to,
                        caption,
                        file_name: &payload.file_name,
                        mime_type: &payload.mime_type,
                        data,
                    },
                }
            }
        }
    }
}

/// HTTP messaging gateway client
pub struct WebhookTransport {
    client: reqwest::Client,
    base_url: String,
}

impl WebhookTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Send {
                recipient: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, message: &OutboundMessage) -> TransportResult<()> {
        let recipient = message.recipient().to_string();
        let body = GatewayMessage::from_outbound(message);
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Send {
                recipient: recipient.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Send {
                recipient,
                reason: format!("gateway returned {}", response.status()),
            });
        }
        Ok(())
    }

    async fn download(&self, attachment: &MediaAttachment) -> TransportResult<Vec<u8>> {
        if let Some(inline) = attachment.inline_bytes() {
            return inline;
        }
        let Some(url) = &attachment.url else {
            return Err(TransportError::Download(
                "attachment carries neither data nor url".to_string(),
            ));
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Download(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Transport that only logs outbound traffic
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> TransportResult<()> {
        tracing::info!(
            recipient = %message.recipient(),
            body = %message.body(),
            "Outbound message (notifications disabled)"
        );
        Ok(())
    }

    async fn download(&self, attachment: &MediaAttachment) -> TransportResult<Vec<u8>> {
        attachment.inline_bytes().unwrap_or_else(|| {
            Err(TransportError::Download(
                "remote attachments need a gateway".to_string(),
            ))
        })
    }
}

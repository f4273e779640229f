//! API request and response types

use crate::runtime::DispatchOutcome;
use serde::Serialize;

/// Response for an inbound webhook delivery
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Bodies of the messages sent back to the sender
    pub replies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<DispatchOutcome> for WebhookResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        Self {
            replies: outcome
                .replies
                .iter()
                .map(|m| m.body().to_string())
                .collect(),
            error: outcome.error.map(|e| e.to_string()),
        }
    }
}

/// Response for health checks
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, WebhookResponse};
use super::AppState;
use crate::playlist::PlaylistSnapshot;
use crate::transport::InboundMessage;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Gateway delivers inbound chat events here
        .route("/webhook/messages", post(receive_message))
        // Display screen polls this to move to the next video
        .route("/api/playlist/current", get(current_video))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

async fn receive_message(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> Result<Json<WebhookResponse>, AppError> {
    if message.sender.trim().is_empty() {
        return Err(AppError::BadRequest("sender is required".to_string()));
    }

    let outcome = state.dispatcher.handle(message).await;
    Ok(Json(outcome.into()))
}

// ============================================================
// Playlist
// ============================================================

async fn current_video(State(state): State<AppState>) -> Result<Json<PlaylistSnapshot>, AppError> {
    let snapshot = state
        .playlist
        .advance()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(snapshot))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

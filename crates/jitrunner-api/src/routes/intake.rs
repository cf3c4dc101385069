//! Webhook intake endpoint.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::signature::{SIGNATURE_HEADER, verify_github_signature};

/// Largest body the queue accepts as one message (SQS: 256 KiB). Larger
/// deliveries are refused with 413 before anything is enqueued.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(receive_webhook))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
}

/// Accept one webhook delivery and enqueue it.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("No body".to_string()));
    }

    let delivery = headers
        .get("X-GitHub-Delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    if let Some(secret) = &state.webhook_secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_github_signature(secret, &body, signature) {
            warn!(delivery, "Invalid webhook signature");
            return Err(ApiError::Unauthorized("Invalid signature".to_string()));
        }
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let message = serde_json::to_string(&payload)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize payload: {}", e)))?;

    state.queue.send(&message).await.map_err(|e| {
        error!(delivery, error = %e, "Failed to enqueue webhook");
        ApiError::from(e)
    })?;

    info!(
        delivery,
        event = event_type,
        action = payload.get("action").and_then(|a| a.as_str()),
        "Enqueued webhook"
    );

    Ok(Json(json!({ "message": "OK" })))
}

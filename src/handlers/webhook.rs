//! Processor webhook endpoint.
//!
//! Signature verification runs against the raw body before anything is
//! parsed. Duplicates, out-of-order deliveries, and unknown holds all
//! return 2xx so the processor stops retrying; only an invalid signature
//! or a malformed payload is rejected.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::error::AppError;
use crate::processor::webhook::{self, SIGNATURE_HEADER};

pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !webhook::verify_signature(&state.webhook_secret, &body, signature) {
        tracing::warn!("rejected webhook with invalid signature");
        return Err(AppError::Unauthorized("invalid webhook signature".to_string()));
    }

    let event = webhook::decode_event(&body)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state.coordinator.apply_event(event).await?;

    Ok(Json(json!({ "received": true })))
}

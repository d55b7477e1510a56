//! User-facing payment endpoints, thin wrappers over the coordinator.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::handlers::auth::AuthenticatedUser;

/// `POST /payments/create-intent/:booking_id` — traveler requests (or
/// idempotently re-fetches) the escrow hold for their booking.
pub async fn create_intent(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state.coordinator.request_hold(booking_id, user_id).await?;
    Ok(Json(json!({
        "hold_id": receipt.hold_id,
        "client_secret": receipt.client_secret,
    })))
}

/// `GET /payments/status/:booking_id` — payment summary for either party.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let view = state.coordinator.payment_status(booking_id, user_id).await?;
    Ok(Json(view))
}

/// `POST /payments/release/:booking_id` — host releases a held payment
/// after the experience completed.
pub async fn release(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.coordinator.release(booking_id, user_id).await?;
    Ok(Json(json!({
        "released": true,
        "transaction_id": tx.id,
        "amount": tx.amount,
    })))
}

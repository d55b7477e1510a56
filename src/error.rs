use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::ports::{GatewayError, LedgerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Payment processor is not configured")]
    NotConfigured,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment required again: {0}")]
    PaymentRequired(String),

    #[error("Payment processor unavailable: {0}")]
    ProcessorUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotConfigured => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::ProcessorUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Transient failures are safe to retry with the same idempotency key.
    fn retryable(&self) -> bool {
        matches!(self, AppError::ProcessorUnavailable(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Conflict(msg) => AppError::Conflict(msg),
            LedgerError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            LedgerError::NotFound(msg) => AppError::NotFound(msg),
            LedgerError::Storage(msg) => AppError::Internal(msg),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured => AppError::NotConfigured,
            GatewayError::Transient(msg) => AppError::ProcessorUnavailable(msg),
            GatewayError::Declined(msg) => AppError::PaymentRequired(msg),
            GatewayError::InvalidResponse(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.retryable(),
        }));

        (status, body).into_response()
    }
}

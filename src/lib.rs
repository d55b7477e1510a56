pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ports;
pub mod processor;
pub mod services;
pub mod startup;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::services::EscrowCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<EscrowCoordinator>,
    /// Present when running against Postgres; None for the in-memory
    /// adapters.
    pub db: Option<sqlx::PgPool>,
    pub webhook_secret: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/payments/create-intent/:booking_id",
            post(handlers::payments::create_intent),
        )
        .route(
            "/payments/status/:booking_id",
            get(handlers::payments::payment_status),
        )
        .route(
            "/payments/release/:booking_id",
            post(handlers::payments::release),
        )
        .route("/payments/webhook", post(handlers::webhook::receive))
        .with_state(state)
}

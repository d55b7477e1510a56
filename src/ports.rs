//! Ports: the trait seams between the escrow coordinator and its
//! collaborators. Postgres adapters live in `adapters::postgres`, in-memory
//! ones in `adapters::memory`, and the processor client in
//! `processor::client`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Booking, PaymentStatus, Transaction, TransactionStatus, Wallet};

#[derive(Error, Debug)]
pub enum LedgerError {
    /// The at-most-one-active-hold invariant would be violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Guarded CAS failed: the stored status no longer matches `from`.
    #[error("Invalid transition: transaction {id} is not in state {expected}")]
    InvalidTransition { id: Uuid, expected: TransactionStatus },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Append-only record of payment attempts. The coordinator is the only
/// writer.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// The transaction in {pending, held} for a booking, if any.
    async fn find_active(&self, booking_id: Uuid) -> LedgerResult<Option<Transaction>>;

    async fn find_by_hold_id(&self, hold_id: &str) -> LedgerResult<Option<Transaction>>;

    async fn get(&self, id: Uuid) -> LedgerResult<Transaction>;

    /// Inserts a new pending transaction. Fails with `Conflict` if an active
    /// one already exists for the booking; existence check and insert are a
    /// single atomic step against the store.
    async fn create(&self, tx: Transaction) -> LedgerResult<Transaction>;

    /// Guarded compare-and-swap on status. Fails with `InvalidTransition`
    /// when the stored status differs from `from` at write time.
    async fn transition(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> LedgerResult<Transaction>;
}

/// Read access to bookings plus the one field the coordinator owns.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, id: Uuid) -> LedgerResult<Booking>;

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> LedgerResult<()>;
}

/// Per-host running balance, credited only on release.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    /// Increments the balance, creating the wallet row if absent.
    async fn credit(&self, user_id: Uuid, amount: &BigDecimal) -> LedgerResult<Wallet>;

    async fn balance(&self, user_id: Uuid) -> LedgerResult<BigDecimal>;
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payment processor is not configured")]
    NotConfigured,

    /// Network failure, timeout, or 5xx. Safe to retry with the same
    /// idempotency key; no local state has changed.
    #[error("transient processor error: {0}")]
    Transient(String),

    /// The processor rejected the operation permanently (declined card,
    /// expired hold).
    #[error("processor declined: {0}")]
    Declined(String),

    #[error("invalid processor response: {0}")]
    InvalidResponse(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Client-facing reference to a processor hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldReceipt {
    pub hold_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldState {
    RequiresConfirmation,
    Confirmed,
    Captured,
    Cancelled,
    Refunded,
    Failed,
}

/// The remote payment processor. Holds are created in manual-capture mode:
/// funds are authorized but not captured, which is what makes escrow
/// possible.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_hold(
        &self,
        amount: &BigDecimal,
        currency: &str,
        booking_id: Uuid,
    ) -> GatewayResult<HoldReceipt>;

    async fn capture_hold(&self, hold_id: &str) -> GatewayResult<()>;

    /// Releases an uncaptured authorization.
    async fn cancel_hold(&self, hold_id: &str) -> GatewayResult<()>;

    /// Reverses an already-captured charge.
    async fn refund(&self, hold_id: &str) -> GatewayResult<()>;

    /// Idempotent retrieval, used to hand an existing hold's reference back
    /// to a retrying client and for reconciliation.
    async fn retrieve_hold(&self, hold_id: &str) -> GatewayResult<(HoldReceipt, HoldState)>;
}

/// Gateway used when the processor is unconfigured. Fails fast with a
/// configuration error on every call instead of null-checking at call sites.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_hold(
        &self,
        _amount: &BigDecimal,
        _currency: &str,
        _booking_id: Uuid,
    ) -> GatewayResult<HoldReceipt> {
        Err(GatewayError::NotConfigured)
    }

    async fn capture_hold(&self, _hold_id: &str) -> GatewayResult<()> {
        Err(GatewayError::NotConfigured)
    }

    async fn cancel_hold(&self, _hold_id: &str) -> GatewayResult<()> {
        Err(GatewayError::NotConfigured)
    }

    async fn refund(&self, _hold_id: &str) -> GatewayResult<()> {
        Err(GatewayError::NotConfigured)
    }

    async fn retrieve_hold(&self, _hold_id: &str) -> GatewayResult<(HoldReceipt, HoldState)> {
        Err(GatewayError::NotConfigured)
    }
}

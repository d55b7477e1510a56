//! Transaction domain entity: one payment attempt for one booking.
//!
//! Rows are append-only; status moves only through the closed transition
//! table below, enforced as a compare-and-swap at the storage layer.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Held,
    Released,
    Refunded,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Held => "held",
            TransactionStatus::Released => "released",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "held" => Some(TransactionStatus::Held),
            "released" => Some(TransactionStatus::Released),
            "refunded" => Some(TransactionStatus::Refunded),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// A transaction in an active state holds (or is about to hold) funds,
    /// and blocks the creation of a second one for the same booking.
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Held)
    }

    /// The closed transition table: pending→held, pending→failed,
    /// held→released, held→refunded, pending→refunded.
    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, to),
            (Pending, Held)
                | (Pending, Failed)
                | (Pending, Refunded)
                | (Held, Released)
                | (Held, Refunded)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    /// Set once the processor has acknowledged the hold request. Nullable in
    /// the schema for repair scenarios, always present in practice.
    pub processor_hold_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        booking_id: Uuid,
        payer_id: Uuid,
        amount: BigDecimal,
        currency: String,
        processor_hold_id: String,
        description: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            payer_id,
            amount,
            currency,
            status: TransactionStatus::Pending,
            processor_hold_id: Some(processor_hold_id),
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

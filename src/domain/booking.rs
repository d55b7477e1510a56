//! Booking domain entity.
//! Bookings are created and status-managed by the match service; the
//! coordinator only reads them and owns the `payment_status` field.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "accepted" => Some(BookingStatus::Accepted),
            "rejected" => Some(BookingStatus::Rejected),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

/// Denormalized payment summary on the booking row. The coordinator is the
/// only writer; the rest of the system reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    None,
    Pending,
    Held,
    Released,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::None => "none",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Held => "held",
            PaymentStatus::Released => "released",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(PaymentStatus::None),
            "pending" => Some(PaymentStatus::Pending),
            "held" => Some(PaymentStatus::Held),
            "released" => Some(PaymentStatus::Released),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub experience_id: Uuid,
    pub traveler_id: Uuid,
    pub host_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Price agreed for the experience. None for free experiences, which
    /// never enter the payment flow.
    pub price: Option<BigDecimal>,
    pub currency: String,
    pub agreed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// A hold can only be placed against a priced booking.
    pub fn payable_amount(&self) -> Option<&BigDecimal> {
        self.price
            .as_ref()
            .filter(|p| **p > BigDecimal::from(0))
    }
}

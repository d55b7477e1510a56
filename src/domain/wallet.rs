//! Host wallet: a single running balance, credited only by escrow release.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

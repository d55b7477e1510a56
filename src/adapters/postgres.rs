//! Postgres implementations of the ledger ports.
//!
//! The two correctness mechanisms live here, in the store, not in
//! application code: a partial unique index enforces at-most-one active
//! transaction per booking, and status transitions are conditional updates
//! (`... WHERE id = $1 AND status = $2`) so a lost race surfaces as zero
//! rows updated rather than a silent overwrite.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingStatus, PaymentStatus, Transaction, TransactionStatus, Wallet,
};
use crate::ports::{
    BookingStore, LedgerError, LedgerResult, TransactionLedger, WalletLedger,
};

const ACTIVE_HOLD_INDEX: &str = "transactions_one_active_per_booking";

#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionLedger for PostgresLedger {
    async fn find_active(&self, booking_id: Uuid) -> LedgerResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE booking_id = $1 AND status IN ('pending', 'held')",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn find_by_hold_id(&self, hold_id: &str) -> LedgerResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE processor_hold_id = $1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(hold_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn get(&self, id: Uuid) -> LedgerResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TransactionRow::into_domain)
            .transpose()?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))
    }

    async fn create(&self, tx: Transaction) -> LedgerResult<Transaction> {
        let result = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, booking_id, payer_id, amount, currency, status,
                processor_hold_id, description, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.booking_id)
        .bind(tx.payer_id)
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(tx.status.as_str())
        .bind(&tx.processor_hold_id)
        .bind(&tx.description)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.into_domain(),
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(ACTIVE_HOLD_INDEX) => {
                Err(LedgerError::Conflict(format!(
                    "booking {} already has an active transaction",
                    tx.booking_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> LedgerResult<Transaction> {
        if !from.can_transition_to(to) {
            return Err(LedgerError::InvalidTransition { id, expected: from });
        }

        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(LedgerError::InvalidTransition { id, expected: from }),
        }
    }
}

#[derive(Clone)]
pub struct PostgresBookings {
    pool: PgPool,
}

impl PostgresBookings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PostgresBookings {
    async fn get(&self, id: Uuid) -> LedgerResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(BookingRow::into_domain)
            .transpose()?
            .ok_or_else(|| LedgerError::NotFound(format!("booking {id}")))
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("booking {id}")));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresWallets {
    pool: PgPool,
}

impl PostgresWallets {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletLedger for PostgresWallets {
    async fn credit(&self, user_id: Uuid, amount: &BigDecimal) -> LedgerResult<Wallet> {
        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            INSERT INTO wallets (user_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET balance = wallets.balance + EXCLUDED.balance, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }

    async fn balance(&self, user_id: Uuid) -> LedgerResult<BigDecimal> {
        let balance: Option<BigDecimal> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance.unwrap_or_else(|| BigDecimal::from(0)))
    }
}

/// Internal row types for sqlx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    booking_id: Uuid,
    payer_id: Uuid,
    amount: BigDecimal,
    currency: String,
    status: String,
    processor_hold_id: Option<String>,
    description: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> LedgerResult<Transaction> {
        let status = TransactionStatus::parse(&self.status).ok_or_else(|| {
            LedgerError::Storage(format!("unknown transaction status '{}'", self.status))
        })?;

        Ok(Transaction {
            id: self.id,
            booking_id: self.booking_id,
            payer_id: self.payer_id,
            amount: self.amount,
            currency: self.currency,
            status,
            processor_hold_id: self.processor_hold_id,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    experience_id: Uuid,
    traveler_id: Uuid,
    host_id: Uuid,
    status: String,
    payment_status: String,
    price: Option<BigDecimal>,
    currency: String,
    agreed_date: Option<chrono::NaiveDate>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl BookingRow {
    fn into_domain(self) -> LedgerResult<Booking> {
        let status = BookingStatus::parse(&self.status).ok_or_else(|| {
            LedgerError::Storage(format!("unknown booking status '{}'", self.status))
        })?;
        let payment_status = PaymentStatus::parse(&self.payment_status).ok_or_else(|| {
            LedgerError::Storage(format!("unknown payment status '{}'", self.payment_status))
        })?;

        Ok(Booking {
            id: self.id,
            experience_id: self.experience_id,
            traveler_id: self.traveler_id,
            host_id: self.host_id,
            status,
            payment_status,
            price: self.price,
            currency: self.currency,
            agreed_date: self.agreed_date,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    user_id: Uuid,
    balance: BigDecimal,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl WalletRow {
    fn into_domain(self) -> Wallet {
        Wallet {
            user_id: self.user_id,
            balance: self.balance,
            updated_at: self.updated_at,
        }
    }
}

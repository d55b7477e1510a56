//! In-memory implementations of the ledger ports.
//!
//! Semantics mirror the Postgres adapters: the active-hold existence check
//! and the insert happen under a single lock, and transitions are
//! compare-and-swap on the stored status. Used by the test suites and for
//! running the service without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingStatus, PaymentStatus, Transaction, TransactionStatus, Wallet,
};
use crate::ports::{
    BookingStore, LedgerError, LedgerResult, TransactionLedger, WalletLedger,
};

#[derive(Default)]
pub struct InMemoryLedger {
    transactions: Mutex<HashMap<Uuid, Transaction>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionLedger for InMemoryLedger {
    async fn find_active(&self, booking_id: Uuid) -> LedgerResult<Option<Transaction>> {
        let map = self.transactions.lock().unwrap();
        Ok(map
            .values()
            .find(|t| t.booking_id == booking_id && t.status.is_active())
            .cloned())
    }

    async fn find_by_hold_id(&self, hold_id: &str) -> LedgerResult<Option<Transaction>> {
        let map = self.transactions.lock().unwrap();
        Ok(map
            .values()
            .filter(|t| t.processor_hold_id.as_deref() == Some(hold_id))
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> LedgerResult<Transaction> {
        let map = self.transactions.lock().unwrap();
        map.get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))
    }

    async fn create(&self, tx: Transaction) -> LedgerResult<Transaction> {
        // Existence check and insert under one lock, like the partial
        // unique index in Postgres.
        let mut map = self.transactions.lock().unwrap();
        if map
            .values()
            .any(|t| t.booking_id == tx.booking_id && t.status.is_active())
        {
            return Err(LedgerError::Conflict(format!(
                "booking {} already has an active transaction",
                tx.booking_id
            )));
        }
        map.insert(tx.id, tx.clone());
        Ok(tx)
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

        let mut map = self.transactions.lock().unwrap();
        let tx = map
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;

        if tx.status != from {
            return Err(LedgerError::InvalidTransition { id, expected: from });
        }
        tx.status = to;
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }
}

#[derive(Default)]
pub struct InMemoryBookings {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl InMemoryBookings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a booking, standing in for the out-of-scope match service.
    pub fn insert(&self, booking: Booking) {
        self.bookings.lock().unwrap().insert(booking.id, booking);
    }

    /// Mutates the booking lifecycle status, as the match service would on
    /// accept/cancel/complete.
    pub fn set_status(&self, id: Uuid, status: BookingStatus) {
        if let Some(b) = self.bookings.lock().unwrap().get_mut(&id) {
            b.status = status;
        }
    }
}

#[async_trait]
impl BookingStore for InMemoryBookings {
    async fn get(&self, id: Uuid) -> LedgerResult<Booking> {
        self.bookings
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("booking {id}")))
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> LedgerResult<()> {
        let mut map = self.bookings.lock().unwrap();
        let booking = map
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("booking {id}")))?;
        booking.payment_status = status;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWallets {
    wallets: Mutex<HashMap<Uuid, Wallet>>,
}

impl InMemoryWallets {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletLedger for InMemoryWallets {
    async fn credit(&self, user_id: Uuid, amount: &BigDecimal) -> LedgerResult<Wallet> {
        let mut map = self.wallets.lock().unwrap();
        let wallet = map.entry(user_id).or_insert_with(|| Wallet {
            user_id,
            balance: BigDecimal::from(0),
            updated_at: Utc::now(),
        });
        wallet.balance = &wallet.balance + amount;
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }

    async fn balance(&self, user_id: Uuid) -> LedgerResult<BigDecimal> {
        let map = self.wallets.lock().unwrap();
        Ok(map
            .get(&user_id)
            .map(|w| w.balance.clone())
            .unwrap_or_else(|| BigDecimal::from(0)))
    }
}

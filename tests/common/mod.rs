//! Shared test fixtures: a scriptable processor gateway and a pre-wired
//! coordinator over the in-memory adapters.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::str::FromStr;
use tokio::sync::Barrier;
use uuid::Uuid;

use wanderpay::AppState;
use wanderpay::adapters::memory::{InMemoryBookings, InMemoryLedger, InMemoryWallets};
use wanderpay::domain::{Booking, BookingStatus, PaymentStatus};
use wanderpay::ports::{
    GatewayError, GatewayResult, HoldReceipt, HoldState, PaymentGateway,
};
use wanderpay::processor::webhook::{ProcessorEvent, WebhookEvent};
use wanderpay::services::EscrowCoordinator;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

#[derive(Default)]
pub struct GatewayLog {
    pub created: Vec<String>,
    pub captured: Vec<String>,
    pub cancelled: Vec<String>,
    pub refunded: Vec<String>,
    next_hold: u32,
    fail_create: Option<&'static str>,
}

/// In-process stand-in for the remote processor. Records every call and can
/// be scripted to decline the next hold creation or to rendezvous capture
/// calls on a barrier.
pub struct MockGateway {
    pub log: Mutex<GatewayLog>,
    collapse_by_booking: bool,
    capture_barrier: Option<Arc<Barrier>>,
    create_barrier: Option<Arc<Barrier>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(GatewayLog::default()),
            collapse_by_booking: false,
            capture_barrier: None,
            create_barrier: None,
        }
    }

    /// Makes every `capture_hold` call wait until `parties` callers have
    /// arrived, so racing releases both read the held status first.
    pub fn with_capture_barrier(parties: usize) -> Self {
        Self {
            log: Mutex::new(GatewayLog::default()),
            collapse_by_booking: false,
            capture_barrier: Some(Arc::new(Barrier::new(parties))),
            create_barrier: None,
        }
    }

    /// Processor-side idempotency: every `create_hold` for the same booking
    /// returns the same hold, and all `parties` callers rendezvous inside
    /// `create_hold` so none of them can insert its transaction first.
    pub fn idempotent_with_create_barrier(parties: usize) -> Self {
        Self {
            log: Mutex::new(GatewayLog::default()),
            collapse_by_booking: true,
            capture_barrier: None,
            create_barrier: Some(Arc::new(Barrier::new(parties))),
        }
    }

    pub fn decline_next_create(&self, reason: &'static str) {
        self.log.lock().unwrap().fail_create = Some(reason);
    }

    pub fn captured_count(&self) -> usize {
        self.log.lock().unwrap().captured.len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_hold(
        &self,
        _amount: &BigDecimal,
        _currency: &str,
        booking_id: Uuid,
    ) -> GatewayResult<HoldReceipt> {
        if let Some(barrier) = &self.create_barrier {
            barrier.wait().await;
        }
        let mut log = self.log.lock().unwrap();
        if let Some(reason) = log.fail_create.take() {
            return Err(GatewayError::Declined(reason.to_string()));
        }
        let hold_id = if self.collapse_by_booking {
            format!("hold_for_{booking_id}")
        } else {
            log.next_hold += 1;
            format!("hold_{}", log.next_hold)
        };
        log.created.push(hold_id.clone());
        Ok(HoldReceipt {
            client_secret: format!("cs_for_{hold_id}"),
            hold_id,
        })
    }

    async fn capture_hold(&self, hold_id: &str) -> GatewayResult<()> {
        if let Some(barrier) = &self.capture_barrier {
            barrier.wait().await;
        }
        self.log.lock().unwrap().captured.push(hold_id.to_string());
        Ok(())
    }

    async fn cancel_hold(&self, hold_id: &str) -> GatewayResult<()> {
        self.log.lock().unwrap().cancelled.push(hold_id.to_string());
        Ok(())
    }

    async fn refund(&self, hold_id: &str) -> GatewayResult<()> {
        self.log.lock().unwrap().refunded.push(hold_id.to_string());
        Ok(())
    }

    async fn retrieve_hold(&self, hold_id: &str) -> GatewayResult<(HoldReceipt, HoldState)> {
        Ok((
            HoldReceipt {
                hold_id: hold_id.to_string(),
                client_secret: format!("cs_for_{hold_id}"),
            },
            HoldState::Confirmed,
        ))
    }
}

pub struct World {
    pub coordinator: Arc<EscrowCoordinator>,
    pub ledger: Arc<InMemoryLedger>,
    pub bookings: Arc<InMemoryBookings>,
    pub wallets: Arc<InMemoryWallets>,
    pub gateway: Arc<MockGateway>,
}

impl World {
    pub fn new() -> Self {
        Self::with_gateway(MockGateway::new())
    }

    pub fn with_gateway(gateway: MockGateway) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let bookings = Arc::new(InMemoryBookings::new());
        let wallets = Arc::new(InMemoryWallets::new());
        let gateway = Arc::new(gateway);

        let coordinator = Arc::new(EscrowCoordinator::new(
            ledger.clone(),
            bookings.clone(),
            wallets.clone(),
            gateway.clone(),
        ));

        Self {
            coordinator,
            ledger,
            bookings,
            wallets,
            gateway,
        }
    }

    /// Seeds a pending booking priced at 45.00 USD and returns it.
    pub fn seed_booking(&self) -> Booking {
        let booking = Booking {
            id: Uuid::new_v4(),
            experience_id: Uuid::new_v4(),
            traveler_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::None,
            price: Some(BigDecimal::from_str("45.00").unwrap()),
            currency: "USD".to_string(),
            agreed_date: None,
            created_at: Utc::now(),
        };
        self.bookings.insert(booking.clone());
        booking
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            coordinator: self.coordinator.clone(),
            db: None,
            webhook_secret: WEBHOOK_SECRET.to_string(),
        }
    }
}

pub fn confirmed(hold_id: &str) -> ProcessorEvent {
    ProcessorEvent {
        id: format!("evt_confirm_{hold_id}"),
        event: WebhookEvent::HoldConfirmed {
            hold_id: hold_id.to_string(),
        },
    }
}

pub fn failed(hold_id: &str) -> ProcessorEvent {
    ProcessorEvent {
        id: format!("evt_fail_{hold_id}"),
        event: WebhookEvent::HoldFailed {
            hold_id: hold_id.to_string(),
        },
    }
}

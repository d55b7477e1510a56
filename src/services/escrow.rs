//! The escrow coordinator: the only component that mutates transactions,
//! booking payment status, and wallet balances.
//!
//! Every state-changing operation follows the same discipline: read the
//! current status, issue the external processor call, and only then perform
//! the local write as a compare-and-swap conditioned on the status being
//! unchanged since the read. A failed CAS is a conflict for user actions and
//! a reported-as-success no-op for webhook deliveries.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, PaymentStatus, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::{
    BookingStore, HoldReceipt, LedgerError, PaymentGateway, TransactionLedger, WalletLedger,
};
use crate::processor::webhook::{ProcessorEvent, WebhookEvent};

#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    pub requires_payment: bool,
    pub amount: Option<BigDecimal>,
    pub transaction_status: Option<TransactionStatus>,
    pub booking_payment_status: PaymentStatus,
}

pub struct EscrowCoordinator {
    ledger: Arc<dyn TransactionLedger>,
    bookings: Arc<dyn BookingStore>,
    wallets: Arc<dyn WalletLedger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl EscrowCoordinator {
    pub fn new(
        ledger: Arc<dyn TransactionLedger>,
        bookings: Arc<dyn BookingStore>,
        wallets: Arc<dyn WalletLedger>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            bookings,
            wallets,
            gateway,
        }
    }

    /// Creates (or idempotently re-fetches) the escrow hold for a booking.
    ///
    /// Only the traveler who requested a still-pending, priced booking may
    /// call this. If a transaction is already active, the existing hold's
    /// reference is returned instead of creating a second one.
    pub async fn request_hold(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
    ) -> Result<HoldReceipt, AppError> {
        let booking = self.bookings.get(booking_id).await?;

        if booking.traveler_id != requester_id {
            return Err(AppError::Forbidden(
                "only the requesting traveler may start payment".to_string(),
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(AppError::Conflict(format!(
                "booking is {}, not awaiting payment",
                booking.status.as_str()
            )));
        }
        let amount = booking
            .payable_amount()
            .cloned()
            .ok_or_else(|| {
                AppError::Validation("experience has no price; nothing to hold".to_string())
            })?;

        if let Some(existing) = self.ledger.find_active(booking_id).await? {
            return self.existing_reference(&existing).await;
        }

        let receipt = self
            .gateway
            .create_hold(&amount, &booking.currency, booking_id)
            .await?;

        let tx = Transaction::new(
            booking_id,
            requester_id,
            amount,
            booking.currency.clone(),
            receipt.hold_id.clone(),
            format!("Escrow hold for experience {}", booking.experience_id),
        );

        match self.ledger.create(tx).await {
            Ok(created) => {
                self.bookings
                    .set_payment_status(booking_id, PaymentStatus::Pending)
                    .await?;
                tracing::info!(
                    %booking_id,
                    transaction_id = %created.id,
                    hold_id = %receipt.hold_id,
                    "escrow hold requested"
                );
                Ok(receipt)
            }
            Err(LedgerError::Conflict(_)) => {
                // Lost the race against a concurrent request. Re-read the
                // winner before touching the processor: idempotent hold
                // creation can hand both racers the same hold, and
                // cancelling it would strand the winner's transaction
                // against a dead authorization.
                let winner = self.ledger.find_active(booking_id).await?;
                let winner_hold = winner
                    .as_ref()
                    .and_then(|w| w.processor_hold_id.as_deref());
                if winner_hold != Some(receipt.hold_id.as_str()) {
                    if let Err(e) = self.gateway.cancel_hold(&receipt.hold_id).await {
                        tracing::warn!(hold_id = %receipt.hold_id, error = %e,
                            "failed to cancel superseded hold; reconciliation will pick it up");
                    }
                }
                match winner {
                    Some(winner) => self.existing_reference(&winner).await,
                    None => Err(AppError::Conflict(
                        "concurrent payment attempt; re-read status and retry".to_string(),
                    )),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn existing_reference(&self, tx: &Transaction) -> Result<HoldReceipt, AppError> {
        let hold_id = tx.processor_hold_id.as_deref().ok_or_else(|| {
            AppError::Internal(format!("active transaction {} has no hold id", tx.id))
        })?;
        let (receipt, _state) = self.gateway.retrieve_hold(hold_id).await?;
        Ok(receipt)
    }

    /// Applies a verified processor event. Duplicate and out-of-order
    /// deliveries, and events for unknown holds, are successful no-ops;
    /// the processor must not keep retrying them.
    pub async fn apply_event(&self, event: ProcessorEvent) -> Result<(), AppError> {
        match event.event {
            WebhookEvent::HoldConfirmed { hold_id } => {
                self.reconcile(&event.id, &hold_id, TransactionStatus::Held, PaymentStatus::Held)
                    .await
            }
            WebhookEvent::HoldFailed { hold_id } => {
                self.reconcile(
                    &event.id,
                    &hold_id,
                    TransactionStatus::Failed,
                    PaymentStatus::Failed,
                )
                .await
            }
            WebhookEvent::Unknown { event_type } => {
                tracing::info!(event_id = %event.id, %event_type, "ignoring unhandled event type");
                Ok(())
            }
        }
    }

    async fn reconcile(
        &self,
        event_id: &str,
        hold_id: &str,
        to: TransactionStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), AppError> {
        let Some(tx) = self.ledger.find_by_hold_id(hold_id).await? else {
            tracing::info!(%event_id, %hold_id, "event for unknown hold; ignoring");
            return Ok(());
        };

        match self
            .ledger
            .transition(tx.id, TransactionStatus::Pending, to)
            .await
        {
            Ok(updated) => {
                self.bookings
                    .set_payment_status(updated.booking_id, payment_status)
                    .await?;
                tracing::info!(
                    %event_id,
                    %hold_id,
                    transaction_id = %updated.id,
                    status = updated.status.as_str(),
                    "reconciled processor event"
                );
                Ok(())
            }
            // The guard no longer holds: duplicate delivery, or a failed
            // event arriving after confirmation. At-least-once semantics
            // require reporting success.
            Err(LedgerError::InvalidTransition { .. }) => {
                tracing::debug!(%event_id, %hold_id, "event already reconciled; no-op");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Captures the hold and credits the host. Only valid once the booking
    /// is completed, and only for the booking's host.
    pub async fn release(&self, booking_id: Uuid, host_id: Uuid) -> Result<Transaction, AppError> {
        let booking = self.bookings.get(booking_id).await?;

        if booking.host_id != host_id {
            return Err(AppError::Forbidden(
                "only the host may release an escrow payment".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(AppError::Conflict(format!(
                "booking is {}, funds release requires completion",
                booking.status.as_str()
            )));
        }

        let tx = self
            .ledger
            .find_active(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no active payment for booking {booking_id}")))?;

        if tx.status != TransactionStatus::Held {
            return Err(AppError::Conflict(
                "payment is not yet confirmed by the processor".to_string(),
            ));
        }
        let hold_id = tx.processor_hold_id.clone().ok_or_else(|| {
            AppError::Internal(format!("held transaction {} has no hold id", tx.id))
        })?;

        // External call first; local writes only after it succeeds.
        self.gateway.capture_hold(&hold_id).await?;

        let released = match self
            .ledger
            .transition(tx.id, TransactionStatus::Held, TransactionStatus::Released)
            .await
        {
            Ok(released) => released,
            // A concurrent release or refund won the CAS. The wallet credit
            // belongs to the winner; this caller re-reads and sees the final
            // state.
            Err(LedgerError::InvalidTransition { .. }) => {
                return Err(AppError::Conflict(
                    "payment was released or refunded concurrently".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        self.bookings
            .set_payment_status(booking_id, PaymentStatus::Released)
            .await?;
        let wallet = self.wallets.credit(booking.host_id, &released.amount).await?;
        tracing::info!(
            %booking_id,
            transaction_id = %released.id,
            host_id = %booking.host_id,
            balance = %wallet.balance,
            "escrow released to host wallet"
        );
        Ok(released)
    }

    /// System-initiated refund, invoked when a booking transitions into
    /// rejected or cancelled. A pending hold is cancelled at the processor,
    /// a confirmed one is refunded; either way the transaction terminates
    /// as refunded and the wallet is untouched.
    pub async fn refund(&self, booking_id: Uuid, reason: &str) -> Result<Transaction, AppError> {
        let tx = self.ledger.find_active(booking_id).await?.ok_or_else(|| {
            AppError::Conflict(format!(
                "booking {booking_id} has no refundable transaction"
            ))
        })?;

        let hold_id = tx.processor_hold_id.clone().ok_or_else(|| {
            AppError::Internal(format!("active transaction {} has no hold id", tx.id))
        })?;

        // A hold that was never confirmed is cancelled; a confirmed hold is
        // a true refund of authorized funds.
        match tx.status {
            TransactionStatus::Pending => self.gateway.cancel_hold(&hold_id).await?,
            TransactionStatus::Held => self.gateway.refund(&hold_id).await?,
            other => {
                return Err(AppError::Conflict(format!(
                    "transaction is {}, not refundable",
                    other.as_str()
                )));
            }
        }

        let refunded = match self
            .ledger
            .transition(tx.id, tx.status, TransactionStatus::Refunded)
            .await
        {
            Ok(refunded) => refunded,
            Err(LedgerError::InvalidTransition { .. }) => {
                return Err(AppError::Conflict(
                    "transaction state changed during refund; re-read and retry".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        self.bookings
            .set_payment_status(booking_id, PaymentStatus::Refunded)
            .await?;
        tracing::info!(
            %booking_id,
            transaction_id = %refunded.id,
            %reason,
            "escrow refunded"
        );
        Ok(refunded)
    }

    /// Payment summary for either party of the booking.
    pub async fn payment_status(
        &self,
        booking_id: Uuid,
        caller_id: Uuid,
    ) -> Result<PaymentStatusView, AppError> {
        let booking = self.bookings.get(booking_id).await?;

        if caller_id != booking.traveler_id && caller_id != booking.host_id {
            return Err(AppError::Forbidden(
                "only the traveler or host may view payment status".to_string(),
            ));
        }

        let active = self.ledger.find_active(booking_id).await?;
        Ok(Self::status_view(&booking, active.as_ref()))
    }

    fn status_view(booking: &Booking, active: Option<&Transaction>) -> PaymentStatusView {
        let payable = booking.payable_amount().cloned();
        let requires_payment = booking.status == BookingStatus::Pending
            && payable.is_some()
            && active.is_none()
            && matches!(
                booking.payment_status,
                PaymentStatus::None | PaymentStatus::Failed
            );

        PaymentStatusView {
            requires_payment,
            amount: payable,
            transaction_status: active.map(|t| t.status),
            booking_payment_status: booking.payment_status,
        }
    }
}

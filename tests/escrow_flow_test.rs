//! End-to-end escrow lifecycle scenarios over the in-memory adapters.

mod common;

use bigdecimal::BigDecimal;
use std::str::FromStr;
use uuid::Uuid;

use common::{World, confirmed, failed};
use wanderpay::domain::{BookingStatus, PaymentStatus, TransactionStatus};
use wanderpay::error::AppError;
use wanderpay::ports::{BookingStore, TransactionLedger, WalletLedger};

#[tokio::test]
async fn happy_path_hold_confirm_complete_release() {
    let world = World::new();
    let booking = world.seed_booking();

    // Traveler starts payment.
    let receipt = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    assert_eq!(receipt.hold_id, "hold_1");

    let stored = world.bookings.get(booking.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);

    // Processor confirms the hold via webhook.
    world.coordinator.apply_event(confirmed("hold_1")).await.unwrap();
    let tx = world.ledger.find_active(booking.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Held);
    assert_eq!(
        world.bookings.get(booking.id).await.unwrap().payment_status,
        PaymentStatus::Held
    );

    // Host marks the experience complete, then releases.
    world.bookings.set_status(booking.id, BookingStatus::Completed);
    let released = world
        .coordinator
        .release(booking.id, booking.host_id)
        .await
        .unwrap();
    assert_eq!(released.status, TransactionStatus::Released);

    assert_eq!(
        world.bookings.get(booking.id).await.unwrap().payment_status,
        PaymentStatus::Released
    );
    assert_eq!(
        world.wallets.balance(booking.host_id).await.unwrap(),
        BigDecimal::from_str("45.00").unwrap()
    );
    assert_eq!(world.gateway.log.lock().unwrap().captured, vec!["hold_1"]);
}

#[tokio::test]
async fn request_hold_is_idempotent_while_active() {
    let world = World::new();
    let booking = world.seed_booking();

    let first = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    let second = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();

    assert_eq!(first.hold_id, second.hold_id);
    assert_eq!(world.gateway.log.lock().unwrap().created.len(), 1);
}

#[tokio::test]
async fn only_the_traveler_may_request_a_hold() {
    let world = World::new();
    let booking = world.seed_booking();

    let err = world
        .coordinator
        .request_hold(booking.id, booking.host_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = world
        .coordinator
        .request_hold(booking.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn free_bookings_never_enter_the_payment_flow() {
    let world = World::new();
    let mut booking = world.seed_booking();
    booking.price = None;
    world.bookings.insert(booking.clone());

    let err = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn hold_requires_a_pending_booking() {
    let world = World::new();
    let booking = world.seed_booking();
    world.bookings.set_status(booking.id, BookingStatus::Cancelled);

    let err = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let world = World::new();
    let err = world
        .coordinator
        .request_hold(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn declined_hold_creation_leaves_no_transaction() {
    let world = World::new();
    let booking = world.seed_booking();
    world.gateway.decline_next_create("card declined");

    let err = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentRequired(_)));

    assert!(world.ledger.find_active(booking.id).await.unwrap().is_none());
    assert_eq!(
        world.bookings.get(booking.id).await.unwrap().payment_status,
        PaymentStatus::None
    );
}

#[tokio::test]
async fn cancellation_before_confirmation_cancels_the_authorization() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();

    // Booking cancelled while the hold is still pending.
    let refunded = world
        .coordinator
        .refund(booking.id, "traveler cancelled")
        .await
        .unwrap();
    assert_eq!(refunded.status, TransactionStatus::Refunded);

    let log = world.gateway.log.lock().unwrap();
    assert_eq!(log.cancelled, vec!["hold_1"]);
    assert!(log.refunded.is_empty());
    drop(log);

    assert_eq!(
        world.bookings.get(booking.id).await.unwrap().payment_status,
        PaymentStatus::Refunded
    );
    assert_eq!(
        world.wallets.balance(booking.host_id).await.unwrap(),
        BigDecimal::from(0)
    );
}

#[tokio::test]
async fn refund_after_confirmation_is_a_true_refund() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    world.coordinator.apply_event(confirmed("hold_1")).await.unwrap();

    world
        .coordinator
        .refund(booking.id, "host rejected")
        .await
        .unwrap();

    let log = world.gateway.log.lock().unwrap();
    assert_eq!(log.refunded, vec!["hold_1"]);
    assert!(log.cancelled.is_empty());
}

#[tokio::test]
async fn processor_decline_allows_a_fresh_attempt() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    world.coordinator.apply_event(failed("hold_1")).await.unwrap();

    assert_eq!(
        world.bookings.get(booking.id).await.unwrap().payment_status,
        PaymentStatus::Failed
    );
    assert!(world.ledger.find_active(booking.id).await.unwrap().is_none());

    // Retry creates a brand-new transaction with a new hold.
    let retry = world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    assert_eq!(retry.hold_id, "hold_2");

    let tx = world.ledger.find_active(booking.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.processor_hold_id.as_deref(), Some("hold_2"));
}

#[tokio::test]
async fn release_requires_completion_and_the_host() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    world.coordinator.apply_event(confirmed("hold_1")).await.unwrap();

    // Not completed yet.
    let err = world
        .coordinator
        .release(booking.id, booking.host_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    world.bookings.set_status(booking.id, BookingStatus::Completed);

    // Wrong caller.
    let err = world
        .coordinator
        .release(booking.id, booking.traveler_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn release_requires_a_confirmed_hold() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    world.bookings.set_status(booking.id, BookingStatus::Completed);

    // Still pending at the processor.
    let err = world
        .coordinator
        .release(booking.id, booking.host_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(world.gateway.captured_count(), 0);
}

#[tokio::test]
async fn refund_is_rejected_from_terminal_states() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    world.coordinator.apply_event(confirmed("hold_1")).await.unwrap();
    world.bookings.set_status(booking.id, BookingStatus::Completed);
    world
        .coordinator
        .release(booking.id, booking.host_id)
        .await
        .unwrap();

    // Released funds cannot be clawed back through this path.
    let err = world
        .coordinator
        .refund(booking.id, "too late")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Failed transactions have nothing to refund either.
    let other = world.seed_booking();
    world
        .coordinator
        .request_hold(other.id, other.traveler_id)
        .await
        .unwrap();
    world.coordinator.apply_event(failed("hold_2")).await.unwrap();
    let err = world
        .coordinator
        .refund(other.id, "nothing held")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn second_release_attempt_fails_and_credits_once() {
    let world = World::new();
    let booking = world.seed_booking();

    world
        .coordinator
        .request_hold(booking.id, booking.traveler_id)
        .await
        .unwrap();
    world.coordinator.apply_event(confirmed("hold_1")).await.unwrap();
    world.bookings.set_status(booking.id, BookingStatus::Completed);

    world
        .coordinator
        .release(booking.id, booking.host_id)
        .await
        .unwrap();
    assert!(world
        .coordinator
        .release(booking.id, booking.host_id)
        .await
        .is_err());

    assert_eq!(
        world.wallets.balance(booking.host_id).await.unwrap(),
        BigDecimal::from_str("45.00").unwrap()
    );
}

#[tokio::test]
async fn payment_status_is_visible_to_both_parties_only() {
    let world = World::new();
    let booking = world.seed_booking();

    let view = world
        .coordinator
        .payment_status(booking.id, booking.traveler_id)
        .await
        .unwrap();
    assert!(view.requires_payment);
    assert_eq!(view.amount, Some(BigDecimal::from_str("45.00").unwrap()));

    world
        .coordinator
        .payment_status(booking.id, booking.host_id)
        .await
        .unwrap();

    let err = world
        .coordinator
        .payment_status(booking.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

pub mod booking;
pub mod transaction;
pub mod wallet;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use transaction::{Transaction, TransactionStatus};
pub use wallet::Wallet;

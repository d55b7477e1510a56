pub mod escrow;

pub use escrow::{EscrowCoordinator, PaymentStatusView};

pub mod client;
pub mod webhook;

pub use client::ProcessorClient;
pub use webhook::{decode_event, verify_signature, ProcessorEvent, WebhookEvent};

//! LINE Messaging API: signature checks, webhook parsing and replies

pub mod client;
pub mod signature;
pub mod webhook;

pub use client::{LineClient, ReplySender};
pub use signature::{SIGNATURE_HEADER, compute_signature, verify_line_signature};
pub use webhook::parse_events;

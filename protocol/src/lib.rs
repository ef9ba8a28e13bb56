//! EscrowCore Protocol Messages
//!
//! JSON message types exchanged between marketplace clients and the escrow
//! engine. Every message carries a versioned envelope: `version`,
//! `message_type`, and `timestamp`.

pub mod messages;

pub use messages::*;

//! EscrowCore Common Types
//!
//! This crate contains shared types used across the EscrowCore service,
//! including identifiers, the credits unit, and the transaction state machine.

pub mod identifiers;
pub mod credits;
pub mod transaction;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use credits::*;
pub use transaction::*;
pub use error::*;
pub use time::*;

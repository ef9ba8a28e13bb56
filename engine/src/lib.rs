//! EscrowCore Engine
//!
//! The engine is the sole writer of balances and transaction status. It
//! enforces the escrow state machine, serializes transitions per
//! transaction, and drives the account store and transaction ledger.

pub mod config;
pub mod engine;
pub mod guard;
pub mod metrics;
pub mod service;
pub mod sweeper;

pub use config::EngineConfig;
pub use engine::{EscrowEngine, IntegrityViolation};
pub use service::EscrowService;

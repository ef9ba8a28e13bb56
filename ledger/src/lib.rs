//! EscrowCore Ledger
//!
//! Account store with per-account atomic balance primitives, an append-only
//! audit journal, and the queryable transaction history.

pub mod account;
pub mod balance;
pub mod history;
pub mod journal;
pub mod store;

pub use account::Account;
pub use balance::AccountBalance;
pub use history::TransactionLedger;
pub use journal::{Journal, JournalEntry, JournalKind};
pub use store::AccountStore;

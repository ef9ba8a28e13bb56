//! Core escrow engine implementation.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use escrowcore_common::{
    Credits, EscrowError, Resolution, Result, ServiceId, Transaction, TransactionId,
    TransactionStatus, UserId,
};
use escrowcore_ledger::{AccountBalance, AccountStore, JournalKind, TransactionLedger};

use crate::config::EngineConfig;
use crate::guard::TransitionGuards;
use crate::metrics::{Metrics, SharedMetrics};

/// A buyer whose escrow balance disagrees with the ledger's held rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// The buyer whose balances disagree.
    pub user_id: UserId,
    /// Sum of amounts over the buyer's pending and disputed rows.
    pub ledger_held: Credits,
    /// The escrow balance the account actually carries.
    pub account_escrow: Credits,
}

/// The escrow engine. Sole writer of balances and transaction status.
///
/// Every status transition claims the transaction's guard first, so two
/// transitions on the same row cannot interleave; the loser fails fast with
/// `ConflictRetry`. Balance moves happen before the status write, and the
/// status write only runs once it can no longer fail, so an error at any
/// point leaves prior state intact.
pub struct EscrowEngine {
    /// Configuration.
    config: EngineConfig,
    /// Per-user balances and the audit journal.
    store: Arc<AccountStore>,
    /// Transaction rows and their history.
    ledger: Arc<TransactionLedger>,
    /// In-flight transition markers.
    guards: TransitionGuards,
    /// Operation counters.
    metrics: SharedMetrics,
}

impl EscrowEngine {
    /// Create a new engine with empty state.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: Arc::new(AccountStore::new()),
            ledger: Arc::new(TransactionLedger::new()),
            guards: TransitionGuards::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The account store backing this engine.
    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    /// The transaction ledger backing this engine.
    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    /// Operation metrics.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Ensure the user's account exists and return its balances.
    ///
    /// Idempotent; this is the account-creation path driven by profile sync.
    #[instrument(skip(self), fields(user = %user_id))]
    pub fn sync_profile(&self, user_id: &UserId) -> Result<AccountBalance> {
        if !user_id.is_valid() {
            return Err(self.note_failure(EscrowError::invalid_request(
                "User id must be 1-64 characters of [A-Za-z0-9_:-]",
                Some("user_id"),
            )));
        }

        self.store.ensure_account(user_id);
        self.store.balance(user_id)
    }

    /// Credit a user's available balance from outside the ledger.
    #[instrument(skip(self), fields(user = %user_id, amount = %amount))]
    pub fn deposit(&self, user_id: &UserId, amount: Credits) -> Result<AccountBalance> {
        match self.deposit_inner(user_id, amount) {
            Ok(balance) => {
                self.metrics.deposit_succeeded();
                Ok(balance)
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    /// Commit credits into escrow, creating a pending transaction.
    ///
    /// Returns the new row. If the buyer's funds are short, no row is
    /// created.
    #[instrument(skip(self), fields(buyer = %buyer, provider = %provider, amount = %amount))]
    pub fn commit(
        &self,
        buyer: &UserId,
        provider: &UserId,
        service: Option<ServiceId>,
        amount: Credits,
    ) -> Result<Transaction> {
        match self.commit_inner(buyer, provider, service, amount) {
            Ok(txn) => {
                self.metrics.commit_succeeded();
                Ok(txn)
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    /// Release a pending transaction's escrow to the provider.
    ///
    /// Buyer-only; confirms the service was delivered.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, actor = %actor))]
    pub fn release(&self, transaction_id: TransactionId, actor: &UserId) -> Result<Transaction> {
        match self.release_inner(transaction_id, actor) {
            Ok(txn) => {
                self.metrics.release_succeeded();
                Ok(txn)
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    /// Freeze a pending transaction for arbitration.
    ///
    /// Either participant may dispute. Funds stay held; only `resolve` can
    /// settle the row afterwards.
    #[instrument(skip(self, reason), fields(transaction_id = %transaction_id, actor = %actor))]
    pub fn dispute(
        &self,
        transaction_id: TransactionId,
        actor: &UserId,
        reason: &str,
    ) -> Result<Transaction> {
        match self.dispute_inner(transaction_id, actor, reason) {
            Ok(txn) => {
                self.metrics.dispute_succeeded();
                Ok(txn)
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    /// Cancel a pending transaction and refund the buyer.
    ///
    /// Buyer-only; the sweeper is the other legitimate canceller.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, actor = %actor))]
    pub fn cancel(&self, transaction_id: TransactionId, actor: &UserId) -> Result<Transaction> {
        match self.cancel_inner(transaction_id, actor) {
            Ok(txn) => {
                self.metrics.cancel_succeeded();
                Ok(txn)
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    /// Arbitrate a disputed transaction.
    ///
    /// The caller is trusted to be the platform arbiter; authenticating that
    /// caller is the embedding service's concern.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, resolution = ?resolution))]
    pub fn resolve(
        &self,
        transaction_id: TransactionId,
        resolution: Resolution,
    ) -> Result<Transaction> {
        match self.resolve_inner(transaction_id, resolution) {
            Ok(txn) => {
                self.metrics.resolve_succeeded();
                Ok(txn)
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    /// Fetch one transaction.
    pub fn transaction(&self, transaction_id: TransactionId) -> Result<Transaction> {
        self.ledger
            .get(transaction_id)
            .ok_or(EscrowError::TransactionNotFound(transaction_id))
    }

    /// Transactions where the user is buyer or provider, newest first.
    pub fn list_for_user(
        &self,
        user_id: &UserId,
        status_filter: Option<TransactionStatus>,
    ) -> Vec<Transaction> {
        self.ledger.list_for_user(user_id, status_filter)
    }

    /// Current balances for a user.
    pub fn balances(&self, user_id: &UserId) -> Result<AccountBalance> {
        self.store.balance(user_id)
    }

    /// Cross-check every buyer's escrow balance against the ledger.
    ///
    /// For each buyer, the sum of amounts over pending and disputed rows
    /// must equal the account's escrow balance. Returns the violations;
    /// empty means consistent. Only meaningful at a quiet point.
    pub fn verify_integrity(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        for buyer in self.ledger.buyers() {
            let ledger_held = self.ledger.escrow_held_for(&buyer);
            let account_escrow = self
                .store
                .balance(&buyer)
                .map(|balance| balance.escrow)
                .unwrap_or(Credits::ZERO);

            if ledger_held != account_escrow {
                warn!(
                    user = %buyer,
                    ledger_held = %ledger_held,
                    account_escrow = %account_escrow,
                    "Escrow balance disagrees with ledger"
                );
                violations.push(IntegrityViolation {
                    user_id: buyer,
                    ledger_held,
                    account_escrow,
                });
            }
        }

        violations
    }

    /// Cancel and refund every transaction that has sat in `pending` longer
    /// than the configured timeout. Returns how many were cancelled.
    ///
    /// Rows that are mid-transition or already moved on are skipped; the
    /// next pass picks up anything still stale.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self) -> usize {
        let timeout = chrono::Duration::from_std(self.config.sweep.pending_timeout)
            .unwrap_or_else(|_| escrowcore_common::constants::default_pending_timeout());
        let cutoff = escrowcore_common::now() - timeout;

        let stale = self.ledger.pending_older_than(cutoff);
        if stale.is_empty() {
            return 0;
        }

        let mut cancelled = 0;
        for transaction_id in stale {
            match self.cancel_expired(transaction_id) {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        transaction_id = %transaction_id,
                        error = %err,
                        "Failed to sweep expired transaction"
                    );
                }
            }
        }

        if cancelled > 0 {
            info!(cancelled, "Swept expired pending transactions");
        }
        cancelled
    }

    // --- Private methods ---

    fn deposit_inner(&self, user_id: &UserId, amount: Credits) -> Result<AccountBalance> {
        if !user_id.is_valid() {
            return Err(EscrowError::invalid_request(
                "User id must be 1-64 characters of [A-Za-z0-9_:-]",
                Some("user_id"),
            ));
        }
        self.check_amount(amount)?;

        self.store.ensure_account(user_id);
        let balance = self
            .store
            .credit_available(user_id, amount, None, JournalKind::Deposit)?;

        info!(user = %user_id, amount = %amount, "Deposit credited");
        Ok(balance)
    }

    fn commit_inner(
        &self,
        buyer: &UserId,
        provider: &UserId,
        service: Option<ServiceId>,
        amount: Credits,
    ) -> Result<Transaction> {
        if buyer == provider {
            return Err(EscrowError::invalid_request(
                "Buyer and provider must be different",
                Some("provider"),
            ));
        }
        self.check_amount(amount)?;

        // The provider must exist before the debit so a failure here
        // cannot leave the buyer's funds held.
        if !self.store.exists(provider) {
            return Err(EscrowError::AccountNotFound(provider.clone()));
        }

        let transaction = Transaction::new(buyer.clone(), provider.clone(), service, amount);
        self.store.debit_available(buyer, amount, transaction.id)?;
        self.ledger.record(transaction.clone());

        info!(
            transaction_id = %transaction.id,
            buyer = %buyer,
            provider = %provider,
            amount = %amount,
            "Escrow committed"
        );
        Ok(transaction)
    }

    fn release_inner(&self, transaction_id: TransactionId, actor: &UserId) -> Result<Transaction> {
        let _guard = self.guards.claim(transaction_id)?;
        let mut transaction = self.transaction(transaction_id)?;

        if actor != &transaction.buyer {
            return Err(EscrowError::unauthorized(actor, "release this transaction"));
        }
        if transaction.status != TransactionStatus::Pending {
            return Err(EscrowError::InvalidTransition {
                from: transaction.status,
                to: TransactionStatus::Completed,
            });
        }

        self.store.release_escrow_to(
            &transaction.buyer,
            &transaction.provider,
            transaction.amount,
            transaction_id,
        )?;
        transaction.transition_to(TransactionStatus::Completed)?;
        self.ledger.record(transaction.clone());

        info!(
            transaction_id = %transaction_id,
            provider = %transaction.provider,
            amount = %transaction.amount,
            "Escrow released to provider"
        );
        Ok(transaction)
    }

    fn dispute_inner(
        &self,
        transaction_id: TransactionId,
        actor: &UserId,
        reason: &str,
    ) -> Result<Transaction> {
        if reason.trim().is_empty() {
            return Err(EscrowError::invalid_request(
                "Dispute reason must not be empty",
                Some("reason"),
            ));
        }

        let _guard = self.guards.claim(transaction_id)?;
        let mut transaction = self.transaction(transaction_id)?;

        if !transaction.is_participant(actor) {
            return Err(EscrowError::unauthorized(actor, "dispute this transaction"));
        }

        transaction.record_dispute(actor.clone(), reason)?;
        self.ledger.record(transaction.clone());

        info!(
            transaction_id = %transaction_id,
            raised_by = %actor,
            "Transaction disputed"
        );
        Ok(transaction)
    }

    fn cancel_inner(&self, transaction_id: TransactionId, actor: &UserId) -> Result<Transaction> {
        let _guard = self.guards.claim(transaction_id)?;
        let mut transaction = self.transaction(transaction_id)?;

        if actor != &transaction.buyer {
            return Err(EscrowError::unauthorized(actor, "cancel this transaction"));
        }
        if transaction.status != TransactionStatus::Pending {
            return Err(EscrowError::InvalidTransition {
                from: transaction.status,
                to: TransactionStatus::Cancelled,
            });
        }

        self.store.release_escrow_to(
            &transaction.buyer,
            &transaction.buyer,
            transaction.amount,
            transaction_id,
        )?;
        transaction.transition_to(TransactionStatus::Cancelled)?;
        self.ledger.record(transaction.clone());

        info!(
            transaction_id = %transaction_id,
            buyer = %transaction.buyer,
            amount = %transaction.amount,
            "Transaction cancelled, buyer refunded"
        );
        Ok(transaction)
    }

    fn resolve_inner(
        &self,
        transaction_id: TransactionId,
        resolution: Resolution,
    ) -> Result<Transaction> {
        let target = match resolution {
            Resolution::Complete => TransactionStatus::Completed,
            Resolution::Refund => TransactionStatus::Cancelled,
        };

        let _guard = self.guards.claim(transaction_id)?;
        let mut transaction = self.transaction(transaction_id)?;

        if transaction.status != TransactionStatus::Disputed {
            return Err(EscrowError::InvalidTransition {
                from: transaction.status,
                to: target,
            });
        }

        let dest = match resolution {
            Resolution::Complete => transaction.provider.clone(),
            Resolution::Refund => transaction.buyer.clone(),
        };
        self.store
            .release_escrow_to(&transaction.buyer, &dest, transaction.amount, transaction_id)?;
        transaction.transition_to(target)?;
        self.ledger.record(transaction.clone());

        info!(
            transaction_id = %transaction_id,
            resolution = ?resolution,
            paid_to = %dest,
            amount = %transaction.amount,
            "Dispute resolved"
        );
        Ok(transaction)
    }

    /// Sweep one stale id. `Ok(true)` if cancelled, `Ok(false)` if the row
    /// raced past us and no longer qualifies.
    fn cancel_expired(&self, transaction_id: TransactionId) -> Result<bool> {
        let _guard = match self.guards.claim(transaction_id) {
            Ok(guard) => guard,
            Err(EscrowError::ConflictRetry) => {
                debug!(
                    transaction_id = %transaction_id,
                    "Transition in flight, leaving for next sweep"
                );
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let mut transaction = match self.ledger.get(transaction_id) {
            Some(transaction) => transaction,
            None => return Ok(false),
        };
        if transaction.status != TransactionStatus::Pending {
            return Ok(false);
        }

        self.store.release_escrow_to(
            &transaction.buyer,
            &transaction.buyer,
            transaction.amount,
            transaction_id,
        )?;
        transaction.transition_to(TransactionStatus::Cancelled)?;
        self.ledger.record(transaction.clone());
        self.metrics.sweep_expired();

        info!(
            transaction_id = %transaction_id,
            buyer = %transaction.buyer,
            amount = %transaction.amount,
            created_at = %transaction.created_at,
            "Expired pending transaction cancelled"
        );
        Ok(true)
    }

    fn check_amount(&self, amount: Credits) -> Result<()> {
        if amount.is_zero() {
            return Err(EscrowError::InvalidAmount);
        }
        if !self.config.limits.allows(amount) {
            return Err(EscrowError::AmountOutOfRange {
                amount,
                min: self.config.limits.min_amount,
                max: self.config.limits.max_amount,
            });
        }
        Ok(())
    }

    fn note_failure(&self, err: EscrowError) -> EscrowError {
        if err.is_retryable() {
            self.metrics.conflict_detected();
        } else {
            self.metrics.operation_failed();
        }
        warn!(error = %err, code = err.error_code(), "Escrow operation failed");
        err
    }
}

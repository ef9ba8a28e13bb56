//! Background sweeper for expired pending transactions.

use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::EscrowEngine;

/// Run the pending-timeout sweeper until the task is aborted.
///
/// Every `sweep.interval` this cancels and refunds transactions that have
/// sat in `pending` longer than `sweep.pending_timeout`, through the same
/// guarded path as a manual cancel. Returns immediately if the sweeper is
/// disabled in configuration.
pub async fn run_sweep_loop(engine: Arc<EscrowEngine>) {
    let sweep = engine.config().sweep.clone();
    if !sweep.enabled {
        info!("Sweeper disabled, not starting");
        return;
    }

    info!(
        interval_secs = sweep.interval.as_secs(),
        pending_timeout_secs = sweep.pending_timeout.as_secs(),
        "Sweeper started"
    );

    loop {
        tokio::time::sleep(sweep.interval).await;
        let cancelled = engine.sweep_expired();
        if cancelled == 0 {
            debug!("Sweep pass found nothing expired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use escrowcore_common::{Credits, TransactionStatus, UserId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_disabled_sweeper_returns() {
        let mut config = EngineConfig::default();
        config.sweep.enabled = false;
        let engine = Arc::new(EscrowEngine::new(config));

        // Completes instead of looping forever
        run_sweep_loop(engine).await;
    }

    #[tokio::test]
    async fn test_loop_cancels_backdated_pending() {
        let mut config = EngineConfig::default();
        config.sweep.interval = Duration::from_millis(10);
        let engine = Arc::new(EscrowEngine::new(config));

        let buyer = UserId::new("buyer");
        let provider = UserId::new("provider");
        engine.sync_profile(&buyer).unwrap();
        engine.sync_profile(&provider).unwrap();
        engine.deposit(&buyer, Credits::new(100)).unwrap();

        let txn = engine
            .commit(&buyer, &provider, None, Credits::new(100))
            .unwrap();
        let mut row = engine.transaction(txn.id).unwrap();
        row.created_at = row.created_at - chrono::Duration::days(8);
        engine.ledger().record(row);

        let task = tokio::spawn(run_sweep_loop(Arc::clone(&engine)));

        let mut swept = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if engine.transaction(txn.id).unwrap().status == TransactionStatus::Cancelled {
                swept = true;
                break;
            }
        }
        task.abort();

        assert!(swept, "sweeper never cancelled the expired transaction");
        assert_eq!(
            engine.balances(&buyer).unwrap().available,
            Credits::new(100)
        );
    }
}

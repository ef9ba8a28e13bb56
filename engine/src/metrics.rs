//! Metrics collection for engine monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Escrow engine metrics.
pub struct Metrics {
    /// Total successful commits.
    pub commits_total: AtomicU64,
    /// Total successful releases.
    pub releases_total: AtomicU64,
    /// Total successful disputes.
    pub disputes_total: AtomicU64,
    /// Total successful manual cancels.
    pub cancels_total: AtomicU64,
    /// Total dispute resolutions.
    pub resolves_total: AtomicU64,
    /// Total deposits.
    pub deposits_total: AtomicU64,
    /// Pending transactions cancelled by the sweeper.
    pub sweeps_expired_total: AtomicU64,
    /// Transitions rejected because another was in flight.
    pub conflicts_total: AtomicU64,
    /// Operations failed with a definitive error.
    pub failures_total: AtomicU64,
    /// Transactions currently holding escrow (pending or disputed).
    pub escrow_holding: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            commits_total: AtomicU64::new(0),
            releases_total: AtomicU64::new(0),
            disputes_total: AtomicU64::new(0),
            cancels_total: AtomicU64::new(0),
            resolves_total: AtomicU64::new(0),
            deposits_total: AtomicU64::new(0),
            sweeps_expired_total: AtomicU64::new(0),
            conflicts_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
            escrow_holding: AtomicU64::new(0),
        }
    }

    /// Record a successful commit (a new escrow hold).
    pub fn commit_succeeded(&self) {
        self.commits_total.fetch_add(1, Ordering::Relaxed);
        self.escrow_holding.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful release.
    pub fn release_succeeded(&self) {
        self.releases_total.fetch_add(1, Ordering::Relaxed);
        self.escrow_holding.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a successful dispute. The hold stays in place.
    pub fn dispute_succeeded(&self) {
        self.disputes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful manual cancel.
    pub fn cancel_succeeded(&self) {
        self.cancels_total.fetch_add(1, Ordering::Relaxed);
        self.escrow_holding.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a dispute resolution.
    pub fn resolve_succeeded(&self) {
        self.resolves_total.fetch_add(1, Ordering::Relaxed);
        self.escrow_holding.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a deposit.
    pub fn deposit_succeeded(&self) {
        self.deposits_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sweeper cancellation of an expired pending transaction.
    pub fn sweep_expired(&self) {
        self.sweeps_expired_total.fetch_add(1, Ordering::Relaxed);
        self.escrow_holding.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a transition rejected due to a concurrent one.
    pub fn conflict_detected(&self) {
        self.conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation failing with a definitive error.
    pub fn operation_failed(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits_total: self.commits_total.load(Ordering::Relaxed),
            releases_total: self.releases_total.load(Ordering::Relaxed),
            disputes_total: self.disputes_total.load(Ordering::Relaxed),
            cancels_total: self.cancels_total.load(Ordering::Relaxed),
            resolves_total: self.resolves_total.load(Ordering::Relaxed),
            deposits_total: self.deposits_total.load(Ordering::Relaxed),
            sweeps_expired_total: self.sweeps_expired_total.load(Ordering::Relaxed),
            conflicts_total: self.conflicts_total.load(Ordering::Relaxed),
            failures_total: self.failures_total.load(Ordering::Relaxed),
            escrow_holding: self.escrow_holding.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP escrowcore_commits_total Total successful commits
# TYPE escrowcore_commits_total counter
escrowcore_commits_total {}

# HELP escrowcore_releases_total Total successful releases
# TYPE escrowcore_releases_total counter
escrowcore_releases_total {}

# HELP escrowcore_disputes_total Total disputes raised
# TYPE escrowcore_disputes_total counter
escrowcore_disputes_total {}

# HELP escrowcore_cancels_total Total manual cancellations
# TYPE escrowcore_cancels_total counter
escrowcore_cancels_total {}

# HELP escrowcore_resolves_total Total dispute resolutions
# TYPE escrowcore_resolves_total counter
escrowcore_resolves_total {}

# HELP escrowcore_deposits_total Total deposits
# TYPE escrowcore_deposits_total counter
escrowcore_deposits_total {}

# HELP escrowcore_sweeps_expired_total Pending transactions cancelled by the sweeper
# TYPE escrowcore_sweeps_expired_total counter
escrowcore_sweeps_expired_total {}

# HELP escrowcore_conflicts_total Transitions rejected due to a concurrent one
# TYPE escrowcore_conflicts_total counter
escrowcore_conflicts_total {}

# HELP escrowcore_failures_total Operations failed with a definitive error
# TYPE escrowcore_failures_total counter
escrowcore_failures_total {}

# HELP escrowcore_escrow_holding Transactions currently holding escrow
# TYPE escrowcore_escrow_holding gauge
escrowcore_escrow_holding {}
"#,
            snapshot.commits_total,
            snapshot.releases_total,
            snapshot.disputes_total,
            snapshot.cancels_total,
            snapshot.resolves_total,
            snapshot.deposits_total,
            snapshot.sweeps_expired_total,
            snapshot.conflicts_total,
            snapshot.failures_total,
            snapshot.escrow_holding,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub commits_total: u64,
    pub releases_total: u64,
    pub disputes_total: u64,
    pub cancels_total: u64,
    pub resolves_total: u64,
    pub deposits_total: u64,
    pub sweeps_expired_total: u64,
    pub conflicts_total: u64,
    pub failures_total: u64,
    pub escrow_holding: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_track_holding_gauge() {
        let metrics = Metrics::new();

        metrics.commit_succeeded();
        metrics.commit_succeeded();
        metrics.release_succeeded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.commits_total, 2);
        assert_eq!(snapshot.releases_total, 1);
        assert_eq!(snapshot.escrow_holding, 1);
    }

    #[test]
    fn test_dispute_keeps_hold() {
        let metrics = Metrics::new();

        metrics.commit_succeeded();
        metrics.dispute_succeeded();
        assert_eq!(metrics.snapshot().escrow_holding, 1);

        metrics.resolve_succeeded();
        assert_eq!(metrics.snapshot().escrow_holding, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.commit_succeeded();
        metrics.conflict_detected();

        let output = metrics.to_prometheus();
        assert!(output.contains("escrowcore_commits_total 1"));
        assert!(output.contains("escrowcore_conflicts_total 1"));
        assert!(output.contains("escrowcore_escrow_holding 1"));
    }
}

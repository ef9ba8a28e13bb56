//! Metrics collection for simulation runs.

use std::collections::VecDeque;

use escrowcore_common::EscrowError;

/// Which engine operation a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Deposit,
    Commit,
    Release,
    Dispute,
    Cancel,
    Resolve,
}

/// Aggregated counters for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    pub deposits: u64,
    pub commits: u64,
    pub releases: u64,
    pub disputes: u64,
    pub cancels: u64,
    pub resolves: u64,
    /// Operations rejected with a definitive error.
    pub failed: u64,
    /// Operations that lost a transition race and could be retried.
    pub conflicts: u64,
    /// Latency samples (us).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self {
            deposits: 0,
            commits: 0,
            releases: 0,
            disputes: 0,
            cancels: 0,
            resolves: 0,
            failed: 0,
            conflicts: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a successful operation and its latency in microseconds.
    pub fn record_success(&mut self, op: OpKind, latency_us: u64) {
        match op {
            OpKind::Deposit => self.deposits += 1,
            OpKind::Commit => self.commits += 1,
            OpKind::Release => self.releases += 1,
            OpKind::Dispute => self.disputes += 1,
            OpKind::Cancel => self.cancels += 1,
            OpKind::Resolve => self.resolves += 1,
        }

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Record a rejected operation, split by whether it was retryable.
    pub fn record_error(&mut self, err: &EscrowError) {
        if err.is_retryable() {
            self.conflicts += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Successful operations recorded so far.
    pub fn succeeded(&self) -> u64 {
        self.deposits + self.commits + self.releases + self.disputes + self.cancels + self.resolves
    }

    /// Every operation attempted, including rejections.
    pub fn total_operations(&self) -> u64 {
        self.succeeded() + self.failed + self.conflicts
    }

    /// Get average latency in us.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    /// Get percentile latency.
    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            return 0.0;
        }

        self.succeeded() as f64 / total as f64
    }

    /// Get throughput (operations per second).
    pub fn throughput(&self, duration_secs: f64) -> f64 {
        if duration_secs <= 0.0 {
            return 0.0;
        }

        self.total_operations() as f64 / duration_secs
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrowcore_common::Credits;

    #[test]
    fn test_counters_split_by_operation() {
        let mut metrics = SimulationMetrics::new();
        metrics.record_success(OpKind::Commit, 120);
        metrics.record_success(OpKind::Commit, 80);
        metrics.record_success(OpKind::Release, 95);

        assert_eq!(metrics.commits, 2);
        assert_eq!(metrics.releases, 1);
        assert_eq!(metrics.succeeded(), 3);
        assert_eq!(metrics.total_operations(), 3);
    }

    #[test]
    fn test_errors_split_by_retryability() {
        let mut metrics = SimulationMetrics::new();
        metrics.record_error(&EscrowError::ConflictRetry);
        metrics.record_error(&EscrowError::InsufficientFunds {
            required: Credits::new(100),
            available: Credits::new(10),
        });

        assert_eq!(metrics.conflicts, 1);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.succeeded(), 0);
        assert_eq!(metrics.total_operations(), 2);
    }

    #[test]
    fn test_latency_percentiles() {
        let mut metrics = SimulationMetrics::new();
        for latency in 1..=100u64 {
            metrics.record_success(OpKind::Commit, latency);
        }

        assert_eq!(metrics.average_latency_us(), 50);
        assert_eq!(metrics.p50_latency_us(), 51);
        assert_eq!(metrics.p99_latency_us(), 100);
    }

    #[test]
    fn test_success_rate() {
        let mut metrics = SimulationMetrics::new();
        assert_eq!(metrics.success_rate(), 0.0);

        metrics.record_success(OpKind::Commit, 10);
        metrics.record_success(OpKind::Release, 10);
        metrics.record_error(&EscrowError::ConflictRetry);
        metrics.record_error(&EscrowError::ConflictRetry);

        assert_eq!(metrics.success_rate(), 0.5);
    }
}

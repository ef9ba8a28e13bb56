//! Time utilities and constants for EscrowCore.

use chrono::{DateTime, Duration, Utc};

/// Service timing constants.
pub mod constants {
    use super::Duration;

    /// Default age after which a pending transaction is swept (7 days).
    pub fn default_pending_timeout() -> Duration {
        Duration::days(7)
    }

    /// Default interval between sweeper passes (60 seconds).
    pub fn default_sweep_interval() -> Duration {
        Duration::seconds(60)
    }

    /// Message freshness window (5 minutes).
    pub fn message_freshness_window() -> Duration {
        Duration::minutes(5)
    }
}

/// Performance targets.
pub mod targets {
    /// Target operation latency p50 (5ms).
    pub const LATENCY_P50_MS: i64 = 5;

    /// Target operation latency p99 (50ms).
    pub const LATENCY_P99_MS: i64 = 50;
}

/// A timestamp with timezone (always UTC for EscrowCore).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a timestamp is within the freshness window.
pub fn is_fresh(timestamp: Timestamp) -> bool {
    let diff = (now() - timestamp).abs();
    diff < constants::message_freshness_window()
}

/// Check if a timestamp has expired (is in the past).
pub fn is_expired(expiry: Timestamp) -> bool {
    now() > expiry
}

/// Calculate expiry time from now.
pub fn expires_in(duration: Duration) -> Timestamp {
    now() + duration
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fresh() {
        let recent = now() - Duration::seconds(10);
        assert!(is_fresh(recent));

        let old = now() - Duration::minutes(10);
        assert!(!is_fresh(old));
    }

    #[test]
    fn test_is_expired() {
        let past = now() - Duration::seconds(10);
        assert!(is_expired(past));

        let future = now() + Duration::seconds(10);
        assert!(!is_expired(future));
    }

    #[test]
    fn test_duration_as_std() {
        assert_eq!(
            Duration::seconds(2).as_std(),
            std::time::Duration::from_secs(2)
        );
        // Negative durations clamp to zero
        assert_eq!(Duration::seconds(-2).as_std(), std::time::Duration::ZERO);
    }
}

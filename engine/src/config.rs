//! Escrow engine configuration.

use std::time::Duration;

use escrowcore_common::Credits;

/// Amount limits for commits and deposits.
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Smallest accepted amount.
    pub min_amount: Credits,
    /// Largest accepted amount.
    pub max_amount: Credits,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            min_amount: Credits::new(1),
            max_amount: Credits::new(1_000_000),
        }
    }
}

impl LimitConfig {
    /// Check an amount against the configured bounds.
    pub fn allows(&self, amount: Credits) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}

/// Pending-transaction sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Whether the sweeper runs at all.
    pub enabled: bool,
    /// Interval between sweep passes.
    pub interval: Duration,
    /// Age after which a pending transaction is cancelled and refunded.
    pub pending_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            pending_timeout: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,
    /// Metrics port.
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 7450,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Node ID (unique per instance).
    pub node_id: Option<String>,
    /// Amount limits.
    pub limits: LimitConfig,
    /// Sweeper configuration.
    pub sweep: SweepConfig,
    /// Server configuration.
    pub server: ServerConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(node_id) = std::env::var("ESCROWCORE_NODE_ID") {
            config.node_id = Some(node_id);
        }

        if let Ok(addr) = std::env::var("ESCROWCORE_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("ESCROWCORE_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.server.listen_port = port;
            }
        }

        if let Ok(enabled) = std::env::var("ESCROWCORE_METRICS_ENABLED") {
            if let Ok(enabled) = enabled.parse() {
                config.server.metrics_enabled = enabled;
            }
        }

        if let Ok(port) = std::env::var("ESCROWCORE_METRICS_PORT") {
            if let Ok(port) = port.parse() {
                config.server.metrics_port = port;
            }
        }

        if let Ok(min) = std::env::var("ESCROWCORE_MIN_AMOUNT") {
            if let Ok(min) = min.parse() {
                config.limits.min_amount = Credits::new(min);
            }
        }

        if let Ok(max) = std::env::var("ESCROWCORE_MAX_AMOUNT") {
            if let Ok(max) = max.parse() {
                config.limits.max_amount = Credits::new(max);
            }
        }

        if let Ok(enabled) = std::env::var("ESCROWCORE_SWEEP_ENABLED") {
            if let Ok(enabled) = enabled.parse() {
                config.sweep.enabled = enabled;
            }
        }

        if let Ok(secs) = std::env::var("ESCROWCORE_SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.sweep.interval = Duration::from_secs(secs);
            }
        }

        if let Ok(secs) = std::env::var("ESCROWCORE_PENDING_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.sweep.pending_timeout = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.limits.min_amount.is_zero() {
            return Err("Minimum amount must be at least 1".to_string());
        }

        if self.limits.min_amount > self.limits.max_amount {
            return Err("Minimum amount cannot exceed maximum amount".to_string());
        }

        if self.sweep.enabled {
            if self.sweep.interval.is_zero() {
                return Err("Sweep interval cannot be 0".to_string());
            }
            if self.sweep.pending_timeout.is_zero() {
                return Err("Pending timeout cannot be 0".to_string());
            }
        }

        Ok(())
    }
}

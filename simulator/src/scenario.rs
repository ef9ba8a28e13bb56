//! Simulation scenarios.

use anyhow::anyhow;

/// A named simulation scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Commits followed by releases, no contention.
    HappyPath,
    /// Many concurrent commits against one underfunded buyer.
    ContendedBuyer,
    /// Concurrent disputes and releases, then arbitration.
    DisputeStorm,
    /// Randomized operations driven by the seeded RNG.
    MixedLoad,
}

impl Scenario {
    /// Parse a scenario by its command-line name.
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "happy_path" => Ok(Scenario::HappyPath),
            "contended_buyer" => Ok(Scenario::ContendedBuyer),
            "dispute_storm" => Ok(Scenario::DisputeStorm),
            "mixed_load" => Ok(Scenario::MixedLoad),
            _ => Err(anyhow!(
                "Unknown scenario: {name} (expected happy_path, contended_buyer, dispute_storm, or mixed_load)"
            )),
        }
    }

    /// The command-line name.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::HappyPath => "happy_path",
            Scenario::ContendedBuyer => "contended_buyer",
            Scenario::DisputeStorm => "dispute_storm",
            Scenario::MixedLoad => "mixed_load",
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::HappyPath => "Every buyer commits and releases with no contention",
            Scenario::ContendedBuyer => {
                "Concurrent commits race an underfunded buyer; only the affordable subset wins"
            }
            Scenario::DisputeStorm => "Disputes race releases, then the arbiter cleans up",
            Scenario::MixedLoad => "Random operations from concurrent workers under a seeded RNG",
        }
    }
}

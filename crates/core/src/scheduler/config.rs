//! Archival scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the archival scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Enable/disable the background loop.
    /// When disabled, cycles only run through the API.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between two cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Delay before retrying a ticket after its first failure (seconds).
    /// Doubles with every consecutive failure.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Upper bound on the per-ticket retry delay (seconds).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    300 // 5 minutes
}

fn default_backoff_base() -> u64 {
    60
}

fn default_backoff_max() -> u64 {
    3600 // 1 hour
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

impl SchedulerConfig {
    /// Retry delay after `failures` consecutive failures (1-based).
    pub fn backoff_for(&self, failures: u32) -> u64 {
        let exponent = failures.saturating_sub(1).min(32);
        self.backoff_base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_secs)
    }
}

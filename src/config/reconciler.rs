// src/config/reconciler.rs
// Reconciler scheduling configuration (§4.8, §6)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub interval_secs: u64,
    pub batch_limit_per_class: i64,
    pub healthy_threshold: f64,
}

impl ReconcilerConfig {
    pub fn from_env() -> Self {
        Self {
            interval_secs: super::helpers::env_or_parsed("RECONCILER_INTERVAL_SECS", 15 * 60),
            batch_limit_per_class: super::helpers::env_or_parsed("RECONCILER_BATCH_LIMIT", 500),
            healthy_threshold: super::helpers::env_or_parsed("RECONCILER_HEALTHY_THRESHOLD", 0.95),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

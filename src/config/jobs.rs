// src/config/jobs.rs
// Job Broker configuration (§4.3, §6)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    pub visibility_timeout_secs: u64,
    pub worker_concurrency: usize,
    pub queue_backpressure_hi: i64,
    pub dedup_window_secs: i64,
}

impl JobConfig {
    pub fn from_env() -> Self {
        Self {
            max_attempts: super::helpers::env_or_parsed("JOB_MAX_ATTEMPTS", 5),
            backoff_base_secs: super::helpers::env_or_parsed("JOB_BACKOFF_BASE_SECS", 1),
            backoff_cap_secs: super::helpers::env_or_parsed("JOB_BACKOFF_CAP_SECS", 600),
            visibility_timeout_secs: super::helpers::env_or_parsed("JOB_VISIBILITY_TIMEOUT_SECS", 300),
            worker_concurrency: super::helpers::env_or_parsed("WORKER_CONCURRENCY", 4),
            queue_backpressure_hi: super::helpers::env_or_parsed("QUEUE_BACKPRESSURE_HI", 10_000),
            dedup_window_secs: super::helpers::env_or_parsed("JOB_DEDUP_WINDOW_SECS", 300),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

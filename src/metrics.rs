// src/metrics.rs
// Lightweight in-process metrics, grounded in the teacher's `TaskMetrics`:
// atomics behind a `RwLock<HashMap<...>>` rather than a full metrics crate,
// since nothing in this system's ambient stack needs to export Prometheus.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Default)]
pub struct TaskMetrics {
    processed: RwLock<HashMap<String, AtomicUsize>>,
    errors: RwLock<HashMap<String, AtomicUsize>>,
    sync_health: RwLock<HashMap<i64, f64>>,
}

impl TaskMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self, task: &str, count: usize) {
        self.processed
            .write()
            .entry(task.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_error(&self, task: &str) {
        self.errors
            .write()
            .entry(task.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_health(&self, guild_id: i64, ratio: f64) {
        self.sync_health.write().insert(guild_id, ratio);
        info!(guild_id, ratio, healthy = ratio > 0.95, "sync-health");
    }

    pub fn sync_health_for(&self, guild_id: i64) -> Option<f64> {
        self.sync_health.read().get(&guild_id).copied()
    }

    pub fn report(&self) {
        let processed = self.processed.read();
        let errors = self.errors.read();
        for (task, count) in processed.iter() {
            let processed_count = count.load(Ordering::Relaxed);
            let error_count = errors.get(task).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0);
            if processed_count > 0 || error_count > 0 {
                info!(task, processed = processed_count, errors = error_count, "task activity");
            }
        }
    }
}

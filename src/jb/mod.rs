// src/jb/mod.rs
// Job Broker (§4.3): durable priority queue with visibility-timeout
// leasing, bounded retries, and a dead-letter bucket.

pub mod error;
pub mod sqlite;
pub mod types;

pub use error::{JbError, JbResult};
pub use types::*;

use async_trait::async_trait;

/// Storage seam for the job queue, grounded in the teacher's `StorageBackend`
/// shape from the retrieved queue-engine example: enqueue, reserve (claim),
/// ack, nack, plus a lease sweeper for crashed workers.
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Enqueue a unit of work. `dedup_key`, if present, coalesces this
    /// enqueue with any other pending/reserved job sharing the same key
    /// within the configured dedup window (§4.3).
    async fn enqueue(
        &self,
        kind: JobKind,
        priority: Priority,
        dedup_key: Option<String>,
        delay_secs: Option<i64>,
    ) -> JbResult<i64>;

    /// Atomically claim the next eligible job, ordered by priority then
    /// age, and mark it reserved with a visibility timeout.
    async fn reserve(&self) -> JbResult<Option<Job>>;

    /// Mark a job done. Idempotent: acking an already-done job is a no-op.
    async fn ack(&self, job_id: i64) -> JbResult<()>;

    /// Mark a job failed. If `attempts < max_attempts`, reschedule with
    /// exponential backoff + jitter; otherwise move to the dead-letter
    /// bucket.
    async fn nack(&self, job_id: i64, error: &str) -> JbResult<()>;

    /// Re-enqueue reserved jobs whose visibility timeout has elapsed
    /// without an ack/nack — recovers work from crashed workers.
    async fn sweep_expired_leases(&self) -> JbResult<u64>;

    async fn queue_depth(&self, priority: Option<Priority>) -> JbResult<i64>;

    async fn list_dead_letters(&self, guild_id: i64, limit: i64) -> JbResult<Vec<DeadLetterJob>>;
}

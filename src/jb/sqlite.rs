// src/jb/sqlite.rs
// SqliteJobBroker: the sole concrete JobBroker implementation. `reserve` is
// one transaction that selects the next eligible row and flips it to
// `reserved` before another connection can see it — SQLite's single-writer
// model makes this safe without `SELECT ... FOR UPDATE SKIP LOCKED`.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sqlx::{Row, SqlitePool};

use crate::config::jobs::JobConfig;

use super::{
    error::{JbError, JbResult},
    types::{DeadLetterJob, Job, JobKind, JobStatus, Priority},
    JobBroker,
};

pub struct SqliteJobBroker {
    pool: SqlitePool,
    config: JobConfig,
}

impl SqliteJobBroker {
    pub fn new(pool: SqlitePool, config: JobConfig) -> Self {
        Self { pool, config }
    }

    fn backoff_for(&self, attempts: i32) -> ChronoDuration {
        let base = self.config.backoff_base_secs as f64;
        let cap = self.config.backoff_cap_secs as f64;
        let exp = base * 2f64.powi(attempts.max(0));
        let capped = exp.min(cap);
        let jitter: f64 = rand::rng().random_range(0.0..base);
        ChronoDuration::milliseconds(((capped + jitter) * 1000.0) as i64)
    }

    fn row_to_job(row: sqlx::sqlite::SqliteRow) -> JbResult<Job> {
        let id: i64 = row.try_get("id")?;
        let payload: String = row.try_get("payload")?;
        let priority: String = row.try_get("priority")?;
        let status: String = row.try_get("status")?;

        Ok(Job {
            id,
            kind: serde_json::from_str(&payload).map_err(|_| JbError::NotFound(id))?,
            priority: priority.parse().map_err(|_| JbError::NotFound(id))?,
            guild_id: row.try_get("guild_id")?,
            dedup_key: row.try_get("dedup_key")?,
            status: status.parse().map_err(|_| JbError::NotFound(id))?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            available_at: row.try_get("available_at")?,
            reserved_until: row.try_get("reserved_until")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl JobBroker for SqliteJobBroker {
    async fn enqueue(
        &self,
        kind: JobKind,
        priority: Priority,
        dedup_key: Option<String>,
        delay_secs: Option<i64>,
    ) -> JbResult<i64> {
        let now = Utc::now();
        let available_at = now + ChronoDuration::seconds(delay_secs.unwrap_or(0));
        let guild_id = kind.guild_id();
        let payload = serde_json::to_string(&kind).expect("JobKind always serializes");

        if let Some(key) = &dedup_key {
            let window_start = now - ChronoDuration::seconds(self.config.dedup_window_secs as i64);
            let existing = sqlx::query(
                "SELECT id FROM jobs WHERE dedup_key = ? AND status IN ('pending', 'reserved') AND created_at >= ?",
            )
            .bind(key)
            .bind(window_start)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = existing {
                return Ok(row.try_get("id")?);
            }
        }

        let result = sqlx::query(
            "INSERT INTO jobs (kind, payload, priority, guild_id, dedup_key, status, attempts, max_attempts, available_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'pending', 0, ?, ?, ?, ?)",
        )
        .bind(kind.name())
        .bind(&payload)
        .bind(priority.as_str())
        .bind(guild_id)
        .bind(&dedup_key)
        .bind(self.config.max_attempts as i32)
        .bind(available_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn reserve(&self) -> JbResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query(
            "SELECT id FROM jobs
             WHERE status = 'pending' AND available_at <= ?
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'default' THEN 1 ELSE 2 END, created_at ASC
             LIMIT 1",
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;
        let reserved_until = now + ChronoDuration::seconds(self.config.visibility_timeout_secs as i64);

        sqlx::query(
            "UPDATE jobs SET status = 'reserved', reserved_at = ?, reserved_until = ?, attempts = attempts + 1, updated_at = ?
             WHERE id = ?",
        )
        .bind(now)
        .bind(reserved_until)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let full = sqlx::query(
            "SELECT id, kind, payload, priority, guild_id, dedup_key, status, attempts, max_attempts,
                    available_at, reserved_until, last_error, created_at
             FROM jobs WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(Self::row_to_job(full)?))
    }

    async fn ack(&self, job_id: i64) -> JbResult<()> {
        sqlx::query("UPDATE jobs SET status = 'done', updated_at = ? WHERE id = ? AND status != 'done'")
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn nack(&self, job_id: i64, error: &str) -> JbResult<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT attempts, max_attempts, kind, payload, guild_id FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(JbError::NotFound(job_id))?;

        let attempts: i32 = row.try_get("attempts")?;
        let max_attempts: i32 = row.try_get("max_attempts")?;
        let now = Utc::now();

        if attempts >= max_attempts {
            let kind: String = row.try_get("kind")?;
            let payload: String = row.try_get("payload")?;
            let guild_id: i64 = row.try_get("guild_id")?;

            sqlx::query(
                "INSERT INTO dead_letter_jobs (original_job_id, kind, payload, guild_id, attempts, last_error, failed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(job_id)
            .bind(kind)
            .bind(payload)
            .bind(guild_id)
            .bind(attempts)
            .bind(error)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE jobs SET status = 'dead', last_error = ?, updated_at = ? WHERE id = ?")
                .bind(error)
                .bind(now)
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
        } else {
            let delay = self.backoff_for(attempts);
            sqlx::query(
                "UPDATE jobs SET status = 'pending', available_at = ?, reserved_until = NULL, last_error = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(now + delay)
            .bind(error)
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn sweep_expired_leases(&self) -> JbResult<u64> {
        let now = Utc::now();
        let rows = sqlx::query("SELECT id FROM jobs WHERE status = 'reserved' AND reserved_until < ?")
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        let mut swept = 0u64;
        for row in rows {
            let id: i64 = row.try_get("id")?;
            // An expired lease is an implicit nack (§4.3): route it through
            // the same attempts-check/backoff/dead-letter path a worker's
            // own nack would take, rather than a bare status flip.
            self.nack(id, "lease expired").await?;
            swept += 1;
        }
        Ok(swept)
    }

    async fn queue_depth(&self, priority: Option<Priority>) -> JbResult<i64> {
        let depth: i64 = match priority {
            Some(p) => {
                sqlx::query("SELECT COUNT(*) FROM jobs WHERE status = 'pending' AND priority = ?")
                    .bind(p.as_str())
                    .fetch_one(&self.pool)
                    .await?
                    .try_get(0)?
            }
            None => {
                sqlx::query("SELECT COUNT(*) FROM jobs WHERE status = 'pending'")
                    .fetch_one(&self.pool)
                    .await?
                    .try_get(0)?
            }
        };
        Ok(depth)
    }

    async fn list_dead_letters(&self, guild_id: i64, limit: i64) -> JbResult<Vec<DeadLetterJob>> {
        let rows = sqlx::query(
            "SELECT id, original_job_id, payload, guild_id, attempts, last_error, failed_at
             FROM dead_letter_jobs WHERE guild_id = ? ORDER BY failed_at DESC LIMIT ?",
        )
        .bind(guild_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                Ok(DeadLetterJob {
                    id: row.try_get("id")?,
                    original_job_id: row.try_get("original_job_id")?,
                    kind: serde_json::from_str(&payload).map_err(|_| JbError::NotFound(-1))?,
                    guild_id: row.try_get("guild_id")?,
                    attempts: row.try_get("attempts")?,
                    last_error: row.try_get("last_error")?,
                    failed_at: row.try_get("failed_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::jobs::JobConfig;

    fn test_config() -> JobConfig {
        JobConfig {
            max_attempts: 3,
            backoff_base_secs: 1,
            backoff_cap_secs: 60,
            visibility_timeout_secs: 300,
            worker_concurrency: 2,
            queue_backpressure_hi: 1000,
            dedup_window_secs: 300,
        }
    }

    async fn test_broker() -> SqliteJobBroker {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteJobBroker::new(pool, test_config())
    }

    fn sample_kind(guild_id: i64) -> JobKind {
        JobKind::EmbedSession { guild_id, session_id: "s1".into() }
    }

    #[tokio::test]
    async fn enqueue_dedup_coalesces_within_window() {
        let broker = test_broker().await;
        let id1 = broker
            .enqueue(sample_kind(1), Priority::Default, Some("dk1".into()), None)
            .await
            .unwrap();
        let id2 = broker
            .enqueue(sample_kind(1), Priority::Default, Some("dk1".into()), None)
            .await
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn reserve_respects_priority_order() {
        let broker = test_broker().await;
        broker.enqueue(sample_kind(1), Priority::Low, None, None).await.unwrap();
        let high_id = broker.enqueue(sample_kind(1), Priority::High, None, None).await.unwrap();

        let job = broker.reserve().await.unwrap().unwrap();
        assert_eq!(job.id, high_id);
    }

    #[tokio::test]
    async fn nack_moves_to_dead_letter_after_max_attempts() {
        let broker = test_broker().await;
        let id = broker.enqueue(sample_kind(1), Priority::Default, None, None).await.unwrap();

        for _ in 0..3 {
            let job = broker.reserve().await.unwrap().unwrap();
            assert_eq!(job.id, id);
            broker.nack(id, "boom").await.unwrap();
        }

        let dead = broker.list_dead_letters(1, 10).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].original_job_id, id);
    }

    #[tokio::test]
    async fn sweep_expired_leases_requeues_stuck_jobs() {
        let broker = test_broker().await;
        let id = broker.enqueue(sample_kind(1), Priority::Default, None, None).await.unwrap();
        broker.reserve().await.unwrap().unwrap();

        sqlx::query("UPDATE jobs SET reserved_until = ? WHERE id = ?")
            .bind(Utc::now() - ChronoDuration::seconds(10))
            .bind(id)
            .execute(&broker.pool)
            .await
            .unwrap();

        let swept = broker.sweep_expired_leases().await.unwrap();
        assert_eq!(swept, 1);

        let job = broker.reserve().await.unwrap().unwrap();
        assert_eq!(job.id, id);
    }
}

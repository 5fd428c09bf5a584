// src/reconciler/mod.rs
// Reconciler (§4.8): periodic drift correction between RS and VS. Scheduler
// shape grounded in the teacher's `TaskManager` periodic-task spawn pattern
// (`tokio::time::interval` + `MissedTickBehavior::Skip`), collapsed to one
// task since this system has one kind of periodic work instead of six.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::reconciler::ReconcilerConfig;
use crate::jb::{JobBroker, JobKind, Priority};
use crate::metrics::TaskMetrics;
use crate::rs::{PendingKind, RecordKind, RelationalStore};
use crate::vs::VectorStore;

pub struct Reconciler {
    rs: Arc<dyn RelationalStore>,
    vs: Arc<dyn VectorStore>,
    jb: Arc<dyn JobBroker>,
    config: ReconcilerConfig,
    metrics: Arc<TaskMetrics>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileReport {
    pub unindexed: usize,
    pub stale: usize,
    pub pending_delete: usize,
    pub orphans_removed: usize,
}

impl Reconciler {
    pub fn new(
        rs: Arc<dyn RelationalStore>,
        vs: Arc<dyn VectorStore>,
        jb: Arc<dyn JobBroker>,
        config: ReconcilerConfig,
        metrics: Arc<TaskMetrics>,
    ) -> Self {
        Self { rs, vs, jb, config, metrics }
    }

    /// Spawn the scheduler loop. Runs once immediately (startup pass), then
    /// on `config.interval()`.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.config.interval_secs, "reconciler scheduler started");
            let mut ticker = time::interval(self.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_all_guilds().await {
                    warn!(error = %e, "reconciler cycle failed");
                }
            }
        })
    }

    async fn run_all_guilds(&self) -> crate::rs::RsResult<()> {
        let guild_ids = self.rs.list_active_guild_ids().await?;
        for guild_id in &guild_ids {
            match self.run_once(*guild_id).await {
                Ok(report) => {
                    info!(
                        guild_id,
                        unindexed = report.unindexed,
                        stale = report.stale,
                        pending_delete = report.pending_delete,
                        "reconciler cycle complete"
                    );
                    self.metrics.record_processed("reconciler", 1);
                }
                Err(e) => {
                    warn!(guild_id, error = %e, "reconciler failed for guild");
                    self.metrics.record_error("reconciler");
                }
            }
        }
        self.sweep_orphans(&guild_ids).await;
        Ok(())
    }

    /// One guild's drift-correction pass: the three RS-side populations
    /// (§4.8). The cross-guild orphan sweep runs separately via
    /// `sweep_orphans`, since it needs every active guild at once.
    pub async fn run_once(&self, guild_id: i64) -> crate::rs::RsResult<ReconcileReport> {
        let limit = self.config.batch_limit_per_class;
        let mut report = ReconcileReport::default();

        for kind in [RecordKind::Message, RecordKind::Session, RecordKind::Chunk] {
            let unindexed = self.rs.list_pending(guild_id, kind, PendingKind::Unindexed, limit).await?;
            report.unindexed += unindexed.len();
            for id in unindexed {
                self.enqueue_reindex(guild_id, kind, &id).await;
            }

            // Chunks have no staleness concept (DocumentChunk has no
            // updated_at in the data model, §3) — only Message/Session.
            if !matches!(kind, RecordKind::Chunk) {
                let stale = self.rs.list_pending(guild_id, kind, PendingKind::Stale, limit).await?;
                report.stale += stale.len();
                for id in stale {
                    self.enqueue_reindex(guild_id, kind, &id).await;
                }
            }

            if matches!(kind, RecordKind::Message) {
                let pending_delete = self.rs.list_pending(guild_id, kind, PendingKind::PendingDelete, limit).await?;
                report.pending_delete += pending_delete.len();
                if !pending_delete.is_empty() {
                    let ids: Vec<i64> = pending_delete.iter().filter_map(|s| s.parse().ok()).collect();
                    if let Err(e) = self
                        .jb
                        .enqueue(JobKind::PurgeMessageVectors { guild_id, message_ids: ids }, Priority::High, None, None)
                        .await
                    {
                        warn!(guild_id, error = %e, "failed to enqueue pending-delete purge");
                    }
                }
            }
        }

        let (synced, total) = self.rs.sync_health_counts(guild_id).await?;
        let ratio = if total == 0 { 1.0 } else { synced as f64 / total as f64 };
        self.metrics.record_sync_health(guild_id, ratio);
        if ratio < self.config.healthy_threshold {
            warn!(guild_id, ratio, "guild sync health below threshold");
        }

        Ok(report)
    }

    async fn enqueue_reindex(&self, guild_id: i64, kind: RecordKind, record_id: &str) {
        let result = match kind {
            RecordKind::Message => {
                record_id
                    .parse::<i64>()
                    .map_err(|_| ())
                    .and_then(|message_id| {
                        Ok(JobKind::ReindexSessionFor { guild_id, message_id })
                    })
            }
            RecordKind::Session => Ok(JobKind::EmbedSession { guild_id, session_id: record_id.to_string() }),
            RecordKind::Chunk => {
                // Chunks are re-indexed as part of their owning attachment;
                // there is no standalone per-chunk job kind (§4.7).
                return;
            }
        };

        if let Ok(job) = result {
            if let Err(e) = self.jb.enqueue(job, Priority::Default, None, None).await {
                warn!(guild_id, record_id, error = %e, "failed to enqueue reindex job");
            }
        }
    }

    /// Cross-guild orphan sweep (§4.8 population 4): VS points whose
    /// `guild_id` is not among `active_guild_ids` are deleted outright.
    /// Points whose `guild_id` is active but whose RS-side record has since
    /// had its `vector_key` cleared are left for the next `Unindexed` pass
    /// to re-embed rather than re-verified here per point (§9 — bounded by
    /// `batch_limit_per_class` rather than a full per-point RS lookup).
    async fn sweep_orphans(&self, active_guild_ids: &[i64]) {
        let active: HashSet<i64> = active_guild_ids.iter().copied().collect();
        let points = match self.vs.scroll_all(self.config.batch_limit_per_class as usize).await {
            Ok(points) => points,
            Err(e) => {
                warn!(error = %e, "orphan scroll failed");
                return;
            }
        };

        let mut removed = 0u64;
        for point in points {
            if !active.contains(&point.guild_id) {
                if self.vs.delete(point.guild_id, &point.key).await.is_ok() {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, "reconciler swept orphan vectors");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::jobs::JobConfig;
    use crate::jb::sqlite::SqliteJobBroker;
    use crate::rs::sqlite::SqliteRelationalStore;
    use crate::rs::NewMessage;
    use crate::testing::FakeVectorStore;
    use chrono::Utc;
    use sqlx::SqlitePool;

    async fn setup() -> (SqliteRelationalStore, SqliteJobBroker, SqlitePool) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let rs = SqliteRelationalStore::new(pool.clone());
        let jb = SqliteJobBroker::new(
            pool.clone(),
            JobConfig {
                max_attempts: 3,
                backoff_base_secs: 1,
                backoff_cap_secs: 60,
                visibility_timeout_secs: 300,
                worker_concurrency: 2,
                queue_backpressure_hi: 1000,
                dedup_window_secs: 300,
            },
        );
        (rs, jb, pool)
    }

    fn test_config() -> ReconcilerConfig {
        ReconcilerConfig {
            interval_secs: 900,
            batch_limit_per_class: 100,
            healthy_threshold: 0.95,
        }
    }

    #[tokio::test]
    async fn run_once_enqueues_reindex_for_unindexed_message() {
        let (rs, jb, _pool) = setup().await;
        rs.upsert_guild(1, "g").await.unwrap();
        rs.upsert_channel(10, 1, "c", true).await.unwrap();
        rs.upsert_user(100, "u").await.unwrap();
        rs.upsert_message(&NewMessage {
            id: 5000,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "hello".into(),
            reply_to_id: None,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();

        let rs: Arc<dyn RelationalStore> = Arc::new(rs);
        let jb: Arc<dyn JobBroker> = Arc::new(jb);
        let vs: Arc<dyn VectorStore> = Arc::new(FakeVectorStore::new());
        let metrics = Arc::new(TaskMetrics::new());
        let reconciler = Reconciler::new(rs, vs, jb.clone(), test_config(), metrics);

        let report = reconciler.run_once(1).await.unwrap();
        assert_eq!(report.unindexed, 1);

        let job = jb.reserve().await.unwrap();
        assert!(job.is_some());
        assert!(matches!(job.unwrap().kind, JobKind::ReindexSessionFor { message_id: 5000, .. }));
    }

    #[tokio::test]
    async fn run_once_reports_full_sync_health_when_nothing_pending() {
        let (rs, jb, _pool) = setup().await;
        rs.upsert_guild(2, "g2").await.unwrap();

        let rs: Arc<dyn RelationalStore> = Arc::new(rs);
        let jb: Arc<dyn JobBroker> = Arc::new(jb);
        let vs: Arc<dyn VectorStore> = Arc::new(FakeVectorStore::new());
        let metrics = Arc::new(TaskMetrics::new());
        let reconciler = Reconciler::new(rs, vs, jb, test_config(), metrics.clone());

        let report = reconciler.run_once(2).await.unwrap();
        assert_eq!(report.unindexed, 0);
        assert_eq!(metrics.sync_health_for(2), Some(1.0));
    }

    #[tokio::test]
    async fn sweep_orphans_removes_points_for_inactive_guilds() {
        let (rs, jb, _pool) = setup().await;
        let rs: Arc<dyn RelationalStore> = Arc::new(rs);
        let jb: Arc<dyn JobBroker> = Arc::new(jb);
        let vs = Arc::new(FakeVectorStore::new());
        vs.upsert(crate::vs::VectorPoint::new("orphan-1", 999, vec![0.1, 0.2])).await.unwrap();
        vs.upsert(crate::vs::VectorPoint::new("live-1", 1, vec![0.1, 0.2])).await.unwrap();

        let metrics = Arc::new(TaskMetrics::new());
        let reconciler = Reconciler::new(rs, vs.clone(), jb, test_config(), metrics);

        reconciler.sweep_orphans(&[1]).await;

        assert!(!vs.contains("orphan-1"));
        assert!(vs.contains("live-1"));
    }
}

// tests/common/mod.rs
// Shared fixtures for integration tests: a real SQLite-backed RS+JB against
// an in-memory database, plus the VS/Embedder/Vision test doubles.

use std::sync::Arc;
use std::time::Duration;

use chatindex_core::config::attachments::AttachmentConfig;
use chatindex_core::config::jobs::JobConfig;
use chatindex_core::config::session::SessionConfig;
use chatindex_core::jb::sqlite::SqliteJobBroker;
use chatindex_core::jb::JobBroker;
use chatindex_core::rs::sqlite::SqliteRelationalStore;
use chatindex_core::rs::RelationalStore;
use chatindex_core::testing::{FakeEmbedder, FakeJobBroker, FakeVectorStore, FakeVisionDescriber};
use sqlx::SqlitePool;

pub fn job_config() -> JobConfig {
    JobConfig {
        max_attempts: 3,
        backoff_base_secs: 1,
        backoff_cap_secs: 60,
        visibility_timeout_secs: 300,
        worker_concurrency: 2,
        queue_backpressure_hi: 10_000,
        dedup_window_secs: 300,
    }
}

pub async fn setup_rs_jb() -> (Arc<dyn RelationalStore>, Arc<dyn JobBroker>) {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let rs = SqliteRelationalStore::new(pool.clone());
    let jb = SqliteJobBroker::new(pool, job_config());
    (Arc::new(rs), Arc::new(jb))
}

pub fn fake_vs() -> Arc<FakeVectorStore> {
    Arc::new(FakeVectorStore::new())
}

pub fn fake_embedder(dimension: usize) -> Arc<FakeEmbedder> {
    Arc::new(FakeEmbedder::new(dimension))
}

pub fn fake_vision() -> Arc<FakeVisionDescriber> {
    Arc::new(FakeVisionDescriber::default())
}

pub fn fake_jb(max_attempts: i32) -> Arc<FakeJobBroker> {
    Arc::new(FakeJobBroker::new(max_attempts))
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        time_gap_secs: 900,
        max_tokens: 480,
        semantic_refine_threshold_messages: 20,
        semantic_percentile: 5.0,
        semantic_min_messages: 2,
        semantic_refine_enabled: false,
        window_size: 200,
    }
}

pub fn attachment_config() -> AttachmentConfig {
    AttachmentConfig {
        max_size_text: 1024 * 1024,
        max_size_pdf: 1024 * 1024,
        max_size_image: 1024 * 1024,
        blocked_extensions: vec![".exe".into(), ".bat".into()],
        min_chunk_tokens: 32,
        fetch_timeout_secs: 10,
        vision_timeout_secs: 10,
    }
}

/// Poll `jb.queue_depth(None)` until it hits zero or the timeout elapses.
/// Integration tests run a real worker pool against a real queue, so this
/// stands in for a fixed sleep without hardcoding how long sessionize +
/// embed chains take to settle.
pub async fn wait_for_queue_drain(jb: &Arc<dyn JobBroker>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if jb.queue_depth(None).await.unwrap() == 0 {
            // A job reporting "pending=0" may still be mid-execution on a
            // worker (it reserves before it processes); recheck after a
            // short settle window to catch any follow-on enqueue it makes.
            tokio::time::sleep(Duration::from_millis(100)).await;
            if jb.queue_depth(None).await.unwrap() == 0 {
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("queue did not drain within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

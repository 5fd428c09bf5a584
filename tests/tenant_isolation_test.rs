// Scenario 3: identical content ingested into two guilds must never leak
// across a guild-scoped search.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatindex_core::gateway::events::{InboundEvent, MessageCreate};
use chatindex_core::gateway::GatewayIngestor;
use chatindex_core::metrics::TaskMetrics;
use chatindex_core::vs::{SearchFilter, VectorStore};
use chatindex_core::worker::IndexingWorker;
use chrono::Utc;

fn message_create(event_id: &str, guild_id: i64, message_id: i64, reply_to: Option<i64>) -> InboundEvent {
    InboundEvent::MessageCreate(MessageCreate {
        event_id: event_id.into(),
        guild_id,
        guild_name: format!("guild-{guild_id}"),
        channel_id: 100,
        channel_name: "general".into(),
        author_id: 1,
        author_display_name: "alice".into(),
        author_is_bot: false,
        message_id,
        content: "hello world".into(),
        reply_to_id: reply_to,
        timestamp: Utc::now(),
        attachments: vec![],
    })
}

#[tokio::test]
async fn identical_content_across_guilds_stays_tenant_scoped() {
    let (rs, jb) = common::setup_rs_jb().await;
    let vs = common::fake_vs();
    let embedder = common::fake_embedder(8);
    let vision = common::fake_vision();
    let metrics = Arc::new(TaskMetrics::new());

    let worker = Arc::new(IndexingWorker::new(
        rs.clone(),
        vs.clone(),
        jb.clone(),
        embedder,
        vision,
        common::session_config(),
        common::attachment_config(),
        metrics,
    ));
    let handles = worker.spawn_pool(2);

    let gateway = GatewayIngestor::new(rs.clone(), jb.clone());

    // Two-message sessions in each of two guilds, same content, same ids.
    gateway.handle(message_create("g10-m1", 10, 1, None)).await.unwrap();
    gateway.handle(message_create("g10-m2", 10, 2, Some(1))).await.unwrap();
    gateway.handle(message_create("g20-m1", 20, 1, None)).await.unwrap();
    gateway.handle(message_create("g20-m2", 20, 2, Some(1))).await.unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;

    let guild_10_hits = vs.count(SearchFilter::for_guild(10)).await.unwrap();
    let guild_20_hits = vs.count(SearchFilter::for_guild(20)).await.unwrap();
    assert_eq!(guild_10_hits, 1);
    assert_eq!(guild_20_hits, 1);

    let embedding = vec![0.0f32; 8];
    let results_10 = vs.search(&embedding, SearchFilter::for_guild(10), 10, 0.0).await.unwrap();
    let results_20 = vs.search(&embedding, SearchFilter::for_guild(20), 10, 0.0).await.unwrap();
    assert_eq!(results_10.len(), 1);
    assert_eq!(results_20.len(), 1);
    // Session keys are per-guild UUIDs; identical content in two guilds must
    // never collapse onto the same vector or leak into the other's results.
    assert_ne!(results_10[0].key, results_20[0].key);

    for handle in handles {
        handle.abort();
    }
}

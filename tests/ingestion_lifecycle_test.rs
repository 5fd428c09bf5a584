// Scenario 1 (right-to-be-forgotten): ingest a message, let it sessionize
// and embed, then delete it and confirm the vector and RS state both clear.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatindex_core::gateway::events::{BulkMessageDelete, InboundEvent, MessageCreate};
use chatindex_core::gateway::GatewayIngestor;
use chatindex_core::metrics::TaskMetrics;
use chatindex_core::vs::{SearchFilter, VectorStore};
use chatindex_core::worker::IndexingWorker;
use chrono::Utc;

#[tokio::test]
async fn delete_after_index_leaves_no_vector_trace() {
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
    let now = Utc::now();
    gateway
        .handle(InboundEvent::MessageCreate(MessageCreate {
            event_id: "e1".into(),
            guild_id: 10,
            guild_name: "guild".into(),
            channel_id: 100,
            channel_name: "general".into(),
            author_id: 1,
            author_display_name: "alice".into(),
            author_is_bot: false,
            message_id: 1,
            content: "secret".into(),
            reply_to_id: None,
            timestamp: now,
            attachments: vec![],
        }))
        .await
        .unwrap();
    gateway
        .handle(InboundEvent::MessageCreate(MessageCreate {
            event_id: "e2".into(),
            guild_id: 10,
            guild_name: "guild".into(),
            channel_id: 100,
            channel_name: "general".into(),
            author_id: 2,
            author_display_name: "bob".into(),
            author_is_bot: false,
            message_id: 2,
            content: "reply to secret".into(),
            reply_to_id: Some(1),
            timestamp: now + chrono::Duration::seconds(5),
            attachments: vec![],
        }))
        .await
        .unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;

    let filter = SearchFilter::for_guild(10);
    assert_eq!(vs.count(filter).await.unwrap(), 1, "session should be embedded after sessionize+embed");

    gateway
        .handle(InboundEvent::BulkMessageDelete(BulkMessageDelete {
            event_id: "e3".into(),
            guild_id: 10,
            message_ids: vec![1, 2],
        }))
        .await
        .unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;

    let filter = SearchFilter::for_guild(10);
    assert_eq!(vs.count(filter).await.unwrap(), 0, "deleting the only message should purge its session vector");

    for handle in handles {
        handle.abort();
    }
}

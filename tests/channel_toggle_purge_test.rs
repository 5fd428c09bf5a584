// Scenario 6: turning indexing off for a channel purges every vector that
// channel contributed, without touching other channels in the same guild.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatindex_core::gateway::events::{ChannelIndexingToggled, InboundEvent, MessageCreate};
use chatindex_core::gateway::GatewayIngestor;
use chatindex_core::metrics::TaskMetrics;
use chatindex_core::vs::{SearchFilter, VectorStore};
use chatindex_core::worker::IndexingWorker;
use chrono::Utc;

fn message_create(
    event_id: &str,
    channel_id: i64,
    message_id: i64,
    reply_to: Option<i64>,
) -> InboundEvent {
    InboundEvent::MessageCreate(MessageCreate {
        event_id: event_id.into(),
        guild_id: 10,
        guild_name: "guild".into(),
        channel_id,
        channel_name: format!("channel-{channel_id}"),
        author_id: 1,
        author_display_name: "alice".into(),
        author_is_bot: false,
        message_id,
        content: "chatting away".into(),
        reply_to_id: reply_to,
        timestamp: Utc::now(),
        attachments: vec![],
    })
}

#[tokio::test]
async fn disabling_channel_indexing_purges_only_that_channels_vectors() {
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

    // Channel 100: a two-message session. Channel 200: a separate two-message session.
    gateway.handle(message_create("c100-m1", 100, 1, None)).await.unwrap();
    gateway.handle(message_create("c100-m2", 100, 2, Some(1))).await.unwrap();
    gateway.handle(message_create("c200-m1", 200, 3, None)).await.unwrap();
    gateway.handle(message_create("c200-m2", 200, 4, Some(3))).await.unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;
    assert_eq!(vs.count(SearchFilter::for_guild(10)).await.unwrap(), 2);

    gateway
        .handle(InboundEvent::ChannelIndexingToggled(ChannelIndexingToggled {
            event_id: "toggle1".into(),
            guild_id: 10,
            channel_id: 100,
            channel_name: "channel-100".into(),
            is_indexed: false,
        }))
        .await
        .unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;

    let embedding = vec![0.0f32; 8];
    let remaining = vs.search(&embedding, SearchFilter::for_guild(10), 10, 0.0).await.unwrap();
    assert_eq!(remaining.len(), 1, "only channel 100's session vector should be purged");
    assert_eq!(
        remaining[0].payload.get("channel_id").and_then(|v| v.as_i64()),
        Some(200),
        "the surviving vector should belong to the untouched channel"
    );

    for handle in handles {
        handle.abort();
    }
}

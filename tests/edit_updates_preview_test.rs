// Scenario 2: editing a message's content re-embeds its session and the
// stored preview reflects the edited text, not the original.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatindex_core::gateway::events::{InboundEvent, MessageCreate, MessageEdit};
use chatindex_core::gateway::GatewayIngestor;
use chatindex_core::metrics::TaskMetrics;
use chatindex_core::vs::{SearchFilter, VectorStore};
use chatindex_core::worker::IndexingWorker;
use chrono::Utc;

#[tokio::test]
async fn editing_a_message_refreshes_the_session_preview() {
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
            content: "original content".into(),
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
            content: "second message".into(),
            reply_to_id: Some(1),
            timestamp: now + chrono::Duration::seconds(5),
            attachments: vec![],
        }))
        .await
        .unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;
    assert_eq!(vs.count(SearchFilter::for_guild(10)).await.unwrap(), 1);

    gateway
        .handle(InboundEvent::MessageEdit(MessageEdit {
            event_id: "e3".into(),
            guild_id: 10,
            channel_id: 100,
            message_id: 1,
            author_is_bot: false,
            new_content: "edited content mentioning pineapples".into(),
        }))
        .await
        .unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;

    let embedding = vec![0.0f32; 8];
    let results = vs.search(&embedding, SearchFilter::for_guild(10), 10, 0.0).await.unwrap();
    assert_eq!(results.len(), 1, "edit should re-embed the same session, not spawn a second vector");
    let preview = results[0].payload.get("preview").and_then(|v| v.as_str()).unwrap();
    assert!(preview.contains("pineapples"), "preview should reflect the edited content: {preview}");
    assert!(!preview.contains("original content"), "preview should not retain stale content: {preview}");

    for handle in handles {
        handle.abort();
    }
}

// Scenario 4: an attachment with a blocked extension is rejected before any
// bytes are fetched, and never produces a vector.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chatindex_core::gateway::events::{InboundAttachment, InboundEvent, MessageCreate};
use chatindex_core::gateway::GatewayIngestor;
use chatindex_core::metrics::TaskMetrics;
use chatindex_core::rs::ProcessingStatus;
use chatindex_core::vs::{SearchFilter, VectorStore};
use chatindex_core::worker::IndexingWorker;
use chrono::Utc;

#[tokio::test]
async fn blocked_extension_fails_without_fetching() {
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
    let handles = worker.spawn_pool(1);

    let gateway = GatewayIngestor::new(rs.clone(), jb.clone());
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
            content: "here's a file".into(),
            reply_to_id: None,
            timestamp: Utc::now(),
            attachments: vec![InboundAttachment {
                source_url: "https://example.com/payload.exe".into(),
                mime: "application/octet-stream".into(),
                size: 1024,
            }],
        }))
        .await
        .unwrap();

    common::wait_for_queue_drain(&jb, Duration::from_secs(5)).await;

    let attachment = rs.get_attachment(1).await.unwrap();
    assert_eq!(attachment.processing_status, ProcessingStatus::Failed);
    assert_eq!(attachment.processing_error.as_deref(), Some("blocked_extension"));
    assert_eq!(vs.count(SearchFilter::for_guild(10)).await.unwrap(), 0);

    for handle in handles {
        handle.abort();
    }
}

// src/gateway/mod.rs
// Gateway Ingestor (§4.6): the single entry point translating external
// platform events into RS mutations and JB enqueues. Stateless; any number
// of instances can run against the same RS/JB.

pub mod error;
pub mod events;

pub use error::{IngestError, IngestResult};
pub use events::*;

use std::sync::Arc;
use tracing::{info, instrument};

use crate::jb::{JobBroker, JobKind, Priority};
use crate::rs::{NewAttachment, NewMessage, RelationalStore};

pub struct GatewayIngestor {
    rs: Arc<dyn RelationalStore>,
    jb: Arc<dyn JobBroker>,
}

impl GatewayIngestor {
    pub fn new(rs: Arc<dyn RelationalStore>, jb: Arc<dyn JobBroker>) -> Self {
        Self { rs, jb }
    }

    #[instrument(skip(self, event), fields(event_id = %event.event_id(), guild_id = event.guild_id()))]
    pub async fn handle(&self, event: InboundEvent) -> IngestResult<()> {
        match event {
            InboundEvent::MessageCreate(e) => self.handle_message_create(e).await,
            InboundEvent::MessageEdit(e) => self.handle_message_edit(e).await,
            InboundEvent::MessageDelete(e) => self.handle_message_delete(e).await,
            InboundEvent::BulkMessageDelete(e) => self.handle_bulk_delete(e).await,
            InboundEvent::ChannelIndexingToggled(e) => self.handle_channel_toggle(e).await,
            InboundEvent::ChannelDeleted(e) => self.handle_channel_deleted(e).await,
        }
    }

    async fn handle_message_create(&self, e: MessageCreate) -> IngestResult<()> {
        self.rs.upsert_guild(e.guild_id, &e.guild_name).await?;
        self.rs
            .upsert_channel(e.channel_id, e.guild_id, &e.channel_name, true)
            .await?;
        self.rs.upsert_user(e.author_id, &e.author_display_name).await?;
        let channel = self.rs.get_channel(e.channel_id).await?;

        self.rs
            .upsert_message(&NewMessage {
                id: e.message_id,
                channel_id: e.channel_id,
                guild_id: e.guild_id,
                author_id: e.author_id,
                content: e.content,
                reply_to_id: e.reply_to_id,
                timestamp: e.timestamp,
            })
            .await?;

        for attachment in e.attachments {
            let attachment_id = self
                .rs
                .upsert_attachment(&NewAttachment {
                    message_id: e.message_id,
                    guild_id: e.guild_id,
                    source_url: attachment.source_url,
                    mime: attachment.mime.clone(),
                    size: attachment.size,
                    source_type: crate::rs::AttachmentSourceType::from_mime(&attachment.mime, "")
                        .unwrap_or(crate::rs::AttachmentSourceType::Text),
                })
                .await?;

            self.jb
                .enqueue(
                    JobKind::IngestAttachment { guild_id: e.guild_id, attachment_id },
                    Priority::Default,
                    None,
                    None,
                )
                .await?;
        }

        if channel.is_indexed {
            self.jb
                .enqueue(
                    JobKind::Sessionize {
                        guild_id: e.guild_id,
                        channel_id: e.channel_id,
                        around_message_id: Some(e.message_id),
                    },
                    Priority::Default,
                    Some(format!("sz:{}", e.channel_id)),
                    None,
                )
                .await?;
        }

        Ok(())
    }

    async fn handle_message_edit(&self, e: MessageEdit) -> IngestResult<()> {
        if e.author_is_bot {
            return Ok(());
        }

        let prior = self
            .rs
            .upsert_message(&NewMessage {
                id: e.message_id,
                channel_id: e.channel_id,
                guild_id: e.guild_id,
                author_id: 0,
                content: e.new_content.clone(),
                reply_to_id: None,
                timestamp: chrono::Utc::now(),
            })
            .await?;

        if !prior.content_changed(&e.new_content) {
            return Ok(());
        }

        self.jb
            .enqueue(
                JobKind::ReindexSessionFor { guild_id: e.guild_id, message_id: e.message_id },
                Priority::Default,
                None,
                None,
            )
            .await?;

        Ok(())
    }

    async fn handle_message_delete(&self, e: MessageDelete) -> IngestResult<()> {
        let deleted = self.rs.soft_delete_messages(e.guild_id, &[e.message_id]).await?;
        if !deleted.ids.is_empty() {
            self.jb
                .enqueue(
                    JobKind::PurgeMessageVectors { guild_id: e.guild_id, message_ids: deleted.ids },
                    Priority::High,
                    None,
                    None,
                )
                .await?;
        }
        Ok(())
    }

    async fn handle_bulk_delete(&self, e: BulkMessageDelete) -> IngestResult<()> {
        let deleted = self.rs.soft_delete_messages(e.guild_id, &e.message_ids).await?;
        if !deleted.ids.is_empty() {
            self.jb
                .enqueue(
                    JobKind::PurgeMessageVectors { guild_id: e.guild_id, message_ids: deleted.ids },
                    Priority::High,
                    None,
                    None,
                )
                .await?;
        }
        Ok(())
    }

    async fn handle_channel_toggle(&self, e: ChannelIndexingToggled) -> IngestResult<()> {
        self.rs.set_channel_indexed(e.guild_id, e.channel_id, e.is_indexed).await?;

        if e.is_indexed {
            self.jb
                .enqueue(
                    JobKind::BackfillChannel { guild_id: e.guild_id, channel_id: e.channel_id, since_message_id: None },
                    Priority::Low,
                    Some(format!("backfill:{}", e.channel_id)),
                    None,
                )
                .await?;
        } else {
            self.jb
                .enqueue(
                    JobKind::PurgeChannelVectors { guild_id: e.guild_id, channel_id: e.channel_id },
                    Priority::High,
                    None,
                    None,
                )
                .await?;
        }

        info!(channel_id = e.channel_id, is_indexed = e.is_indexed, "channel indexing toggled");
        Ok(())
    }

    async fn handle_channel_deleted(&self, e: ChannelDeleted) -> IngestResult<()> {
        self.rs.mark_channel_deleted(e.guild_id, e.channel_id).await?;
        self.rs.bulk_soft_delete_channel_messages(e.guild_id, e.channel_id).await?;
        self.jb
            .enqueue(
                JobKind::PurgeChannelVectors { guild_id: e.guild_id, channel_id: e.channel_id },
                Priority::High,
                None,
                None,
            )
            .await?;
        Ok(())
    }
}

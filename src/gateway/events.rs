// src/gateway/events.rs
// InboundEvent: serde-tagged enum mirroring the §6 inbound event shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    pub event_id: String,
    pub guild_id: i64,
    pub guild_name: String,
    pub channel_id: i64,
    pub channel_name: String,
    pub author_id: i64,
    pub author_display_name: String,
    pub author_is_bot: bool,
    pub message_id: i64,
    pub content: String,
    pub reply_to_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<InboundAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundAttachment {
    pub source_url: String,
    pub mime: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEdit {
    pub event_id: String,
    pub guild_id: i64,
    pub channel_id: i64,
    pub message_id: i64,
    pub author_is_bot: bool,
    pub new_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelete {
    pub event_id: String,
    pub guild_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMessageDelete {
    pub event_id: String,
    pub guild_id: i64,
    pub message_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIndexingToggled {
    pub event_id: String,
    pub guild_id: i64,
    pub channel_id: i64,
    pub channel_name: String,
    pub is_indexed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDeleted {
    pub event_id: String,
    pub guild_id: i64,
    pub channel_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    MessageCreate(MessageCreate),
    MessageEdit(MessageEdit),
    MessageDelete(MessageDelete),
    BulkMessageDelete(BulkMessageDelete),
    ChannelIndexingToggled(ChannelIndexingToggled),
    ChannelDeleted(ChannelDeleted),
}

impl InboundEvent {
    pub fn event_id(&self) -> &str {
        match self {
            InboundEvent::MessageCreate(e) => &e.event_id,
            InboundEvent::MessageEdit(e) => &e.event_id,
            InboundEvent::MessageDelete(e) => &e.event_id,
            InboundEvent::BulkMessageDelete(e) => &e.event_id,
            InboundEvent::ChannelIndexingToggled(e) => &e.event_id,
            InboundEvent::ChannelDeleted(e) => &e.event_id,
        }
    }

    pub fn guild_id(&self) -> i64 {
        match self {
            InboundEvent::MessageCreate(e) => e.guild_id,
            InboundEvent::MessageEdit(e) => e.guild_id,
            InboundEvent::MessageDelete(e) => e.guild_id,
            InboundEvent::BulkMessageDelete(e) => e.guild_id,
            InboundEvent::ChannelIndexingToggled(e) => e.guild_id,
            InboundEvent::ChannelDeleted(e) => e.guild_id,
        }
    }
}

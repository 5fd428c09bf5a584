// src/rs/mod.rs
// Relational Store (§4.1): the durable source of truth. All state visible
// to the rest of the system passes through here first.

pub mod error;
pub mod sqlite;
pub mod types;

pub use error::{RsError, RsResult};
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The three record kinds that carry `vector_key`/`indexed_at` and therefore
/// participate in indexing and reconciliation (§3, §4.1, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Message,
    Session,
    Chunk,
}

/// Outcome of `upsert_message`: what the row looked like before this write,
/// so the Gateway Ingestor (§4.6) can decide whether to enqueue re-indexing.
#[derive(Debug, Clone)]
pub struct PriorMessageState {
    pub existed: bool,
    pub content: Option<String>,
    pub vector_key: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

impl PriorMessageState {
    pub fn content_changed(&self, new_content: &str) -> bool {
        match &self.content {
            Some(prev) => prev != new_content,
            None => true,
        }
    }
}

/// Durable storage seam for guilds, channels, users, messages, sessions,
/// attachments, and document chunks. Mirrors the teacher's `MemoryStore`
/// trait seam: business logic depends on this trait, never on `SqlitePool`
/// directly, so an alternate backend can be substituted without touching
/// the Gateway Ingestor, Indexing Worker, or Reconciler.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn upsert_guild(&self, guild_id: i64, name: &str) -> RsResult<()>;

    async fn upsert_channel(
        &self,
        channel_id: i64,
        guild_id: i64,
        name: &str,
        is_indexed: bool,
    ) -> RsResult<()>;

    async fn upsert_user(&self, user_id: i64, display_name: &str) -> RsResult<()>;

    async fn get_channel(&self, channel_id: i64) -> RsResult<Channel>;

    async fn get_user(&self, user_id: i64) -> RsResult<User>;

    /// Insert or update a message. Returns the row's state *before* this
    /// write so the caller can decide whether content actually changed.
    /// Idempotent: replaying the same id with unchanged content is a no-op
    /// beyond the `updated_at` bump it still performs is skipped too.
    async fn upsert_message(&self, message: &NewMessage) -> RsResult<PriorMessageState>;

    /// Soft-delete specific messages within a guild. Sets `is_deleted`,
    /// `deleted_at`, and redacts `content`. Returns the subset that carried
    /// a non-null `vector_key` at the time of deletion — these need a VS
    /// purge job.
    async fn soft_delete_messages(&self, guild_id: i64, ids: &[i64]) -> RsResult<DeletedMessages>;

    /// As above for every live message in a channel. Used when a channel's
    /// `is_indexed` flips off, or the channel itself is deleted.
    async fn bulk_soft_delete_channel_messages(
        &self,
        guild_id: i64,
        channel_id: i64,
    ) -> RsResult<DeletedMessages>;

    async fn set_channel_indexed(&self, guild_id: i64, channel_id: i64, is_indexed: bool) -> RsResult<()>;

    /// Administrative control (§6): flips a guild's `is_active` flag.
    /// `list_active_guild_ids` (and therefore the Reconciler and any
    /// tenant-wide sweep) only ever sees guilds with `is_active = 1`.
    async fn set_guild_active(&self, guild_id: i64, is_active: bool) -> RsResult<()>;

    async fn mark_channel_deleted(&self, guild_id: i64, channel_id: i64) -> RsResult<()>;

    /// Stamp `vector_key` and `indexed_at=now`. Fails with `RsError::Conflict`
    /// if the record was soft-deleted between enqueue and execute (the
    /// caller should treat that as a no-op success, not a retry).
    async fn mark_indexed(&self, kind: RecordKind, record_id: &str, vector_key: &str) -> RsResult<()>;

    /// Compare-and-swap clear of `vector_key`, used after a VS delete
    /// succeeds. No-ops (does not error) if the current key no longer
    /// matches `expected_key` — another writer already moved it on.
    async fn clear_vector_key(&self, kind: RecordKind, record_id: &str, expected_key: &str) -> RsResult<()>;

    /// Records needing work, per the drift classes in §3/§4.8.
    async fn list_pending(
        &self,
        guild_id: i64,
        kind: RecordKind,
        pending: crate::rs::types::PendingKind,
        limit: i64,
    ) -> RsResult<Vec<String>>;

    /// Recent messages in a channel for sessionizing, ordered by id.
    async fn read_session_window(
        &self,
        channel_id: i64,
        since_id: Option<i64>,
        until_time: Option<DateTime<Utc>>,
        limit: i64,
    ) -> RsResult<Vec<Message>>;

    async fn get_message(&self, message_id: i64) -> RsResult<Message>;

    /// Outbound query interface (§6): `list_recent`. Read-only, tenant- and
    /// channel-scoped, bounded by `[since, until]` on `timestamp`.
    async fn list_recent_messages(
        &self,
        guild_id: i64,
        channel_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RsResult<Vec<Message>>;

    async fn upsert_attachment(&self, attachment: &NewAttachment) -> RsResult<i64>;

    async fn set_attachment_status(
        &self,
        attachment_id: i64,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> RsResult<()>;

    async fn set_attachment_extraction(
        &self,
        attachment_id: i64,
        extracted_text: Option<&str>,
        description: Option<&str>,
    ) -> RsResult<()>;

    async fn get_attachment(&self, attachment_id: i64) -> RsResult<Attachment>;

    async fn upsert_document_chunk(&self, chunk: &NewDocumentChunk) -> RsResult<()>;

    async fn list_document_chunks(&self, attachment_id: i64) -> RsResult<Vec<DocumentChunk>>;

    async fn upsert_session(&self, session: &NewMessageSession, message_ids: &[i64]) -> RsResult<()>;

    async fn get_session(&self, session_id: &str) -> RsResult<MessageSession>;

    async fn read_session_messages(&self, session_id: &str) -> RsResult<Vec<Message>>;

    /// The session (if any) a message currently belongs to — used by
    /// `reindex_session_for` (§4.7) to decide between bumping an existing
    /// session or falling back to a fresh `sessionize`.
    async fn find_session_for_message(&self, message_id: i64) -> RsResult<Option<MessageSession>>;

    /// Every session whose message membership intersects `message_ids`,
    /// used by `purge_message_vectors` (§4.7) to find vectors to drop.
    async fn find_sessions_overlapping_messages(
        &self,
        guild_id: i64,
        message_ids: &[i64],
    ) -> RsResult<Vec<MessageSession>>;

    async fn delete_session(&self, session_id: &str) -> RsResult<()>;

    /// Attachments whose parent message is in `message_ids`, used to reach
    /// the document chunks that also need purging alongside a message.
    async fn list_attachments_for_messages(&self, message_ids: &[i64]) -> RsResult<Vec<Attachment>>;

    /// Null out `vector_key`/`indexed_at` for every message and session in
    /// a channel, used after a channel-wide VS purge (§4.7
    /// `purge_channel_vectors`) so RS and VS agree again.
    async fn clear_channel_vector_keys(&self, guild_id: i64, channel_id: i64) -> RsResult<()>;

    /// All sessions/messages/chunks in a guild whose `vector_key` references
    /// a VS point that the Reconciler's orphan sweep is about to delete —
    /// used to null them back out afterward.
    async fn clear_vector_keys_by_value(&self, guild_id: i64, keys: &[String]) -> RsResult<()>;

    /// Count of guild messages whose indexed state matches the intended
    /// post-write state, vs. total — input to the Reconciler's sync-health
    /// metric (§4.8).
    async fn sync_health_counts(&self, guild_id: i64) -> RsResult<(i64, i64)>;

    async fn list_active_guild_ids(&self) -> RsResult<Vec<i64>>;
}

/// Fields required to upsert a message; separate from `Message` because the
/// caller never supplies `vector_key`/`indexed_at`/`is_deleted` directly.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: i64,
    pub channel_id: i64,
    pub guild_id: i64,
    pub author_id: i64,
    pub content: String,
    pub reply_to_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub message_id: i64,
    pub guild_id: i64,
    pub source_url: String,
    pub mime: String,
    pub size: i64,
    pub source_type: AttachmentSourceType,
}

#[derive(Debug, Clone)]
pub struct NewDocumentChunk {
    pub id: String,
    pub attachment_id: i64,
    pub guild_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub parent_chunk_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessageSession {
    pub id: String,
    pub guild_id: i64,
    pub channel_id: i64,
    pub start_message_id: i64,
    pub end_message_id: i64,
    pub message_count: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: Option<String>,
}

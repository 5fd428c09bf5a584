// src/rs/sqlite.rs
// SqliteRelationalStore: the sole concrete RelationalStore implementation,
// grounded in the teacher's SqliteMemoryStore delegation style (one pool,
// operations expressed as plain `sqlx::query!`-style calls rather than an
// ORM). Row-level serialization per message/session id (§5) comes from
// wrapping each read-then-write in a `BEGIN IMMEDIATE` transaction, which
// SQLite resolves to a single writer at a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json;
use sqlx::{Row, SqlitePool};

use super::{
    error::{RsError, RsResult},
    types::*,
    NewAttachment, NewDocumentChunk, NewMessage, NewMessageSession, PriorMessageState, RecordKind,
    RelationalStore,
};

pub struct SqliteRelationalStore {
    pool: SqlitePool,
}

impl SqliteRelationalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> RsResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RsError::Invalid(format!("migration failed: {e}")))
    }

    fn record_table(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Message => "messages",
            RecordKind::Session => "message_sessions",
            RecordKind::Chunk => "document_chunks",
        }
    }

    fn record_id_column(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Message => "id",
            RecordKind::Session => "id",
            RecordKind::Chunk => "id",
        }
    }
}

#[async_trait]
impl RelationalStore for SqliteRelationalStore {
    async fn upsert_guild(&self, guild_id: i64, name: &str) -> RsResult<()> {
        sqlx::query(
            "INSERT INTO guilds (id, name, is_active, created_at) VALUES (?, ?, 1, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(guild_id)
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_channel(
        &self,
        channel_id: i64,
        guild_id: i64,
        name: &str,
        is_indexed: bool,
    ) -> RsResult<()> {
        sqlx::query(
            "INSERT INTO channels (id, guild_id, name, is_indexed, is_deleted, created_at)
             VALUES (?, ?, ?, ?, 0, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(channel_id)
        .bind(guild_id)
        .bind(name)
        .bind(is_indexed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user_id: i64, display_name: &str) -> RsResult<()> {
        sqlx::query(
            "INSERT INTO users (id, display_name, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_channel(&self, channel_id: i64) -> RsResult<Channel> {
        let row = sqlx::query("SELECT id, guild_id, name, is_indexed, is_deleted, created_at FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RsError::NotFound(format!("channel {channel_id}")))?;
        Ok(Channel {
            id: row.try_get("id")?,
            guild_id: row.try_get("guild_id")?,
            name: row.try_get("name")?,
            is_indexed: row.try_get("is_indexed")?,
            is_deleted: row.try_get("is_deleted")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn get_user(&self, user_id: i64) -> RsResult<User> {
        let row = sqlx::query("SELECT id, display_name, updated_at FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RsError::NotFound(format!("user {user_id}")))?;
        Ok(User {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn upsert_message(&self, message: &NewMessage) -> RsResult<PriorMessageState> {
        let mut tx = self.pool.begin().await?;

        let prior = sqlx::query(
            "SELECT content, vector_key, updated_at, is_deleted FROM messages WHERE id = ?",
        )
        .bind(message.id)
        .fetch_optional(&mut *tx)
        .await?;

        let prior_state = match &prior {
            Some(row) => PriorMessageState {
                existed: true,
                content: Some(row.try_get::<String, _>("content")?),
                vector_key: row.try_get::<Option<String>, _>("vector_key")?,
                updated_at: Some(row.try_get("updated_at")?),
                is_deleted: row.try_get::<bool, _>("is_deleted")?,
            },
            None => PriorMessageState {
                existed: false,
                content: None,
                vector_key: None,
                updated_at: None,
                is_deleted: false,
            },
        };

        let content_changed = prior_state.content_changed(&message.content);
        let now = Utc::now();

        if !prior_state.existed {
            sqlx::query(
                "INSERT INTO messages (
                    id, channel_id, guild_id, author_id, content, reply_to_id,
                    timestamp, is_deleted, deleted_at, vector_key, indexed_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, NULL, NULL, ?)",
            )
            .bind(message.id)
            .bind(message.channel_id)
            .bind(message.guild_id)
            .bind(message.author_id)
            .bind(&message.content)
            .bind(message.reply_to_id)
            .bind(message.timestamp)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        } else if content_changed {
            sqlx::query("UPDATE messages SET content = ?, updated_at = ? WHERE id = ?")
                .bind(&message.content)
                .bind(now)
                .bind(message.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(prior_state)
    }

    async fn soft_delete_messages(&self, guild_id: i64, ids: &[i64]) -> RsResult<DeletedMessages> {
        if ids.is_empty() {
            return Ok(DeletedMessages::default());
        }
        let mut tx = self.pool.begin().await?;
        let mut out = DeletedMessages::default();
        let now = Utc::now();

        for &id in ids {
            let row = sqlx::query(
                "SELECT vector_key FROM messages WHERE id = ? AND guild_id = ? AND is_deleted = 0",
            )
            .bind(id)
            .bind(guild_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else { continue };
            let vector_key: Option<String> = row.try_get("vector_key")?;

            sqlx::query(
                "UPDATE messages SET is_deleted = 1, deleted_at = ?, content = '[deleted]', updated_at = ?
                 WHERE id = ? AND guild_id = ?",
            )
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(guild_id)
            .execute(&mut *tx)
            .await?;

            out.ids.push(id);
            if let Some(key) = vector_key {
                out.vector_keys_to_purge.push(key);
            }
        }

        tx.commit().await?;
        Ok(out)
    }

    async fn bulk_soft_delete_channel_messages(
        &self,
        guild_id: i64,
        channel_id: i64,
    ) -> RsResult<DeletedMessages> {
        let ids: Vec<i64> = sqlx::query(
            "SELECT id FROM messages WHERE channel_id = ? AND guild_id = ? AND is_deleted = 0",
        )
        .bind(channel_id)
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.try_get::<i64, _>("id"))
        .collect::<Result<_, _>>()?;

        self.soft_delete_messages(guild_id, &ids).await
    }

    async fn set_channel_indexed(&self, guild_id: i64, channel_id: i64, is_indexed: bool) -> RsResult<()> {
        sqlx::query("UPDATE channels SET is_indexed = ? WHERE id = ? AND guild_id = ?")
            .bind(is_indexed)
            .bind(channel_id)
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_guild_active(&self, guild_id: i64, is_active: bool) -> RsResult<()> {
        sqlx::query("UPDATE guilds SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_channel_deleted(&self, guild_id: i64, channel_id: i64) -> RsResult<()> {
        sqlx::query("UPDATE channels SET is_deleted = 1 WHERE id = ? AND guild_id = ?")
            .bind(channel_id)
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_indexed(&self, kind: RecordKind, record_id: &str, vector_key: &str) -> RsResult<()> {
        let table = Self::record_table(kind);
        let id_col = Self::record_id_column(kind);
        let now = Utc::now();

        let deleted_check = if matches!(kind, RecordKind::Message) {
            format!(
                "SELECT is_deleted FROM {table} WHERE {id_col} = ? AND is_deleted = 1",
            )
        } else {
            String::new()
        };

        if !deleted_check.is_empty() {
            let deleted = sqlx::query(&deleted_check)
                .bind(record_id.parse::<i64>().map_err(|e| RsError::Invalid(e.to_string()))?)
                .fetch_optional(&self.pool)
                .await?;
            if deleted.is_some() {
                return Err(RsError::Conflict(format!("{table} {record_id} is soft-deleted")));
            }
        }

        let query = format!("UPDATE {table} SET vector_key = ?, indexed_at = ? WHERE {id_col} = ?");
        let result = if matches!(kind, RecordKind::Session) || matches!(kind, RecordKind::Chunk) {
            sqlx::query(&query)
                .bind(vector_key)
                .bind(now)
                .bind(record_id)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query(&query)
                .bind(vector_key)
                .bind(now)
                .bind(record_id.parse::<i64>().map_err(|e| RsError::Invalid(e.to_string()))?)
                .execute(&self.pool)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(RsError::NotFound(format!("{table} {record_id}")));
        }
        Ok(())
    }

    async fn clear_vector_key(&self, kind: RecordKind, record_id: &str, expected_key: &str) -> RsResult<()> {
        let table = Self::record_table(kind);
        let id_col = Self::record_id_column(kind);
        let query = format!(
            "UPDATE {table} SET vector_key = NULL WHERE {id_col} = ? AND vector_key = ?"
        );

        if matches!(kind, RecordKind::Session) || matches!(kind, RecordKind::Chunk) {
            sqlx::query(&query)
                .bind(record_id)
                .bind(expected_key)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(&query)
                .bind(record_id.parse::<i64>().map_err(|e| RsError::Invalid(e.to_string()))?)
                .bind(expected_key)
                .execute(&self.pool)
                .await?;
        }
        // Intentionally not erroring on rows_affected() == 0: another writer
        // already moved the key on, which is the expected race (§4.1).
        Ok(())
    }

    async fn list_pending(
        &self,
        guild_id: i64,
        kind: RecordKind,
        pending: PendingKind,
        limit: i64,
    ) -> RsResult<Vec<String>> {
        let table = Self::record_table(kind);
        let id_col = Self::record_id_column(kind);

        let where_clause = match (kind, pending) {
            (RecordKind::Message, PendingKind::Unindexed) => {
                "is_deleted = 0 AND vector_key IS NULL"
            }
            (RecordKind::Message, PendingKind::Stale) => {
                "is_deleted = 0 AND vector_key IS NOT NULL AND updated_at > indexed_at"
            }
            (RecordKind::Message, PendingKind::PendingDelete) => {
                "is_deleted = 1 AND vector_key IS NOT NULL"
            }
            (_, PendingKind::Unindexed) => "vector_key IS NULL",
            (_, PendingKind::Stale) => "vector_key IS NOT NULL AND updated_at > indexed_at",
            (_, PendingKind::PendingDelete) => "1 = 0",
        };

        let query = format!(
            "SELECT {id_col} FROM {table} WHERE guild_id = ? AND {where_clause} LIMIT ?"
        );

        let rows = sqlx::query(&query)
            .bind(guild_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                if matches!(kind, RecordKind::Session) || matches!(kind, RecordKind::Chunk) {
                    row.try_get::<String, _>(0).map_err(RsError::from)
                } else {
                    row.try_get::<i64, _>(0)
                        .map(|v| v.to_string())
                        .map_err(RsError::from)
                }
            })
            .collect()
    }

    async fn read_session_window(
        &self,
        channel_id: i64,
        since_id: Option<i64>,
        until_time: Option<chrono::DateTime<Utc>>,
        limit: i64,
    ) -> RsResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, channel_id, guild_id, author_id, content, reply_to_id, timestamp,
                    is_deleted, deleted_at, vector_key, indexed_at, updated_at
             FROM messages
             WHERE channel_id = ? AND is_deleted = 0
               AND (?1 IS NULL OR id > ?1)
               AND (?2 IS NULL OR timestamp <= ?2)
             ORDER BY id ASC
             LIMIT ?3",
        )
        .bind(channel_id)
        .bind(since_id)
        .bind(until_time)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn list_recent_messages(
        &self,
        guild_id: i64,
        channel_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RsResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, channel_id, guild_id, author_id, content, reply_to_id, timestamp,
                    is_deleted, deleted_at, vector_key, indexed_at, updated_at
             FROM messages
             WHERE guild_id = ? AND channel_id = ? AND is_deleted = 0
               AND timestamp >= ? AND timestamp <= ?
             ORDER BY timestamp ASC",
        )
        .bind(guild_id)
        .bind(channel_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn get_message(&self, message_id: i64) -> RsResult<Message> {
        let row = sqlx::query(
            "SELECT id, channel_id, guild_id, author_id, content, reply_to_id, timestamp,
                    is_deleted, deleted_at, vector_key, indexed_at, updated_at
             FROM messages WHERE id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RsError::NotFound(format!("message {message_id}")))?;
        row_to_message(row)
    }

    async fn upsert_attachment(&self, attachment: &NewAttachment) -> RsResult<i64> {
        let result = sqlx::query(
            "INSERT INTO attachments (message_id, guild_id, source_url, mime, size, source_type, processing_status, vector_keys, is_deleted)
             VALUES (?, ?, ?, ?, ?, ?, 'pending', '[]', 0)",
        )
        .bind(attachment.message_id)
        .bind(attachment.guild_id)
        .bind(&attachment.source_url)
        .bind(&attachment.mime)
        .bind(attachment.size)
        .bind(attachment.source_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn set_attachment_status(
        &self,
        attachment_id: i64,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> RsResult<()> {
        sqlx::query("UPDATE attachments SET processing_status = ?, processing_error = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(error)
            .bind(attachment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_attachment_extraction(
        &self,
        attachment_id: i64,
        extracted_text: Option<&str>,
        description: Option<&str>,
    ) -> RsResult<()> {
        sqlx::query("UPDATE attachments SET extracted_text = ?, description = ? WHERE id = ?")
            .bind(extracted_text)
            .bind(description)
            .bind(attachment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_attachment(&self, attachment_id: i64) -> RsResult<Attachment> {
        let row = sqlx::query(
            "SELECT id, message_id, guild_id, source_url, mime, size, source_type,
                    processing_status, processing_error, extracted_text, description,
                    vector_keys, is_deleted
             FROM attachments WHERE id = ?",
        )
        .bind(attachment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RsError::NotFound(format!("attachment {attachment_id}")))?;

        let vector_keys: String = row.try_get("vector_keys")?;
        let source_type: String = row.try_get("source_type")?;
        let processing_status: String = row.try_get("processing_status")?;

        Ok(Attachment {
            id: row.try_get("id")?,
            message_id: row.try_get("message_id")?,
            guild_id: row.try_get("guild_id")?,
            source_url: row.try_get("source_url")?,
            mime: row.try_get("mime")?,
            size: row.try_get("size")?,
            source_type: source_type.parse().map_err(RsError::Invalid)?,
            processing_status: processing_status.parse().map_err(RsError::Invalid)?,
            processing_error: row.try_get("processing_error")?,
            extracted_text: row.try_get("extracted_text")?,
            description: row.try_get("description")?,
            vector_keys: serde_json::from_str(&vector_keys).unwrap_or_default(),
            is_deleted: row.try_get("is_deleted")?,
        })
    }

    async fn upsert_document_chunk(&self, chunk: &NewDocumentChunk) -> RsResult<()> {
        sqlx::query(
            "INSERT INTO document_chunks (id, attachment_id, guild_id, chunk_index, chunk_text, parent_chunk_id, vector_key, indexed_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, NULL)
             ON CONFLICT(id) DO UPDATE SET chunk_text = excluded.chunk_text",
        )
        .bind(&chunk.id)
        .bind(chunk.attachment_id)
        .bind(chunk.guild_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.chunk_text)
        .bind(&chunk.parent_chunk_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_document_chunks(&self, attachment_id: i64) -> RsResult<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            "SELECT id, attachment_id, guild_id, chunk_index, chunk_text, parent_chunk_id, vector_key, indexed_at
             FROM document_chunks WHERE attachment_id = ? ORDER BY chunk_index ASC",
        )
        .bind(attachment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DocumentChunk {
                    id: row.try_get("id")?,
                    attachment_id: row.try_get("attachment_id")?,
                    guild_id: row.try_get("guild_id")?,
                    chunk_index: row.try_get("chunk_index")?,
                    chunk_text: row.try_get("chunk_text")?,
                    parent_chunk_id: row.try_get("parent_chunk_id")?,
                    vector_key: row.try_get("vector_key")?,
                    indexed_at: row.try_get("indexed_at")?,
                })
            })
            .collect()
    }

    async fn upsert_session(&self, session: &NewMessageSession, message_ids: &[i64]) -> RsResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO message_sessions (
                id, guild_id, channel_id, start_message_id, end_message_id,
                message_count, start_time, end_time, vector_key, summary, indexed_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL, ?)
            ON CONFLICT(id) DO UPDATE SET
                end_message_id = excluded.end_message_id,
                message_count = excluded.message_count,
                end_time = excluded.end_time,
                summary = excluded.summary,
                updated_at = excluded.updated_at",
        )
        .bind(&session.id)
        .bind(session.guild_id)
        .bind(session.channel_id)
        .bind(session.start_message_id)
        .bind(session.end_message_id)
        .bind(session.message_count)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(&session.summary)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, message_id) in message_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO session_messages (session_id, message_id, position) VALUES (?, ?, ?)
                 ON CONFLICT(session_id, message_id) DO UPDATE SET position = excluded.position",
            )
            .bind(&session.id)
            .bind(message_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> RsResult<MessageSession> {
        let row = sqlx::query(
            "SELECT id, guild_id, channel_id, start_message_id, end_message_id, message_count,
                    start_time, end_time, vector_key, summary, indexed_at, updated_at
             FROM message_sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RsError::NotFound(format!("session {session_id}")))?;

        Ok(MessageSession {
            id: row.try_get("id")?,
            guild_id: row.try_get("guild_id")?,
            channel_id: row.try_get("channel_id")?,
            start_message_id: row.try_get("start_message_id")?,
            end_message_id: row.try_get("end_message_id")?,
            message_count: row.try_get("message_count")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            vector_key: row.try_get("vector_key")?,
            summary: row.try_get("summary")?,
            indexed_at: row.try_get("indexed_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn read_session_messages(&self, session_id: &str) -> RsResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT m.id, m.channel_id, m.guild_id, m.author_id, m.content, m.reply_to_id,
                    m.timestamp, m.is_deleted, m.deleted_at, m.vector_key, m.indexed_at, m.updated_at
             FROM messages m
             JOIN session_messages sm ON sm.message_id = m.id
             WHERE sm.session_id = ?
             ORDER BY sm.position ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn find_session_for_message(&self, message_id: i64) -> RsResult<Option<MessageSession>> {
        let row = sqlx::query(
            "SELECT ms.id, ms.guild_id, ms.channel_id, ms.start_message_id, ms.end_message_id,
                    ms.message_count, ms.start_time, ms.end_time, ms.vector_key, ms.summary,
                    ms.indexed_at, ms.updated_at
             FROM message_sessions ms
             JOIN session_messages sm ON sm.session_id = ms.id
             WHERE sm.message_id = ?
             LIMIT 1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_session).transpose()
    }

    async fn find_sessions_overlapping_messages(
        &self,
        guild_id: i64,
        message_ids: &[i64],
    ) -> RsResult<Vec<MessageSession>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = message_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT DISTINCT ms.id, ms.guild_id, ms.channel_id, ms.start_message_id, ms.end_message_id,
                    ms.message_count, ms.start_time, ms.end_time, ms.vector_key, ms.summary,
                    ms.indexed_at, ms.updated_at
             FROM message_sessions ms
             JOIN session_messages sm ON sm.session_id = ms.id
             WHERE ms.guild_id = ? AND sm.message_id IN ({placeholders})"
        );
        let mut q = sqlx::query(&query).bind(guild_id);
        for id in message_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_session).collect()
    }

    async fn delete_session(&self, session_id: &str) -> RsResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message_sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_attachments_for_messages(&self, message_ids: &[i64]) -> RsResult<Vec<Attachment>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = message_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT id, message_id, guild_id, source_url, mime, size, source_type,
                    processing_status, processing_error, extracted_text, description,
                    vector_keys, is_deleted
             FROM attachments WHERE message_id IN ({placeholders})"
        );
        let mut q = sqlx::query(&query);
        for id in message_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| {
                let vector_keys: String = row.try_get("vector_keys")?;
                let source_type: String = row.try_get("source_type")?;
                let processing_status: String = row.try_get("processing_status")?;
                Ok(Attachment {
                    id: row.try_get("id")?,
                    message_id: row.try_get("message_id")?,
                    guild_id: row.try_get("guild_id")?,
                    source_url: row.try_get("source_url")?,
                    mime: row.try_get("mime")?,
                    size: row.try_get("size")?,
                    source_type: source_type.parse().map_err(RsError::Invalid)?,
                    processing_status: processing_status.parse().map_err(RsError::Invalid)?,
                    processing_error: row.try_get("processing_error")?,
                    extracted_text: row.try_get("extracted_text")?,
                    description: row.try_get("description")?,
                    vector_keys: serde_json::from_str(&vector_keys).unwrap_or_default(),
                    is_deleted: row.try_get("is_deleted")?,
                })
            })
            .collect()
    }

    async fn clear_channel_vector_keys(&self, guild_id: i64, channel_id: i64) -> RsResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE messages SET vector_key = NULL, indexed_at = NULL
             WHERE guild_id = ? AND channel_id = ?",
        )
        .bind(guild_id)
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE message_sessions SET vector_key = NULL, indexed_at = NULL
             WHERE guild_id = ? AND channel_id = ?",
        )
        .bind(guild_id)
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn clear_vector_keys_by_value(&self, guild_id: i64, keys: &[String]) -> RsResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query("UPDATE messages SET vector_key = NULL, indexed_at = NULL WHERE guild_id = ? AND vector_key = ?")
                .bind(guild_id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE message_sessions SET vector_key = NULL, indexed_at = NULL WHERE guild_id = ? AND vector_key = ?")
                .bind(guild_id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE document_chunks SET vector_key = NULL, indexed_at = NULL WHERE guild_id = ? AND vector_key = ?")
                .bind(guild_id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn sync_health_counts(&self, guild_id: i64) -> RsResult<(i64, i64)> {
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM messages WHERE guild_id = ? AND is_deleted = 0")
            .bind(guild_id)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let synced: i64 = sqlx::query(
            "SELECT COUNT(*) FROM messages
             WHERE guild_id = ? AND is_deleted = 0
               AND vector_key IS NOT NULL AND updated_at <= indexed_at",
        )
        .bind(guild_id)
        .fetch_one(&self.pool)
        .await?
        .try_get(0)?;

        Ok((synced, total))
    }

    async fn list_active_guild_ids(&self) -> RsResult<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM guilds WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|row| row.try_get(0).map_err(RsError::from)).collect()
    }
}

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> RsResult<MessageSession> {
    Ok(MessageSession {
        id: row.try_get("id")?,
        guild_id: row.try_get("guild_id")?,
        channel_id: row.try_get("channel_id")?,
        start_message_id: row.try_get("start_message_id")?,
        end_message_id: row.try_get("end_message_id")?,
        message_count: row.try_get("message_count")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        vector_key: row.try_get("vector_key")?,
        summary: row.try_get("summary")?,
        indexed_at: row.try_get("indexed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> RsResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        channel_id: row.try_get("channel_id")?,
        guild_id: row.try_get("guild_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        reply_to_id: row.try_get("reply_to_id")?,
        timestamp: row.try_get("timestamp")?,
        is_deleted: row.try_get("is_deleted")?,
        deleted_at: row.try_get("deleted_at")?,
        vector_key: row.try_get("vector_key")?,
        indexed_at: row.try_get("indexed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rs::NewMessage;
    use chrono::Utc;

    async fn test_store() -> SqliteRelationalStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteRelationalStore::new(pool);
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_message_is_idempotent_on_unchanged_content() {
        let store = test_store().await;
        store.upsert_guild(1, "g").await.unwrap();
        store.upsert_channel(10, 1, "c", true).await.unwrap();
        store.upsert_user(100, "u").await.unwrap();

        let msg = NewMessage {
            id: 1000,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "hello".into(),
            reply_to_id: None,
            timestamp: Utc::now(),
        };

        let prior = store.upsert_message(&msg).await.unwrap();
        assert!(!prior.existed);

        let prior2 = store.upsert_message(&msg).await.unwrap();
        assert!(prior2.existed);
        assert!(!prior2.content_changed(&msg.content));
    }

    #[tokio::test]
    async fn soft_delete_returns_vector_keys_to_purge() {
        let store = test_store().await;
        store.upsert_guild(1, "g").await.unwrap();
        store.upsert_channel(10, 1, "c", true).await.unwrap();
        store.upsert_user(100, "u").await.unwrap();

        let msg = NewMessage {
            id: 2000,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "hello".into(),
            reply_to_id: None,
            timestamp: Utc::now(),
        };
        store.upsert_message(&msg).await.unwrap();
        store.mark_indexed(RecordKind::Message, "2000", "vec-key-1").await.unwrap();

        let deleted = store.soft_delete_messages(1, &[2000]).await.unwrap();
        assert_eq!(deleted.ids, vec![2000]);
        assert_eq!(deleted.vector_keys_to_purge, vec!["vec-key-1".to_string()]);
    }

    #[tokio::test]
    async fn mark_indexed_rejects_deleted_message() {
        let store = test_store().await;
        store.upsert_guild(1, "g").await.unwrap();
        store.upsert_channel(10, 1, "c", true).await.unwrap();
        store.upsert_user(100, "u").await.unwrap();

        let msg = NewMessage {
            id: 3000,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "hello".into(),
            reply_to_id: None,
            timestamp: Utc::now(),
        };
        store.upsert_message(&msg).await.unwrap();
        store.soft_delete_messages(1, &[3000]).await.unwrap();

        let result = store.mark_indexed(RecordKind::Message, "3000", "vec-key-2").await;
        assert!(matches!(result, Err(RsError::Conflict(_))));
    }

    #[tokio::test]
    async fn clear_vector_key_is_noop_on_mismatch() {
        let store = test_store().await;
        store.upsert_guild(1, "g").await.unwrap();
        store.upsert_channel(10, 1, "c", true).await.unwrap();
        store.upsert_user(100, "u").await.unwrap();

        let msg = NewMessage {
            id: 4000,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "hello".into(),
            reply_to_id: None,
            timestamp: Utc::now(),
        };
        store.upsert_message(&msg).await.unwrap();
        store.mark_indexed(RecordKind::Message, "4000", "vec-key-3").await.unwrap();

        // Mismatched expected key: no-op, no error.
        store.clear_vector_key(RecordKind::Message, "4000", "wrong-key").await.unwrap();
        let m = store.get_message(4000).await.unwrap();
        assert_eq!(m.vector_key, Some("vec-key-3".to_string()));
    }
}

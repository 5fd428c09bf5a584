// src/worker/mod.rs
// Indexing Worker (§4.7): executes jobs off the broker, one dispatch per
// `JobKind`. Pool shape grounded in the teacher's `TaskManager::start()` —
// a fixed number of `tokio::spawn`ed executors sharing one broker handle,
// each running its own reserve/dispatch/ack loop.

pub mod error;
pub mod vision;

pub use error::{WorkerError, WorkerResult};
pub use vision::{RemoteVisionDescriber, VisionDescriber};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{attachments::AttachmentConfig, session::SessionConfig};
use crate::embedder::Embedder;
use crate::error::Classify;
use crate::jb::{Job, JobBroker, JobKind, Priority};
use crate::metrics::TaskMetrics;
use crate::rs::{
    AttachmentSourceType, NewDocumentChunk, NewMessageSession, ProcessingStatus, RecordKind,
    RelationalStore,
};
use crate::sessionizer::{self, SessionParams};
use crate::vs::{SearchFilter, VectorStore, VectorPoint};
use crate::chunker;

const BACKFILL_PAGE_SIZE: i64 = 500;

pub struct IndexingWorker {
    rs: Arc<dyn RelationalStore>,
    vs: Arc<dyn VectorStore>,
    jb: Arc<dyn JobBroker>,
    embedder: Arc<dyn Embedder>,
    vision: Arc<dyn VisionDescriber>,
    http: reqwest::Client,
    session_config: SessionConfig,
    attachment_config: AttachmentConfig,
    metrics: Arc<TaskMetrics>,
}

impl IndexingWorker {
    pub fn new(
        rs: Arc<dyn RelationalStore>,
        vs: Arc<dyn VectorStore>,
        jb: Arc<dyn JobBroker>,
        embedder: Arc<dyn Embedder>,
        vision: Arc<dyn VisionDescriber>,
        session_config: SessionConfig,
        attachment_config: AttachmentConfig,
        metrics: Arc<TaskMetrics>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(attachment_config.fetch_timeout_secs))
            .build()
            .expect("reqwest client builds with valid defaults");
        Self { rs, vs, jb, embedder, vision, http, session_config, attachment_config, metrics }
    }

    fn session_params(&self) -> SessionParams {
        SessionParams {
            time_gap_secs: self.session_config.time_gap_secs,
            max_tokens: self.session_config.max_tokens,
            semantic_refine_threshold_messages: self.session_config.semantic_refine_threshold_messages,
            semantic_refine_enabled: self.session_config.semantic_refine_enabled,
            semantic_percentile: self.session_config.semantic_percentile as f64,
            semantic_min_messages: self.session_config.semantic_min_messages,
        }
    }

    /// Spawn `concurrency` executor tasks sharing this worker. Mirrors the
    /// teacher's one-`JoinHandle`-per-background-concern shape, except here
    /// every handle runs the same loop against the shared broker.
    pub fn spawn_pool(self: &Arc<Self>, concurrency: usize) -> Vec<JoinHandle<()>> {
        (0..concurrency)
            .map(|i| {
                let worker = self.clone();
                tokio::spawn(async move { worker.run(i).await })
            })
            .collect()
    }

    async fn run(self: Arc<Self>, executor_id: usize) {
        info!(executor_id, "indexing worker executor started");
        loop {
            match self.jb.reserve().await {
                Ok(Some(job)) => self.execute(job).await,
                Ok(None) => tokio::time::sleep(Duration::from_millis(250)).await,
                Err(e) => {
                    error!(executor_id, error = %e, "reserve failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn execute(&self, job: Job) {
        let kind_name = job.kind.name();
        let result = self.dispatch(&job.kind).await;

        match result {
            Ok(()) => {
                if let Err(e) = self.jb.ack(job.id).await {
                    error!(job_id = job.id, error = %e, "ack failed");
                }
                self.metrics.record_processed(kind_name, 1);
            }
            Err(e) => {
                warn!(job_id = job.id, kind = kind_name, error = %e, "job failed");
                self.metrics.record_error(kind_name);
                if let Err(nack_err) = self.jb.nack(job.id, &e.to_string()).await {
                    error!(job_id = job.id, error = %nack_err, "nack failed");
                }
            }
        }
    }

    async fn dispatch(&self, kind: &JobKind) -> WorkerResult<()> {
        match kind {
            JobKind::Sessionize { channel_id, around_message_id, .. } => {
                self.sessionize(*channel_id, *around_message_id).await
            }
            JobKind::EmbedSession { session_id, .. } => self.embed_session(session_id).await,
            JobKind::ReindexSessionFor { guild_id, message_id } => {
                self.reindex_session_for(*guild_id, *message_id).await
            }
            JobKind::PurgeMessageVectors { guild_id, message_ids } => {
                self.purge_message_vectors(*guild_id, message_ids).await
            }
            JobKind::PurgeChannelVectors { guild_id, channel_id } => {
                self.purge_channel_vectors(*guild_id, *channel_id).await
            }
            JobKind::BackfillChannel { guild_id, channel_id, since_message_id } => {
                self.backfill_channel(*guild_id, *channel_id, *since_message_id).await
            }
            JobKind::IngestAttachment { attachment_id, .. } => {
                self.ingest_attachment(*attachment_id).await
            }
        }
    }

    // --- sessionize -------------------------------------------------

    async fn sessionize(&self, channel_id: i64, around: Option<i64>) -> WorkerResult<()> {
        let window = self.session_config.window_size as i64;
        let since_id = around.map(|id| (id - window / 2).max(0));
        let messages = self.rs.read_session_window(channel_id, since_id, None, window).await?;
        if messages.is_empty() {
            return Ok(());
        }
        let guild_id = messages[0].guild_id;

        let candidates = sessionizer::sessionize(&messages, &self.session_params(), None);

        for candidate in candidates {
            let existing = self.rs.find_session_for_message(candidate.start_message_id).await?;
            let already_covered = existing
                .as_ref()
                .map(|s| s.start_message_id == candidate.start_message_id && s.end_message_id == candidate.end_message_id)
                .unwrap_or(false);
            if already_covered {
                continue;
            }

            if let Some(stale) = existing {
                if let Some(old_key) = &stale.vector_key {
                    self.vs.delete(guild_id, old_key).await?;
                }
                self.rs.delete_session(&stale.id).await?;
            }

            let session_id = Uuid::new_v4().to_string();
            self.rs
                .upsert_session(
                    &NewMessageSession {
                        id: session_id.clone(),
                        guild_id,
                        channel_id,
                        start_message_id: candidate.start_message_id,
                        end_message_id: candidate.end_message_id,
                        message_count: candidate.message_count,
                        start_time: candidate.start_time,
                        end_time: candidate.end_time,
                        summary: None,
                    },
                    &candidate.message_ids,
                )
                .await?;

            self.jb
                .enqueue(JobKind::EmbedSession { guild_id, session_id }, Priority::Default, None, None)
                .await?;
        }

        Ok(())
    }

    // --- embed_session ------------------------------------------------

    async fn embed_session(&self, session_id: &str) -> WorkerResult<()> {
        let session = self.rs.get_session(session_id).await?;
        if session.message_count < 2 {
            return Ok(());
        }
        let messages = self.rs.read_session_messages(session_id).await?;
        if messages.len() < 2 {
            return Ok(());
        }

        let channel = self.rs.get_channel(session.channel_id).await?;

        let mut author_names: std::collections::HashMap<i64, String> = std::collections::HashMap::new();
        for message in &messages {
            if !author_names.contains_key(&message.author_id) {
                let name = self
                    .rs
                    .get_user(message.author_id)
                    .await
                    .map(|u| u.display_name)
                    .unwrap_or_else(|_| message.author_id.to_string());
                author_names.insert(message.author_id, name);
            }
        }

        let rows: Vec<(&str, _, &str)> = messages
            .iter()
            .map(|m| (author_names[&m.author_id].as_str(), m.timestamp, m.content.as_str()))
            .collect();
        let text = sessionizer::build_enrichment_text(&channel.name, &rows);

        let vector = self.embedder.embed(&text).await?;
        if vector.len() != self.embedder.dimension() {
            return Err(WorkerError::Corrupt(format!(
                "embedding dimension mismatch: got {} want {}",
                vector.len(),
                self.embedder.dimension()
            )));
        }

        let preview: String = text.chars().take(1024).collect();
        let point = VectorPoint::new(session_id, session.guild_id, vector)
            .with_payload("channel_id", session.channel_id)
            .with_payload("kind", "session")
            .with_payload("source_ids", serde_json::json!(messages.iter().map(|m| m.id).collect::<Vec<_>>()))
            .with_payload("preview", preview)
            .with_payload("start_time", session.start_time.to_rfc3339())
            .with_payload("end_time", session.end_time.to_rfc3339());

        self.vs.upsert(point).await?;
        self.rs.mark_indexed(RecordKind::Session, session_id, session_id).await?;
        Ok(())
    }

    // --- reindex_session_for -------------------------------------------

    async fn reindex_session_for(&self, guild_id: i64, message_id: i64) -> WorkerResult<()> {
        match self.rs.find_session_for_message(message_id).await? {
            Some(session) => {
                self.jb
                    .enqueue(
                        JobKind::EmbedSession { guild_id, session_id: session.id },
                        Priority::Default,
                        None,
                        None,
                    )
                    .await?;
                Ok(())
            }
            None => {
                let message = self.rs.get_message(message_id).await?;
                self.sessionize(message.channel_id, Some(message_id)).await
            }
        }
    }

    // --- purge_message_vectors ------------------------------------------

    async fn purge_message_vectors(&self, guild_id: i64, message_ids: &[i64]) -> WorkerResult<()> {
        let sessions = self.rs.find_sessions_overlapping_messages(guild_id, message_ids).await?;
        let mut keys: Vec<String> = Vec::new();

        for session in &sessions {
            if let Some(key) = &session.vector_key {
                keys.push(key.clone());
            }
        }

        let attachments = self.rs.list_attachments_for_messages(message_ids).await?;
        for attachment in &attachments {
            let chunks = self.rs.list_document_chunks(attachment.id).await?;
            for chunk in chunks {
                if let Some(key) = chunk.vector_key {
                    keys.push(key);
                }
            }
        }

        if !keys.is_empty() {
            self.vs.delete_batch(guild_id, &keys).await?;
        }

        for session in &sessions {
            if let Some(key) = &session.vector_key {
                self.rs.clear_vector_key(RecordKind::Session, &session.id, key).await?;
            }
            let remaining: Vec<i64> = self
                .rs
                .read_session_messages(&session.id)
                .await?
                .into_iter()
                .filter(|m| !m.is_deleted)
                .map(|m| m.id)
                .collect();
            if remaining.is_empty() {
                self.rs.delete_session(&session.id).await?;
            }
        }

        Ok(())
    }

    // --- purge_channel_vectors ------------------------------------------

    async fn purge_channel_vectors(&self, guild_id: i64, channel_id: i64) -> WorkerResult<()> {
        let filter = SearchFilter::for_guild(guild_id).channel(channel_id);
        self.vs.delete_by_filter(filter).await?;
        self.rs.clear_channel_vector_keys(guild_id, channel_id).await?;
        Ok(())
    }

    // --- backfill_channel ------------------------------------------------

    async fn backfill_channel(&self, guild_id: i64, channel_id: i64, since_message_id: Option<i64>) -> WorkerResult<()> {
        let messages = self
            .rs
            .read_session_window(channel_id, since_message_id, None, BACKFILL_PAGE_SIZE)
            .await?;
        if messages.is_empty() {
            return Ok(());
        }

        let last_id = messages.last().map(|m| m.id);
        self.jb
            .enqueue(
                JobKind::Sessionize { guild_id, channel_id, around_message_id: last_id },
                Priority::Low,
                Some(format!("sz:{channel_id}")),
                None,
            )
            .await?;

        if messages.len() as i64 == BACKFILL_PAGE_SIZE {
            self.jb
                .enqueue(
                    JobKind::BackfillChannel { guild_id, channel_id, since_message_id: last_id },
                    Priority::Low,
                    Some(format!("backfill:{channel_id}:{}", last_id.unwrap_or(0))),
                    None,
                )
                .await?;
        }

        Ok(())
    }

    // --- ingest_attachment -----------------------------------------------

    async fn ingest_attachment(&self, attachment_id: i64) -> WorkerResult<()> {
        let attachment = self.rs.get_attachment(attachment_id).await?;

        if self.attachment_config.is_blocked(&attachment.source_url) {
            self.rs
                .set_attachment_status(attachment_id, ProcessingStatus::Failed, Some("blocked_extension"))
                .await?;
            return Err(WorkerError::BlockedExtension);
        }

        self.rs.set_attachment_status(attachment_id, ProcessingStatus::Processing, None).await?;

        let result = self.process_attachment_bytes(&attachment).await;

        match result {
            Ok(()) => {
                self.rs.set_attachment_status(attachment_id, ProcessingStatus::Completed, None).await?;
                Ok(())
            }
            Err(e) if matches!(e.kind(), crate::error::ErrorKind::Transient) => {
                self.rs
                    .set_attachment_status(attachment_id, ProcessingStatus::Pending, None)
                    .await?;
                Err(e)
            }
            Err(e) => {
                self.rs
                    .set_attachment_status(attachment_id, ProcessingStatus::Failed, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    async fn process_attachment_bytes(&self, attachment: &crate::rs::Attachment) -> WorkerResult<()> {
        let max_size = match attachment.source_type {
            AttachmentSourceType::Text | AttachmentSourceType::Markdown => self.attachment_config.max_size_text,
            AttachmentSourceType::Pdf => self.attachment_config.max_size_pdf,
            AttachmentSourceType::Image => self.attachment_config.max_size_image,
        };
        if attachment.size as u64 > max_size {
            return Err(WorkerError::Oversize { got: attachment.size as u64, max: max_size });
        }

        let bytes = self.http.get(&attachment.source_url).send().await?.bytes().await?;

        let chunks = match attachment.source_type {
            AttachmentSourceType::Text | AttachmentSourceType::Markdown => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                self.rs.set_attachment_extraction(attachment.id, Some(&text), None).await?;
                chunker::chunk_document(
                    &text,
                    attachment.source_type,
                    self.session_config.max_tokens,
                    self.attachment_config.min_chunk_tokens,
                )
            }
            AttachmentSourceType::Pdf => {
                let text = pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| WorkerError::Corrupt(e.to_string()))?;
                self.rs.set_attachment_extraction(attachment.id, Some(&text), None).await?;
                chunker::chunk_document(
                    &text,
                    AttachmentSourceType::Text,
                    self.session_config.max_tokens,
                    self.attachment_config.min_chunk_tokens,
                )
            }
            AttachmentSourceType::Image => {
                let description = self.vision.describe(&bytes, &attachment.mime).await?;
                self.rs
                    .set_attachment_extraction(attachment.id, None, Some(&description))
                    .await?;
                vec![chunker::ChunkCandidate { index: 0, text: description, heading_context: None }]
            }
        };

        for chunk in chunks {
            let chunk_id = format!("{}:{}", attachment.id, chunk.index);
            self.rs
                .upsert_document_chunk(&NewDocumentChunk {
                    id: chunk_id.clone(),
                    attachment_id: attachment.id,
                    guild_id: attachment.guild_id,
                    chunk_index: chunk.index,
                    chunk_text: chunk.text.clone(),
                    parent_chunk_id: None,
                })
                .await?;

            let vector = self.embedder.embed(&chunk.text).await?;
            let point = VectorPoint::new(chunk_id.as_str(), attachment.guild_id, vector)
                .with_payload("kind", "doc_chunk")
                .with_payload("source_ids", serde_json::json!([attachment.id]))
                .with_payload("message_id", attachment.message_id)
                .with_payload("heading_context", chunk.heading_context.unwrap_or_default());
            self.vs.upsert(point).await?;
            self.rs.mark_indexed(RecordKind::Chunk, &chunk_id, &chunk_id).await?;
        }

        Ok(())
    }
}

// src/rs/types.rs
// Entity types for the Relational Store (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub guild_id: i64,
    pub name: String,
    pub is_indexed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub channel_id: i64,
    pub guild_id: i64,
    pub author_id: i64,
    pub content: String,
    pub reply_to_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub vector_key: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// (I4): a record whose content changed after it was last indexed.
    pub fn is_stale(&self) -> bool {
        match self.indexed_at {
            Some(indexed_at) => self.updated_at > indexed_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentSourceType {
    Image,
    Pdf,
    Text,
    Markdown,
}

impl AttachmentSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentSourceType::Image => "image",
            AttachmentSourceType::Pdf => "pdf",
            AttachmentSourceType::Text => "text",
            AttachmentSourceType::Markdown => "markdown",
        }
    }

    pub fn from_mime(mime: &str, source_url: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            return Some(Self::Image);
        }
        if mime == "application/pdf" || source_url.to_lowercase().ends_with(".pdf") {
            return Some(Self::Pdf);
        }
        if mime == "text/markdown" || source_url.to_lowercase().ends_with(".md") {
            return Some(Self::Markdown);
        }
        if mime.starts_with("text/") {
            return Some(Self::Text);
        }
        None
    }
}

impl std::str::FromStr for AttachmentSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "pdf" => Ok(Self::Pdf),
            "text" => Ok(Self::Text),
            "markdown" => Ok(Self::Markdown),
            other => Err(format!("unknown attachment source_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown processing_status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: i64,
    pub guild_id: i64,
    pub source_url: String,
    pub mime: String,
    pub size: i64,
    pub source_type: AttachmentSourceType,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    pub extracted_text: Option<String>,
    pub description: Option<String>,
    pub vector_keys: Vec<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub attachment_id: i64,
    pub guild_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub parent_chunk_id: Option<String>,
    pub vector_key: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSession {
    pub id: String,
    pub guild_id: i64,
    pub channel_id: i64,
    pub start_message_id: i64,
    pub end_message_id: i64,
    pub message_count: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub vector_key: Option<String>,
    pub summary: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl MessageSession {
    pub fn is_stale(&self) -> bool {
        match self.indexed_at {
            Some(indexed_at) => self.updated_at > indexed_at,
            None => false,
        }
    }
}

/// A batch of messages pending soft-delete's return value: the subset whose
/// `vector_key` was non-null and therefore needs a VS purge (§4.1).
#[derive(Debug, Clone, Default)]
pub struct DeletedMessages {
    pub ids: Vec<i64>,
    pub vector_keys_to_purge: Vec<String>,
}

/// The four drift populations the Reconciler (§4.8) scans for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Unindexed,
    Stale,
    PendingDelete,
}

// src/jb/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    // Ord derives low-to-high; dispatch queries order `high` first, so the
    // dispatch rank is the reverse of this declaration order.
    Low,
    Default,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Default => "default",
            Priority::Low => "low",
        }
    }

    /// Lower value sorts first in `ORDER BY priority_rank`.
    pub fn rank(&self) -> i32 {
        match self {
            Priority::High => 0,
            Priority::Default => 1,
            Priority::Low => 2,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "default" => Ok(Self::Default),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// The operations the Indexing Worker dispatches on (§4.7). Serialized as
/// the job's `kind` column plus a JSON `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum JobKind {
    Sessionize { guild_id: i64, channel_id: i64, around_message_id: Option<i64> },
    EmbedSession { guild_id: i64, session_id: String },
    ReindexSessionFor { guild_id: i64, message_id: i64 },
    PurgeMessageVectors { guild_id: i64, message_ids: Vec<i64> },
    PurgeChannelVectors { guild_id: i64, channel_id: i64 },
    BackfillChannel { guild_id: i64, channel_id: i64, since_message_id: Option<i64> },
    IngestAttachment { guild_id: i64, attachment_id: i64 },
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Sessionize { .. } => "sessionize",
            JobKind::EmbedSession { .. } => "embed_session",
            JobKind::ReindexSessionFor { .. } => "reindex_session_for",
            JobKind::PurgeMessageVectors { .. } => "purge_message_vectors",
            JobKind::PurgeChannelVectors { .. } => "purge_channel_vectors",
            JobKind::BackfillChannel { .. } => "backfill_channel",
            JobKind::IngestAttachment { .. } => "ingest_attachment",
        }
    }

    pub fn guild_id(&self) -> i64 {
        match self {
            JobKind::Sessionize { guild_id, .. }
            | JobKind::EmbedSession { guild_id, .. }
            | JobKind::ReindexSessionFor { guild_id, .. }
            | JobKind::PurgeMessageVectors { guild_id, .. }
            | JobKind::PurgeChannelVectors { guild_id, .. }
            | JobKind::BackfillChannel { guild_id, .. }
            | JobKind::IngestAttachment { guild_id, .. } => *guild_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Reserved,
    Done,
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Reserved => "reserved",
            JobStatus::Done => "done",
            JobStatus::Dead => "dead",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "reserved" => Ok(Self::Reserved),
            "done" => Ok(Self::Done),
            "dead" => Ok(Self::Dead),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub kind: JobKind,
    pub priority: Priority,
    pub guild_id: i64,
    pub dedup_key: Option<String>,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: DateTime<Utc>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterJob {
    pub id: i64,
    pub original_job_id: i64,
    pub kind: JobKind,
    pub guild_id: i64,
    pub attempts: i32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

// src/vs/mod.rs
// Vector Store (§4.2): semantic index over message-sessions and document
// chunks. Every read and write is tenant-scoped; the type system makes it
// impossible to construct a filter without a `guild_id`.

pub mod error;
pub mod qdrant;

pub use error::{VsError, VsResult};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// A point to upsert: an embedding plus the payload needed to resolve a
/// search hit back to an RS record without a second round-trip.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub key: String,
    pub guild_id: i64,
    pub embedding: Vec<f32>,
    pub payload: HashMap<String, Value>,
}

impl VectorPoint {
    pub fn new(key: impl Into<String>, guild_id: i64, embedding: Vec<f32>) -> Self {
        Self {
            key: key.into(),
            guild_id,
            embedding,
            payload: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(field.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub key: String,
    pub score: f32,
    pub payload: HashMap<String, Value>,
}

/// A search/delete filter that can only be built with a `guild_id` — the
/// tenant-isolation invariant (I1 in §3) is enforced at the type level: no
/// `SearchFilter` can exist without one, so there is no code path that
/// reaches the Qdrant client without a tenant scope.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub guild_id: i64,
    pub channel_id: Option<i64>,
    pub extra: HashMap<String, Value>,
}

impl SearchFilter {
    pub fn for_guild(guild_id: i64) -> Self {
        Self {
            guild_id,
            channel_id: None,
            extra: HashMap::new(),
        }
    }

    pub fn channel(mut self, channel_id: i64) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Storage seam for the semantic index, mirroring the teacher's
/// `QdrantMultiStore` but collapsed to one collection per logical space
/// (sessions, document chunks) since this system has no multi-head routing.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, point: VectorPoint) -> VsResult<()>;

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VsResult<()>;

    /// Hits are filtered to `score >= score_min` before truncating to
    /// `limit` (§4.2, round-trip law R1).
    async fn search(
        &self,
        embedding: &[f32],
        filter: SearchFilter,
        limit: usize,
        score_min: f32,
    ) -> VsResult<Vec<SearchHit>>;

    /// Hard delete by key. Idempotent: deleting an already-absent key
    /// succeeds (§4.2 — `NotFound` is not an error for deletes).
    async fn delete(&self, guild_id: i64, key: &str) -> VsResult<()>;

    async fn delete_batch(&self, guild_id: i64, keys: &[String]) -> VsResult<()>;

    /// Delete every point matching a filter, used for channel-level purges
    /// and the Reconciler's orphan sweep. Returns the number of points
    /// actually removed where the backend reports it.
    async fn delete_by_filter(&self, filter: SearchFilter) -> VsResult<u64>;

    async fn count(&self, filter: SearchFilter) -> VsResult<u64>;

    /// Cross-tenant page of up to `limit` points, payload included but no
    /// query vector — the one deliberate escape hatch from the
    /// `SearchFilter` tenant-isolation invariant, reserved for the
    /// Reconciler's orphan sweep (§4.8), which by definition must look
    /// across every guild at once.
    async fn scroll_all(&self, limit: usize) -> VsResult<Vec<VectorPoint>>;
}

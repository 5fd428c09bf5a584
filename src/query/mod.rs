// src/query/mod.rs
// Outbound query interface (§6): the two read-only operations the core
// exposes to agent/analytics callers above it. Both are mandatory-guild_id,
// read-only, and never mutate RS or VS state.

pub mod error;

pub use error::{QueryError, QueryResult};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::embedder::Embedder;
use crate::rs::{Message, RelationalStore};
use crate::vs::{SearchFilter, SearchHit, VectorStore};

/// A thin read-only facade wiring RS, VS, and the Embedder together for the
/// two operations named in §6 — `search_semantic` and `list_recent`. Neither
/// belongs on any one of RS/VS/Embedder alone since `search_semantic` spans
/// all three (embed the query text, then delegate to VS with the same
/// tenant guard every other VS caller goes through).
pub struct QueryEngine {
    rs: Arc<dyn RelationalStore>,
    vs: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl QueryEngine {
    pub fn new(rs: Arc<dyn RelationalStore>, vs: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { rs, vs, embedder }
    }

    /// `search_semantic(guild_id, text, channel_filter?, k, min_score)` —
    /// mandatory `guild_id`; delegates to VS through the same
    /// `SearchFilter` every other caller uses, so there is no second code
    /// path that could skip the tenant guard.
    pub async fn search_semantic(
        &self,
        guild_id: i64,
        text: &str,
        channel_filter: Option<i64>,
        k: usize,
        min_score: f32,
    ) -> QueryResult<Vec<SearchHit>> {
        let embedding = self.embedder.embed(text).await?;
        let mut filter = SearchFilter::for_guild(guild_id);
        if let Some(channel_id) = channel_filter {
            filter = filter.channel(channel_id);
        }
        Ok(self.vs.search(&embedding, filter, k, min_score).await?)
    }

    /// `list_recent(guild_id, channel_id, time_range)` — reads straight
    /// from RS, read-only.
    pub async fn list_recent(
        &self,
        guild_id: i64,
        channel_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> QueryResult<Vec<Message>> {
        Ok(self.rs.list_recent_messages(guild_id, channel_id, since, until).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rs::sqlite::SqliteRelationalStore;
    use crate::rs::NewMessage;
    use crate::testing::{FakeEmbedder, FakeVectorStore};
    use crate::vs::VectorPoint;
    use chrono::Duration;
    use sqlx::SqlitePool;

    async fn setup() -> SqliteRelationalStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteRelationalStore::new(pool)
    }

    #[tokio::test]
    async fn search_semantic_requires_guild_scoped_filter_and_honors_min_score() {
        let rs = setup().await;
        let embedder = Arc::new(FakeEmbedder::new(8));
        // Stored under the exact vector the embedder would produce for
        // "hello" so its cosine similarity to the query embedding is
        // exactly 1.0, regardless of the hash-derived direction.
        let hello_vector = embedder.embed("hello").await.unwrap();
        let vs = Arc::new(FakeVectorStore::new());
        vs.upsert(VectorPoint::new("s1", 10, hello_vector.clone())).await.unwrap();
        vs.upsert(VectorPoint::new("s2", 20, hello_vector)).await.unwrap();

        let engine = QueryEngine::new(Arc::new(rs), vs, embedder);

        let hits = engine.search_semantic(10, "hello", None, 10, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "s1");

        let none = engine.search_semantic(10, "hello", None, 10, 1.5).await.unwrap();
        assert!(none.is_empty(), "min_score above every hit's score should filter everything out");
    }

    #[tokio::test]
    async fn list_recent_reads_messages_within_the_time_range() {
        let rs = setup().await;
        rs.upsert_guild(1, "g").await.unwrap();
        rs.upsert_channel(10, 1, "c", true).await.unwrap();
        rs.upsert_user(100, "u").await.unwrap();

        let now = Utc::now();
        rs.upsert_message(&NewMessage {
            id: 1,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "in range".into(),
            reply_to_id: None,
            timestamp: now,
        })
        .await
        .unwrap();
        rs.upsert_message(&NewMessage {
            id: 2,
            channel_id: 10,
            guild_id: 1,
            author_id: 100,
            content: "too old".into(),
            reply_to_id: None,
            timestamp: now - Duration::days(30),
        })
        .await
        .unwrap();

        let engine = QueryEngine::new(
            Arc::new(rs),
            Arc::new(FakeVectorStore::new()),
            Arc::new(FakeEmbedder::new(8)),
        );

        let recent = engine
            .list_recent(1, 10, now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "in range");
    }
}

// src/testing/fake_vector_store.rs
// In-memory VectorStore double. Honors tenant filtering exactly like the
// real Qdrant-backed store so tests can catch a missing `guild_id` filter.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::vs::{SearchFilter, SearchHit, VectorPoint, VectorStore, VsResult};

#[derive(Default)]
pub struct FakeVectorStore {
    points: Mutex<HashMap<String, VectorPoint>>,
}

impl FakeVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.points.lock().contains_key(key)
    }

    fn matches(point: &VectorPoint, filter: &SearchFilter) -> bool {
        if point.guild_id != filter.guild_id {
            return false;
        }
        if let Some(channel_id) = filter.channel_id {
            let matches_channel = point
                .payload
                .get("channel_id")
                .and_then(|v| v.as_i64())
                .map(|v| v == channel_id)
                .unwrap_or(false);
            if !matches_channel {
                return false;
            }
        }
        for (field, expected) in &filter.extra {
            if point.payload.get(field) != Some(expected) {
                return false;
            }
        }
        true
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn upsert(&self, point: VectorPoint) -> VsResult<()> {
        self.points.lock().insert(point.key.clone(), point);
        Ok(())
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VsResult<()> {
        let mut guard = self.points.lock();
        for point in points {
            guard.insert(point.key.clone(), point);
        }
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        filter: SearchFilter,
        limit: usize,
        score_min: f32,
    ) -> VsResult<Vec<SearchHit>> {
        let guard = self.points.lock();
        let mut hits: Vec<SearchHit> = guard
            .values()
            .filter(|p| Self::matches(p, &filter))
            .map(|p| SearchHit {
                key: p.key.clone(),
                score: Self::cosine(embedding, &p.embedding),
                payload: p.payload.clone(),
            })
            .filter(|hit| hit.score >= score_min)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, guild_id: i64, key: &str) -> VsResult<()> {
        let mut guard = self.points.lock();
        if guard.get(key).map(|p| p.guild_id) == Some(guild_id) {
            guard.remove(key);
        }
        Ok(())
    }

    async fn delete_batch(&self, guild_id: i64, keys: &[String]) -> VsResult<()> {
        let mut guard = self.points.lock();
        for key in keys {
            if guard.get(key).map(|p| p.guild_id) == Some(guild_id) {
                guard.remove(key);
            }
        }
        Ok(())
    }

    async fn delete_by_filter(&self, filter: SearchFilter) -> VsResult<u64> {
        let mut guard = self.points.lock();
        let to_remove: Vec<String> = guard
            .values()
            .filter(|p| Self::matches(p, &filter))
            .map(|p| p.key.clone())
            .collect();
        for key in &to_remove {
            guard.remove(key);
        }
        Ok(to_remove.len() as u64)
    }

    async fn count(&self, filter: SearchFilter) -> VsResult<u64> {
        let guard = self.points.lock();
        Ok(guard.values().filter(|p| Self::matches(p, &filter)).count() as u64)
    }

    async fn scroll_all(&self, limit: usize) -> VsResult<Vec<VectorPoint>> {
        let guard = self.points.lock();
        Ok(guard.values().take(limit).cloned().collect())
    }
}

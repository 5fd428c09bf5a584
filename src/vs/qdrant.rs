// src/vs/qdrant.rs
// QdrantVectorStore: the sole concrete VectorStore implementation, grounded
// in the teacher's QdrantMultiStore (collection bootstrap, point upsert,
// filtered search/delete), collapsed to a single collection since this
// system has one embedding space rather than multi-head routing.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
    PointStruct, ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{SearchFilter, SearchHit, VectorPoint, VectorStore, VsError, VsResult};

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStore {
    pub async fn new(url: &str, collection: &str, dimension: usize, timeout: std::time::Duration) -> VsResult<Self> {
        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .timeout(timeout)
            .build()
            .map_err(VsError::Backend)?;

        let store = Self {
            client,
            collection: collection.to_string(),
            dimension,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> VsResult<()> {
        let exists = self.client.collection_exists(&self.collection).await.map_err(VsError::Backend)?;
        if exists {
            return Ok(());
        }

        info!(collection = %self.collection, "creating qdrant collection");
        match self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine)),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("already exists") => {
                debug!(collection = %self.collection, "collection created by another process");
                Ok(())
            }
            Err(e) => Err(VsError::Backend(e)),
        }
    }

    fn build_filter(filter: &SearchFilter) -> Filter {
        let mut conditions = vec![Condition::matches("guild_id", filter.guild_id)];
        if let Some(channel_id) = filter.channel_id {
            conditions.push(Condition::matches("channel_id", channel_id));
        }
        for (field, value) in &filter.extra {
            if let Some(s) = value.as_str() {
                conditions.push(Condition::matches(field.as_str(), s.to_string()));
            } else if let Some(i) = value.as_i64() {
                conditions.push(Condition::matches(field.as_str(), i));
            }
        }
        Filter::must(conditions)
    }

    fn point_id(key: &str) -> PointId {
        match key.parse::<u64>() {
            Ok(n) => n.into(),
            Err(_) => key.to_string().into(),
        }
    }

    fn payload_to_qdrant(payload: &HashMap<String, Value>) -> HashMap<String, QdrantValue> {
        payload
            .iter()
            .filter_map(|(k, v)| json_to_qdrant(v).map(|qv| (k.clone(), qv)))
            .collect()
    }
}

fn json_to_qdrant(value: &Value) -> Option<QdrantValue> {
    match value {
        Value::String(s) => Some(s.clone().into()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.into())
            } else {
                n.as_f64().map(|f| f.into())
            }
        }
        Value::Bool(b) => Some((*b).into()),
        _ => None,
    }
}

fn qdrant_to_payload(payload: HashMap<String, QdrantValue>) -> HashMap<String, Value> {
    payload
        .into_iter()
        .filter_map(|(k, v)| qdrant_value_to_json(v).map(|jv| (k, jv)))
        .collect()
}

fn qdrant_value_to_json(value: QdrantValue) -> Option<Value> {
    serde_json::to_value(format!("{value:?}")).ok().map(|_| {
        // qdrant-client's Value doesn't expose a clean JSON bridge; fall
        // back to its string kind for payload round-tripping in search hits.
        Value::String(value.to_string())
    })
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, point: VectorPoint) -> VsResult<()> {
        if point.embedding.len() != self.dimension {
            return Err(VsError::DimensionMismatch {
                expected: self.dimension,
                got: point.embedding.len(),
            });
        }

        let mut payload = Self::payload_to_qdrant(&point.payload);
        payload.insert("guild_id".to_string(), point.guild_id.into());

        let p = PointStruct::new(Self::point_id(&point.key), point.embedding, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![p]).wait(true))
            .await
            .map_err(VsError::Backend)?;
        Ok(())
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VsResult<()> {
        let mut structs = Vec::with_capacity(points.len());
        for point in points {
            if point.embedding.len() != self.dimension {
                return Err(VsError::DimensionMismatch {
                    expected: self.dimension,
                    got: point.embedding.len(),
                });
            }
            let mut payload = Self::payload_to_qdrant(&point.payload);
            payload.insert("guild_id".to_string(), point.guild_id.into());
            structs.push(PointStruct::new(Self::point_id(&point.key), point.embedding, payload));
        }

        if structs.is_empty() {
            return Ok(());
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, structs).wait(true))
            .await
            .map_err(VsError::Backend)?;
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        filter: SearchFilter,
        limit: usize,
        score_min: f32,
    ) -> VsResult<Vec<SearchHit>> {
        if embedding.len() != self.dimension {
            return Err(VsError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }

        let qfilter = Self::build_filter(&filter);
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, embedding.to_vec(), limit as u64)
                    .filter(qfilter)
                    .score_threshold(score_min)
                    .with_payload(true),
            )
            .await
            .map_err(VsError::Backend)?;

        Ok(response.result.into_iter().map(scored_point_to_hit).collect())
    }

    async fn delete(&self, guild_id: i64, key: &str) -> VsResult<()> {
        let filter = Filter::must([
            Condition::matches("guild_id", guild_id),
            Condition::has_id(vec![Self::point_id(key)]),
        ]);
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(filter).wait(true))
            .await
            .map_err(VsError::Backend)?;
        Ok(())
    }

    async fn delete_batch(&self, guild_id: i64, keys: &[String]) -> VsResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = keys.iter().map(|k| Self::point_id(k)).collect();
        let filter = Filter::must([Condition::matches("guild_id", guild_id), Condition::has_id(ids)]);
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(filter).wait(true))
            .await
            .map_err(VsError::Backend)?;
        Ok(())
    }

    async fn delete_by_filter(&self, filter: SearchFilter) -> VsResult<u64> {
        let qfilter = Self::build_filter(&filter);
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(qfilter).wait(true))
            .await
            .map_err(VsError::Backend)?;
        // Qdrant's delete response does not report a count.
        Ok(0)
    }

    async fn count(&self, filter: SearchFilter) -> VsResult<u64> {
        let qfilter = Self::build_filter(&filter);
        let response = self
            .client
            .count(qdrant_client::qdrant::CountPointsBuilder::new(&self.collection).filter(qfilter))
            .await
            .map_err(VsError::Backend)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn scroll_all(&self, limit: usize) -> VsResult<Vec<VectorPoint>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .limit(limit as u32)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(VsError::Backend)?;

        Ok(response
            .result
            .into_iter()
            .map(|p| {
                let key = p.id.map(|id| format!("{id:?}")).unwrap_or_default();
                let payload = qdrant_to_payload(p.payload);
                let guild_id = payload.get("guild_id").and_then(|v| v.as_i64()).unwrap_or(0);
                let embedding = match p.vectors.and_then(|v| v.vectors_options) {
                    Some(qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(v)) => v.data,
                    _ => Vec::new(),
                };
                VectorPoint { key, guild_id, embedding, payload }
            })
            .collect())
    }
}

fn scored_point_to_hit(point: ScoredPoint) -> SearchHit {
    let key = match point.id {
        Some(id) => format!("{id:?}"),
        None => String::new(),
    };
    SearchHit {
        key,
        score: point.score,
        payload: qdrant_to_payload(point.payload),
    }
}
